// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for fleet DNS resources.
//!
//! This module contains the reconciliation logic for all fleetdns Custom
//! Resources. Each reconciler watches for changes to its resource type and
//! converges the derived Istio gateway and DNS record resources accordingly.
//!
//! # Reconciliation Architecture
//!
//! fleetdns follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor resource changes via Kubernetes API
//! 2. **Reconcile** - Compare desired state (CRD spec) with actual state
//! 3. **Update** - Create, patch, or delete derived resources to match
//! 4. **Status** - Report reconciliation results back to Kubernetes
//!
//! Cross-resource dependencies are resolved through the reflector stores and
//! the identity/topology caches carried in the shared
//! [`Context`](crate::context::Context); watch mappers in [`watches`] fan
//! changes of one resource out to every resource whose output depends on it.
//!
//! # Available Reconcilers
//!
//! ## Fleet Singletons
//!
//! - [`reconcile_clusteridentity`] - Validates the cluster identity and publishes it to the identity cache
//! - [`reconcile_dnsconfiguration`] - Validates the DNS controller topology and publishes it to the topology cache
//!
//! ## Namespace Resources
//!
//! - [`reconcile_dnspolicy`] - Evaluates per-namespace DNS activation against identity and topology
//! - [`reconcile_gateway`] - Aggregates route hostnames into a derived Istio gateway and tracks load balancer DNS readiness
//! - [`reconcile_serviceroute`] - Fans a route out into one CNAME record per active DNS controller
//!
//! ## Infrastructure Records
//!
//! - [`reconcile_ingress_dns`] - Singleton pass that garbage-collects orphaned
//!   infrastructure A records and ensures one per (gateway controller,
//!   postfix, DNS controller) triple

pub mod clusteridentity;
pub mod dnsconfiguration;
pub mod dnspolicy;
pub mod finalizers;
pub mod gateway;
pub mod ingressdns;
pub mod resources;
pub mod retry;
pub mod serviceroute;
pub mod status;
pub mod watches;

#[cfg(test)]
mod clusteridentity_tests;
#[cfg(test)]
mod dnsconfiguration_tests;
#[cfg(test)]
mod dnspolicy_tests;
#[cfg(test)]
mod gateway_tests;
#[cfg(test)]
mod resources_tests;

use kube::runtime::controller::Action;

pub use clusteridentity::reconcile_clusteridentity;
pub use dnsconfiguration::reconcile_dnsconfiguration;
pub use dnspolicy::{policy_is_active, reconcile_dnspolicy, select_active_controllers};
pub use gateway::reconcile_gateway;
pub use ingressdns::{reconcile_ingress_dns, run_ingress_dns};
pub use serviceroute::reconcile_serviceroute;

/// Treat a missing resource as success for delete-style operations.
///
/// Cleanup is idempotent: a record that is already gone is exactly the state
/// the caller wanted. Any other API error is passed through.
///
/// # Errors
///
/// Returns the original error for anything other than HTTP 404.
pub fn ignore_not_found<T>(result: kube::Result<T>) -> kube::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check whether an API error is an optimistic-concurrency conflict (HTTP 409).
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}

/// Pick the controller's next action after a status write.
///
/// A status conflict means another writer raced us; the short conflict
/// requeue re-runs the reconcile against the fresh object instead of
/// surfacing an error. Any other outcome uses the action the caller chose
/// for its reconcile result.
#[must_use]
pub fn next_action(outcome: &status::StatusOutcome, on_success: Action) -> Action {
    match outcome {
        status::StatusOutcome::Conflict => Action::requeue(std::time::Duration::from_secs(
            crate::constants::CONFLICT_REQUEUE_DURATION_SECS,
        )),
        _ => on_success,
    }
}
