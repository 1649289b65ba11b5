// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSPolicy` reconciliation logic.
//!
//! A `DNSPolicy` is the per-namespace master switch for DNS publication:
//! `ServiceRoute` resources only fan records out while their namespace
//! policy evaluates to active on the local cluster. The activation test and
//! controller selection are pure functions over the policy spec, the
//! cluster identity, and the DNS topology; the reconciler only fetches the
//! inputs and publishes the result to status.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info};

use anyhow::Result;

use crate::cache::{fetch_cluster_info, fetch_topology, ClusterInfo, DnsTopology};
use crate::constants::{DEPENDENCY_REQUEUE_DURATION_SECS, READY_REQUEUE_DURATION_SECS};
use crate::context::Context;
use crate::crd::{DNSPolicy, DNSPolicySpec, DNSPolicyStatus, DnsPolicyMode};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_CLUSTER_IDENTITY_NOT_FOUND, REASON_DNS_CONFIGURATION_NOT_FOUND,
    REASON_NO_CONTROLLERS_CONFIGURED, REASON_POLICY_ACTIVE, REASON_POLICY_INACTIVE,
};

use super::next_action;
use super::status::{
    condition_changed, conditions_equal, emit_condition_event, find_condition,
    patch_namespaced_status, update_condition_in_memory, StatusOutcome,
};

/// Whether a policy activates on the local cluster.
///
/// A policy is inactive iff `sourceRegion` is set and differs from the
/// identity's region, or `sourceCluster` is set and differs from the
/// identity's cluster name. Both checks apply in both modes; an empty
/// string behaves like an unset field.
#[must_use]
pub fn policy_is_active(spec: &DNSPolicySpec, info: &ClusterInfo) -> bool {
    if let Some(region) = spec.source_region.as_deref().filter(|s| !s.is_empty()) {
        if region != info.region {
            return false;
        }
    }
    if let Some(cluster) = spec.source_cluster.as_deref().filter(|s| !s.is_empty()) {
        if cluster != info.cluster {
            return false;
        }
    }
    true
}

/// Select the DNS controllers an active policy fans records out to.
///
/// - `Active`: the controllers of the identity's own region, plus those of
///   every adopted region that exists in the topology. Unknown adopted
///   regions contribute nothing.
/// - `RegionBound`: every configured controller; the matching cluster is
///   the single point of DNS truth for all regions.
///
/// Adopted regions and `RegionBound` can both claim controllers another
/// cluster also serves. Keeping those claims non-overlapping is an
/// operator configuration contract; nothing here coordinates across
/// clusters.
///
/// Descriptor order is preserved and names never repeat.
#[must_use]
pub fn select_active_controllers(
    mode: &DnsPolicyMode,
    info: &ClusterInfo,
    topology: &DnsTopology,
) -> Vec<String> {
    match mode {
        DnsPolicyMode::Active => topology
            .controllers
            .iter()
            .filter(|controller| {
                controller.region == info.region
                    || info.adopts_regions.iter().any(|r| *r == controller.region)
            })
            .map(|controller| controller.name.clone())
            .collect(),
        DnsPolicyMode::RegionBound => topology.controller_names(),
    }
}

/// Reconciles a `DNSPolicy` resource.
///
/// The policy owns no derived resources, so deletion needs no finalizer:
/// routes react to the disappearance through their own policy watch.
///
/// # Errors
///
/// Returns an error if a cache fallback list against the API fails or the
/// status write fails for a reason other than a conflict.
pub async fn reconcile_dnspolicy(ctx: Arc<Context>, policy: DNSPolicy) -> Result<Action> {
    let client = ctx.client.clone();
    let namespace = policy.namespace().unwrap_or_default();
    let name = policy.name_any();

    info!("Reconciling DNSPolicy: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        mode = ?policy.spec.mode,
        "Starting DNSPolicy reconciliation"
    );

    if policy.metadata.deletion_timestamp.is_some() {
        debug!("DNSPolicy {}/{} is being deleted, nothing to clean up", namespace, name);
        return Ok(Action::await_change());
    }

    // Hard dependencies: identity and topology, cache-first.
    let Some(info) = fetch_cluster_info(&ctx.identity_cache, client.clone()).await? else {
        debug!("No ClusterIdentity available, DNSPolicy {}/{} pending", namespace, name);
        let outcome = update_status(
            &ctx,
            &policy,
            false,
            Vec::new(),
            "False",
            REASON_CLUSTER_IDENTITY_NOT_FOUND,
            "No ClusterIdentity exists; policy cannot be evaluated",
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    let Some(topology) = fetch_topology(&ctx.topology_cache, client.clone()).await? else {
        debug!("No DNSConfiguration available, DNSPolicy {}/{} pending", namespace, name);
        let outcome = update_status(
            &ctx,
            &policy,
            false,
            Vec::new(),
            "False",
            REASON_DNS_CONFIGURATION_NOT_FOUND,
            "No DNSConfiguration exists; policy cannot be evaluated",
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    if topology.controllers.is_empty() {
        let outcome = update_status(
            &ctx,
            &policy,
            false,
            Vec::new(),
            "False",
            REASON_NO_CONTROLLERS_CONFIGURED,
            "DNSConfiguration lists no DNS controllers",
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Activation is the master switch for downstream record generation.
    if !policy_is_active(&policy.spec, &info) {
        info!(
            "DNSPolicy {}/{} is inactive on cluster {} ({})",
            namespace, name, info.cluster, info.region
        );
        let outcome = update_status(
            &ctx,
            &policy,
            false,
            Vec::new(),
            "False",
            REASON_POLICY_INACTIVE,
            &format!(
                "Policy does not select cluster {} in region {}",
                info.cluster, info.region
            ),
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
        ));
    }

    let controllers = select_active_controllers(&policy.spec.mode, &info, &topology);
    info!(
        "DNSPolicy {}/{} active with {} controllers",
        namespace,
        name,
        controllers.len()
    );

    let message = format!(
        "Policy active in {:?} mode with controllers: {}",
        policy.spec.mode,
        controllers.join(", ")
    );
    let outcome = update_status(
        &ctx,
        &policy,
        true,
        controllers,
        "True",
        REASON_POLICY_ACTIVE,
        &message,
    )
    .await?;

    Ok(next_action(
        &outcome,
        Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
    ))
}

/// Patch the `DNSPolicy` status if it changed.
async fn update_status(
    ctx: &Context,
    policy: &DNSPolicy,
    active: bool,
    active_controllers: Vec<String>,
    ready_status: &str,
    reason: &str,
    message: &str,
) -> Result<StatusOutcome> {
    let namespace = policy.namespace().unwrap_or_default();
    let current = policy.status.clone().unwrap_or_default();

    let mut conditions = current.conditions.clone();
    update_condition_in_memory(
        &mut conditions,
        CONDITION_TYPE_READY,
        ready_status,
        reason,
        message,
    );

    let new_status = DNSPolicyStatus {
        conditions,
        observed_generation: policy.metadata.generation,
        active,
        active_controllers,
    };

    if current.active == new_status.active
        && current.active_controllers == new_status.active_controllers
        && current.observed_generation == new_status.observed_generation
        && conditions_equal(&current.conditions, &new_status.conditions)
    {
        debug!(
            "DNSPolicy {}/{} status unchanged, skipping update",
            namespace,
            policy.name_any()
        );
        return Ok(StatusOutcome::Unchanged);
    }

    let outcome = patch_namespaced_status::<DNSPolicy>(
        &ctx.client,
        &namespace,
        &policy.name_any(),
        &new_status,
    )
    .await?;

    if outcome == StatusOutcome::Applied {
        if let Some(ready) = find_condition(&new_status.conditions, CONDITION_TYPE_READY) {
            let previous = find_condition(&current.conditions, CONDITION_TYPE_READY).cloned();
            if condition_changed(&previous, ready) {
                emit_condition_event(&ctx.client, policy, ready).await;
            }
        }
    }

    Ok(outcome)
}
