// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch fan-out mappers wiring upstream changes to downstream reconciles.
//!
//! The resource graph has dependency edges that `Controller::watches()`
//! closures in `main.rs` must turn into re-enqueues:
//!
//! - `DNSConfiguration` → every `ClusterIdentity` (adopted-region
//!   re-validation), every `DNSPolicy` (controller recompute), every
//!   `Gateway`
//! - `ClusterIdentity` → every `DNSPolicy` and every `ServiceRoute`
//!   (hostname and activation recompute)
//! - `DNSPolicy` → the `ServiceRoute`s of its namespace
//! - `Gateway` → the `ServiceRoute`s referencing it; `ServiceRoute` → its
//!   referenced `Gateway`
//! - istio-labeled `Service` → the `Gateway`s selecting its controller
//!
//! The closures read reflector state through [`Stores`](crate::context::Stores)
//! query helpers and delegate to the pure functions here, which only turn
//! already-resolved names into typed [`ObjectRef`]s. Keeping the functions
//! free of store handles makes the fan-out shape unit-testable.

use k8s_openapi::api::core::v1::Service;
use kube::runtime::reflector::{Lookup, ObjectRef};
use kube::ResourceExt;

use crate::config::OperatorConfig;
use crate::crd::{Gateway, ServiceRoute};
use crate::labels::ISTIO_SELECTOR_LABEL;

/// Turn cluster-scoped resource names into object references.
#[must_use]
pub fn cluster_scoped_refs<K>(names: &[String]) -> Vec<ObjectRef<K>>
where
    K: Lookup,
    K::DynamicType: Default,
{
    names.iter().map(|name| ObjectRef::new(name)).collect()
}

/// Turn `(name, namespace)` pairs into object references.
#[must_use]
pub fn namespaced_refs<K>(pairs: &[(String, String)]) -> Vec<ObjectRef<K>>
where
    K: Lookup,
    K::DynamicType: Default,
{
    pairs
        .iter()
        .map(|(name, namespace)| ObjectRef::new(name).within(namespace))
        .collect()
}

/// Reference to the gateway a route's `gatewayName`/`gatewayNamespace`
/// fields resolve to.
///
/// When a route appears, changes, or goes away, the referenced gateway must
/// re-aggregate its host set.
#[must_use]
pub fn referenced_gateway(route: &ServiceRoute, config: &OperatorConfig) -> ObjectRef<Gateway> {
    let namespace = config.resolve_gateway_namespace(route.spec.gateway_namespace.as_deref());
    ObjectRef::new(&route.spec.gateway_name).within(&namespace)
}

/// The ingress controller an istio-labeled Service belongs to.
///
/// Returns `None` for Services without the label; the watcher's label
/// selector makes that rare, but a removed label mid-watch must not panic
/// the mapper.
#[must_use]
pub fn ingress_controller_of(service: &Service) -> Option<String> {
    service.labels().get(ISTIO_SELECTOR_LABEL).cloned()
}
