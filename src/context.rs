// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers with reflector stores.
//!
//! This module provides the core infrastructure for the shared reflector store pattern.
//! All controllers receive an `Arc<Context>` that contains:
//! - Kubernetes client
//! - Reflector stores for all watched resource types
//! - Operator configuration resolved at startup
//! - The cluster identity and DNS topology caches
//!
//! The stores enable O(1) in-memory lookups for cross-resource queries,
//! eliminating the need for API list calls in watch mappers.

use crate::cache::{ClusterInfo, DnsTopology, SingletonCache};
use crate::config::OperatorConfig;
use crate::crd::{ClusterIdentity, DNSConfiguration, DNSPolicy, Gateway, ServiceRoute};
use crate::labels::ISTIO_SELECTOR_LABEL;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};
use std::sync::Arc;

/// Shared context passed to all controllers.
///
/// This context provides access to:
/// - Kubernetes client for API operations
/// - Reflector stores for efficient cross-resource queries
/// - Startup configuration (default gateway namespace)
/// - The identity and topology caches written by their owning reconcilers
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Reflector stores for all watched resource types
    pub stores: Stores,

    /// Operator configuration resolved from the environment at startup
    pub config: OperatorConfig,

    /// Cluster identity cache, written only by the ClusterIdentity reconciler
    pub identity_cache: Arc<SingletonCache<ClusterInfo>>,

    /// DNS topology cache, written only by the DNSConfiguration reconciler
    pub topology_cache: Arc<SingletonCache<DnsTopology>>,
}

impl Context {
    /// Resolve the namespace a `ServiceRoute`'s gateway reference points at.
    ///
    /// Uses the route's explicit `gatewayNamespace` when set and non-empty,
    /// otherwise the configured default gateway namespace.
    #[must_use]
    pub fn gateway_namespace_for(&self, route: &ServiceRoute) -> String {
        self.config
            .resolve_gateway_namespace(route.spec.gateway_namespace.as_deref())
    }
}

/// Collection of all reflector stores for cross-controller queries.
///
/// Each store is populated by a dedicated reflector task and provides
/// in-memory access to resources without API calls.
#[derive(Clone)]
pub struct Stores {
    // Cluster-scoped singletons
    pub cluster_identities: Store<ClusterIdentity>,
    pub dns_configurations: Store<DNSConfiguration>,

    // Namespace-scoped resources
    pub dns_policies: Store<DNSPolicy>,
    pub gateways: Store<Gateway>,
    pub service_routes: Store<ServiceRoute>,

    /// Istio ingress Services (watched with an `istio` label-existence selector)
    pub ingress_services: Store<Service>,
}

impl Stores {
    /// Get a specific `Gateway` by name and namespace from the store.
    #[must_use]
    pub fn get_gateway(&self, name: &str, namespace: &str) -> Option<Arc<Gateway>> {
        self.gateways
            .state()
            .iter()
            .find(|gw| gw.name_any() == name && gw.namespace().as_deref() == Some(namespace))
            .cloned()
    }

    /// Get the authoritative `DNSPolicy` for a namespace.
    ///
    /// There is expected to be exactly one policy per namespace. When several
    /// exist, the first by name is authoritative so that every reconciliation
    /// of the namespace agrees on the same policy.
    #[must_use]
    pub fn policy_for_namespace(&self, namespace: &str) -> Option<Arc<DNSPolicy>> {
        self.dns_policies
            .state()
            .into_iter()
            .filter(|policy| policy.namespace().as_deref() == Some(namespace))
            .min_by_key(|policy| policy.name_any())
    }

    /// List all `ServiceRoute`s in a namespace as (name, namespace) tuples.
    ///
    /// Used by the DNSPolicy watch mapper: a policy change re-enqueues every
    /// route in its namespace.
    #[must_use]
    pub fn service_routes_in_namespace(&self, namespace: &str) -> Vec<(String, String)> {
        self.service_routes
            .state()
            .iter()
            .filter(|route| route.namespace().as_deref() == Some(namespace))
            .map(|route| (route.name_any(), route.namespace().unwrap_or_default()))
            .collect()
    }

    /// Find all `ServiceRoute`s whose gateway reference resolves to the given gateway.
    ///
    /// A route references a gateway by `gatewayName` plus an optional
    /// `gatewayNamespace`; when the namespace is unset the configured default
    /// is assumed, so the caller supplies it.
    #[must_use]
    pub fn service_routes_for_gateway(
        &self,
        gateway_name: &str,
        gateway_namespace: &str,
        default_gateway_namespace: &str,
    ) -> Vec<(String, String)> {
        self.service_routes
            .state()
            .iter()
            .filter(|route| {
                let resolved_ns = route
                    .spec
                    .gateway_namespace
                    .as_deref()
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or(default_gateway_namespace);
                route.spec.gateway_name == gateway_name && resolved_ns == gateway_namespace
            })
            .map(|route| (route.name_any(), route.namespace().unwrap_or_default()))
            .collect()
    }

    /// Find all fleetdns `Gateway`s whose `spec.controller` matches the given
    /// ingress controller value.
    ///
    /// Used by the Service watch mapper: a LoadBalancer Service labeled
    /// `istio: <controller>` affects exactly these gateways.
    #[must_use]
    pub fn gateways_for_controller(&self, controller: &str) -> Vec<(String, String)> {
        self.gateways
            .state()
            .iter()
            .filter(|gw| gw.spec.controller == controller)
            .map(|gw| (gw.name_any(), gw.namespace().unwrap_or_default()))
            .collect()
    }

    /// List every fleetdns `Gateway` as (name, namespace) tuples.
    #[must_use]
    pub fn all_gateways(&self) -> Vec<(String, String)> {
        self.gateways
            .state()
            .iter()
            .map(|gw| (gw.name_any(), gw.namespace().unwrap_or_default()))
            .collect()
    }

    /// List every `ServiceRoute` as (name, namespace) tuples.
    #[must_use]
    pub fn all_service_routes(&self) -> Vec<(String, String)> {
        self.service_routes
            .state()
            .iter()
            .map(|route| (route.name_any(), route.namespace().unwrap_or_default()))
            .collect()
    }

    /// List every `DNSPolicy` as (name, namespace) tuples.
    #[must_use]
    pub fn all_dns_policies(&self) -> Vec<(String, String)> {
        self.dns_policies
            .state()
            .iter()
            .map(|policy| (policy.name_any(), policy.namespace().unwrap_or_default()))
            .collect()
    }

    /// List the names of every `ClusterIdentity` instance (cluster-scoped).
    #[must_use]
    pub fn all_cluster_identities(&self) -> Vec<String> {
        self.cluster_identities
            .state()
            .iter()
            .map(|identity| identity.name_any())
            .collect()
    }

    /// Find the LoadBalancer Service carrying ingress traffic for a controller.
    ///
    /// Matches Services labeled `istio: <controller>` with `spec.type ==
    /// LoadBalancer`, anywhere in the fleet. The first match by
    /// namespace/name is returned so repeated lookups stay deterministic.
    #[must_use]
    pub fn load_balancer_service_for(&self, controller: &str) -> Option<Arc<Service>> {
        self.ingress_services
            .state()
            .into_iter()
            .filter(|svc| {
                svc.labels().get(ISTIO_SELECTOR_LABEL).map(String::as_str) == Some(controller)
                    && svc
                        .spec
                        .as_ref()
                        .and_then(|spec| spec.type_.as_deref())
                        .is_some_and(|ty| ty == "LoadBalancer")
            })
            .min_by_key(|svc| (svc.namespace().unwrap_or_default(), svc.name_any()))
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
