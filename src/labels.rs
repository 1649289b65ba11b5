// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and fleetdns-specific labels/annotations
//! to ensure consistency across all resources created by the controller.

use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/managed-by` on every resource this operator creates
pub const MANAGED_BY_FLEETDNS: &str = "fleetdns";

// ============================================================================
// Istio Labels
// ============================================================================

/// Label Istio places on ingress gateway workloads and Services; the value
/// matches the `controller` field of a `Gateway` spec
pub const ISTIO_SELECTOR_LABEL: &str = "istio";

// ============================================================================
// fleetdns-Specific Labels
// ============================================================================

/// Label on route DNS records naming the owning `ServiceRoute`
pub const ROUTE_LABEL: &str = "fleetdns.firestoned.io/service-route";

/// Label on route DNS records naming the namespace the `ServiceRoute` lives in
pub const SOURCE_NAMESPACE_LABEL: &str = "fleetdns.firestoned.io/source-namespace";

/// Label on infrastructure DNS records naming the ingress controller
pub const INGRESS_CONTROLLER_LABEL: &str = "fleetdns.firestoned.io/ingress-controller";

/// Label on infrastructure DNS records naming the target hostname postfix
pub const TARGET_POSTFIX_LABEL: &str = "fleetdns.firestoned.io/target-postfix";

/// Label on infrastructure DNS records naming the DNS controller they were fanned out for
pub const DNS_CONTROLLER_LABEL: &str = "fleetdns.firestoned.io/dns-controller";

// ============================================================================
// fleetdns-Specific Annotations
// ============================================================================

/// Annotation consumed by the DNS synchronization agents to decide which agent
/// owns a record; the value is a configured DNS controller name
pub const DNS_AGENT_ANNOTATION: &str = "controller";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `ClusterIdentity` resources
pub const FINALIZER_CLUSTER_IDENTITY: &str = "fleetdns.firestoned.io/clusteridentity-finalizer";

/// Finalizer for `DNSConfiguration` resources
pub const FINALIZER_DNS_CONFIGURATION: &str = "fleetdns.firestoned.io/dnsconfiguration-finalizer";

/// Finalizer for `Gateway` resources
pub const FINALIZER_GATEWAY: &str = "fleetdns.firestoned.io/gateway-finalizer";

/// Finalizer for `ServiceRoute` resources
pub const FINALIZER_SERVICE_ROUTE: &str = "fleetdns.firestoned.io/serviceroute-finalizer";

// ============================================================================
// Label Builders
// ============================================================================

/// Labels applied to every resource the operator creates.
#[must_use]
pub fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(K8S_MANAGED_BY.to_string(), MANAGED_BY_FLEETDNS.to_string())])
}

/// Labels identifying a route DNS record: ownership plus the `ServiceRoute`
/// it was derived from.
#[must_use]
pub fn route_record_labels(route_name: &str, route_namespace: &str) -> BTreeMap<String, String> {
    let mut labels = managed_labels();
    labels.insert(ROUTE_LABEL.to_string(), route_name.to_string());
    labels.insert(
        SOURCE_NAMESPACE_LABEL.to_string(),
        route_namespace.to_string(),
    );
    labels
}

/// Labels identifying an infrastructure DNS record: ownership plus the
/// (ingress controller, target postfix, DNS controller) triple it serves.
#[must_use]
pub fn infra_record_labels(
    controller: &str,
    target_postfix: &str,
    dns_controller: &str,
) -> BTreeMap<String, String> {
    let mut labels = managed_labels();
    labels.insert(INGRESS_CONTROLLER_LABEL.to_string(), controller.to_string());
    labels.insert(TARGET_POSTFIX_LABEL.to_string(), target_postfix.to_string());
    labels.insert(DNS_CONTROLLER_LABEL.to_string(), dns_controller.to_string());
    labels
}

/// Label selector string matching all route records owned by one `ServiceRoute`.
#[must_use]
pub fn route_record_selector(route_name: &str) -> String {
    format!("{ROUTE_LABEL}={route_name},{K8S_MANAGED_BY}={MANAGED_BY_FLEETDNS}")
}

/// Label selector string matching every infrastructure record the operator manages.
#[must_use]
pub fn infra_record_selector() -> String {
    format!("{K8S_MANAGED_BY}={MANAGED_BY_FLEETDNS},{INGRESS_CONTROLLER_LABEL}")
}
