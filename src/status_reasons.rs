// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for fleetdns resources.
//!
//! This module defines constants for condition reasons following Kubernetes conventions.
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! ## Primary Condition
//!
//! All resources carry a single encompassing `type: Ready` condition that indicates
//! the overall health of the resource.
//!
//! ## Secondary Conditions
//!
//! Two resources carry an additional condition alongside `Ready`:
//!
//! - **`ClusterIdentity`**: `AdoptedRegionsValid` reports whether every entry in
//!   `spec.adoptsRegions` is known to the fleet DNS topology. It never gates
//!   `Ready`; an identity with unknown adopted regions still serves the cluster.
//! - **`Gateway`**: `DNSReady` reports whether the ingress load balancer for the
//!   gateway's controller has been assigned an external IP. A gateway can be
//!   `Ready` (hosts configured) while DNS is still pending.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   phase: Active
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: ReconcileSucceeded
//!       message: "Ingress gateway configured with 3 hosts"
//!     - type: DNSReady
//!       status: "False"
//!       reason: LoadBalancerPending
//!       message: "No load balancer IP assigned for controller ingressgateway"
//! ```

// ============================================================================
// Common Reasons (All Resources)
// ============================================================================

/// Reconciliation completed and the resource is fully operational.
pub const REASON_RECONCILE_SUCCEEDED: &str = "ReconcileSucceeded";

/// Another, older instance of a fleet singleton already exists.
///
/// `ClusterIdentity` and `DNSConfiguration` are singletons: the oldest
/// instance (by creation timestamp, name as tie-break) is authoritative and
/// keeps working; every younger instance is marked `Failed` with this reason
/// and is otherwise ignored.
pub const REASON_SINGLETON_VIOLATION: &str = "SingletonViolation";

/// The resource spec failed structural validation.
///
/// Used by the singleton resources and `Gateway` for malformed specs
/// (empty required fields, invalid `targetPostfix`, empty controller list).
/// The resource is marked `Failed` and is not retried until it is edited.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// A `ServiceRoute` spec failed structural validation.
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

// ============================================================================
// Dependency Reasons
// ============================================================================

/// No authoritative `ClusterIdentity` exists in the fleet yet.
pub const REASON_CLUSTER_IDENTITY_NOT_FOUND: &str = "ClusterIdentityNotFound";

/// No authoritative `DNSConfiguration` exists in the fleet yet.
pub const REASON_DNS_CONFIGURATION_NOT_FOUND: &str = "DNSConfigurationNotFound";

/// The fleet `DNSConfiguration` exists but configures no DNS controllers.
pub const REASON_NO_CONTROLLERS_CONFIGURED: &str = "NoControllersConfigured";

/// The namespace holds no `DNSPolicy`, so routes in it cannot publish DNS.
pub const REASON_DNS_POLICY_NOT_FOUND: &str = "DNSPolicyNotFound";

/// The namespace `DNSPolicy` evaluated to inactive on this cluster.
pub const REASON_DNS_POLICY_INACTIVE: &str = "DNSPolicyInactive";

/// The `Gateway` referenced by a `ServiceRoute` does not exist.
pub const REASON_GATEWAY_NOT_FOUND: &str = "GatewayNotFound";

// ============================================================================
// DNSPolicy Specific Reasons
// ============================================================================

/// The policy is active on this cluster and selected at least one controller.
pub const REASON_POLICY_ACTIVE: &str = "PolicyActive";

/// The policy evaluated to inactive on this cluster.
///
/// The policy pins a `sourceRegion` or `sourceCluster` that does not match
/// this cluster's identity. Adopted regions never affect activation, only
/// the controller fan-out of an already-active policy.
pub const REASON_POLICY_INACTIVE: &str = "PolicyInactive";

// ============================================================================
// Gateway Specific Reasons
// ============================================================================

/// No `ServiceRoute` in the fleet references this gateway.
///
/// An ingress gateway with no hosts is invalid, so the derived resource is
/// removed until at least one route appears.
pub const REASON_NO_SERVICE_ROUTES: &str = "NoServiceRoutes";

/// The ingress load balancer has an external IP assigned.
pub const REASON_LOAD_BALANCER_READY: &str = "LoadBalancerReady";

/// No load balancer Service with an external IP matches the gateway's controller.
///
/// Common causes:
/// - The Istio ingress deployment for this controller is not installed
/// - The cloud provider has not finished provisioning the load balancer
/// - The Service is not of type `LoadBalancer`
pub const REASON_LOAD_BALANCER_PENDING: &str = "LoadBalancerPending";

// ============================================================================
// ClusterIdentity Specific Reasons
// ============================================================================

/// Every adopted region is present in the fleet DNS topology.
pub const REASON_REGIONS_VALID: &str = "RegionsValid";

/// One or more adopted regions are unknown to the fleet DNS topology.
///
/// This is a soft failure: the identity stays `Ready` and policies that
/// reference the known regions keep working.
pub const REASON_UNKNOWN_REGIONS: &str = "UnknownRegions";

/// The fleet DNS topology could not be read while validating adopted regions.
pub const REASON_TOPOLOGY_UNAVAILABLE: &str = "TopologyUnavailable";

// ============================================================================
// Condition Types
// ============================================================================

/// Primary condition type indicating overall resource readiness.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Secondary condition on `Gateway` tracking load balancer DNS readiness.
pub const CONDITION_TYPE_DNS_READY: &str = "DNSReady";

/// Secondary condition on `ClusterIdentity` tracking adopted-region validity.
pub const CONDITION_TYPE_ADOPTED_REGIONS_VALID: &str = "AdoptedRegionsValid";
