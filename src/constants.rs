// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the fleetdns operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all fleetdns CRDs
pub const API_GROUP: &str = "fleetdns.firestoned.io";

/// API version for all fleetdns CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "fleetdns.firestoned.io/v1alpha1";

/// Kind name for `ClusterIdentity` resource
pub const KIND_CLUSTER_IDENTITY: &str = "ClusterIdentity";

/// Kind name for `DNSConfiguration` resource
pub const KIND_DNS_CONFIGURATION: &str = "DNSConfiguration";

/// Kind name for `DNSPolicy` resource
pub const KIND_DNS_POLICY: &str = "DNSPolicy";

/// Kind name for `Gateway` resource
pub const KIND_GATEWAY: &str = "Gateway";

/// Kind name for `ServiceRoute` resource
pub const KIND_SERVICE_ROUTE: &str = "ServiceRoute";

// ============================================================================
// External API Constants
// ============================================================================

/// API group/version for Istio networking resources
pub const ISTIO_API_GROUP_VERSION: &str = "networking.istio.io/v1beta1";

/// Kind name for the Istio `Gateway` resource
pub const KIND_ISTIO_GATEWAY: &str = "Gateway";

/// API group/version for external-dns `DNSEndpoint` resources
pub const EXTERNAL_DNS_API_GROUP_VERSION: &str = "externaldns.k8s.io/v1alpha1";

/// Kind name for the external-dns `DNSEndpoint` resource
pub const KIND_DNS_ENDPOINT: &str = "DNSEndpoint";

// ============================================================================
// DNS Record Constants
// ============================================================================

/// Default TTL for generated DNS records (5 minutes)
pub const DEFAULT_DNS_RECORD_TTL_SECS: i64 = 300;

/// HTTPS port exposed by generated ingress gateway servers
pub const GATEWAY_HTTPS_PORT: u32 = 443;

/// Port name for generated ingress gateway servers
pub const GATEWAY_HTTPS_PORT_NAME: &str = "https";

/// Protocol for generated ingress gateway servers
pub const GATEWAY_HTTPS_PROTOCOL: &str = "HTTPS";

/// TLS mode for generated ingress gateway servers
pub const GATEWAY_TLS_MODE: &str = "SIMPLE";

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Periodic resync interval for successfully reconciled resources (5 minutes)
pub const READY_REQUEUE_DURATION_SECS: u64 = 300;

/// Requeue duration while a required dependency is missing (30 seconds)
pub const DEPENDENCY_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration after a status-update conflict (5 seconds)
pub const CONFLICT_REQUEUE_DURATION_SECS: u64 = 5;

/// Requeue duration while waiting for a load balancer IP (15 seconds)
pub const LOAD_BALANCER_REQUEUE_DURATION_SECS: u64 = 15;

/// Debounce window for the ingress DNS loop after a watch event (2 seconds)
pub const INGRESS_DNS_DEBOUNCE_SECS: u64 = 2;

/// Periodic resync interval for the ingress DNS loop (5 minutes)
pub const INGRESS_DNS_RESYNC_SECS: u64 = 300;

// ============================================================================
// Configuration Defaults
// ============================================================================

/// Default namespace searched for `Gateway` resources when a `ServiceRoute`
/// does not name one explicitly
pub const DEFAULT_GATEWAY_NAMESPACE: &str = "ingress";

/// Environment variable overriding the default gateway namespace
pub const ENV_GATEWAY_NAMESPACE: &str = "FLEETDNS_GATEWAY_NAMESPACE";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
