// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for multi-region DNS and ingress management.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by fleetdns
//! to converge DNS records and ingress gateways across a fleet of clusters.
//!
//! # Resource Types
//!
//! ## Fleet Singletons (cluster-scoped)
//!
//! - [`ClusterIdentity`] - Declares where the local cluster sits in the fleet
//! - [`DNSConfiguration`] - Declares the fleet-wide DNS controller topology
//!
//! ## Namespaced Resources
//!
//! - [`DNSPolicy`] - Gates DNS publication for one namespace
//! - [`Gateway`] - Desired ingress gateway (realized as an Istio Gateway)
//! - [`ServiceRoute`] - Exposes one service through a gateway with a DNS name
//!
//! # Example: Declaring a Cluster Identity
//!
//! ```yaml
//! apiVersion: fleetdns.firestoned.io/v1alpha1
//! kind: ClusterIdentity
//! metadata:
//!   name: identity
//! spec:
//!   region: us-west
//!   cluster: prod-a
//!   domain: example.net
//!   environmentLetter: p
//!   adoptsRegions:
//!     - us-east
//! ```
//!
//! # Example: Routing a Service
//!
//! ```yaml
//! apiVersion: fleetdns.firestoned.io/v1alpha1
//! kind: ServiceRoute
//! metadata:
//!   name: checkout
//!   namespace: shop
//! spec:
//!   serviceName: checkout
//!   gatewayName: public
//!   environment: prod
//!   application: shop
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
pub struct Condition {
    /// Type of condition. Common types include: Ready, `DNSReady`, `AdoptedRegionsValid`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Lifecycle phase reported in resource statuses.
///
/// `Pending` means a dependency is missing and the resource will converge once
/// it appears; `Failed` means the spec itself is rejected and needs an edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
pub enum Phase {
    /// Resource is fully reconciled and serving its purpose.
    Active,

    /// Resource is waiting on a missing dependency.
    #[default]
    Pending,

    /// Resource spec is invalid or conflicts with the fleet state.
    Failed,
}

/// `ClusterIdentity` declares the local cluster's position in the fleet.
///
/// Exactly one instance is expected per cluster: the oldest instance (by
/// creation timestamp) is authoritative, and any younger duplicate is marked
/// `Failed`. Every hostname the operator derives embeds fields of this
/// resource, so nothing converges until it exists.
///
/// # Example
///
/// ```yaml
/// apiVersion: fleetdns.firestoned.io/v1alpha1
/// kind: ClusterIdentity
/// metadata:
///   name: identity
/// spec:
///   region: us-west
///   cluster: prod-a
///   domain: example.net
///   environmentLetter: p
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleetdns.firestoned.io",
    version = "v1alpha1",
    kind = "ClusterIdentity",
    doc = "ClusterIdentity declares the local cluster's region, name, DNS domain, and environment class. It is a fleet singleton: the oldest instance is authoritative and younger duplicates are rejected."
)]
#[kube(status = "ClusterIdentityStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterIdentitySpec {
    /// Region this cluster runs in (e.g., "us-west").
    ///
    /// Embedded in ingress target hostnames, so it must be a DNS label.
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub region: String,

    /// Name of this cluster within its region (e.g., "prod-a").
    ///
    /// Embedded in ingress target hostnames, so it must be a DNS label.
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub cluster: String,

    /// DNS domain all derived hostnames are rooted under (e.g., "example.net").
    #[schemars(regex(
        pattern = r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$"
    ))]
    pub domain: String,

    /// Single-letter environment class embedded in service hostnames
    /// (e.g., "p" for production, "s" for staging).
    #[schemars(regex(pattern = r"^[a-z]$"))]
    pub environment_letter: String,

    /// Regions this cluster serves DNS for in addition to its own.
    ///
    /// Used during regional failover: policies bound to an adopted region
    /// activate here as if the region were local. Entries are validated
    /// against the fleet `DNSConfiguration` but unknown regions only degrade
    /// the `AdoptedRegionsValid` condition, they never block reconciliation.
    #[serde(default)]
    pub adopts_regions: Option<Vec<String>>,
}

/// `ClusterIdentity` status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIdentityStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub phase: Phase,
}

/// A single DNS controller descriptor within the fleet topology.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsControllerSpec {
    /// Unique name of the DNS controller (e.g., "dns-us-west").
    ///
    /// Route record names embed this value, so it must be a DNS label.
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub name: String,

    /// Region the controller is responsible for (e.g., "us-west").
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub region: String,
}

/// `DNSConfiguration` declares the fleet-wide DNS controller topology.
///
/// Each controller descriptor names a DNS synchronization agent and the region
/// it is responsible for. Derived DNS records are fanned out per controller
/// and annotated with the agent that should pick them up. Like
/// [`ClusterIdentity`], this is a fleet singleton.
///
/// # Example
///
/// ```yaml
/// apiVersion: fleetdns.firestoned.io/v1alpha1
/// kind: DNSConfiguration
/// metadata:
///   name: topology
/// spec:
///   controllers:
///     - name: dns-us-west
///       region: us-west
///     - name: dns-us-east
///       region: us-east
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleetdns.firestoned.io",
    version = "v1alpha1",
    kind = "DNSConfiguration",
    doc = "DNSConfiguration declares the fleet-wide DNS controller topology as a list of {name, region} descriptors. It is a fleet singleton: the oldest instance is authoritative and younger duplicates are rejected."
)]
#[kube(status = "DNSConfigurationStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSConfigurationSpec {
    /// DNS controllers making up the fleet topology. At least one is required.
    pub controllers: Vec<DnsControllerSpec>,
}

/// `DNSConfiguration` status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSConfigurationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub phase: Phase,
}

/// Activation mode of a [`DNSPolicy`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DnsPolicyMode {
    /// Publish DNS through the controllers of the cluster's own region plus
    /// any adopted regions present in the topology.
    Active,

    /// Publish DNS through every configured controller, but only from the
    /// single cluster matching the policy's source region and cluster.
    RegionBound,
}

/// `DNSPolicy` gates DNS publication for the namespace it lives in.
///
/// `ServiceRoute` resources only materialize DNS records while their
/// namespace policy evaluates to active on the local cluster. The two modes
/// cover the common fleet topologies:
///
/// - `Active`: every cluster in the policy's source region publishes through
///   its regional controllers. Regional failover follows
///   `ClusterIdentity.adoptsRegions`.
/// - `RegionBound`: exactly one cluster publishes, but through every
///   configured controller. Used for fleet-global names with a single owner.
///
/// # Example
///
/// ```yaml
/// apiVersion: fleetdns.firestoned.io/v1alpha1
/// kind: DNSPolicy
/// metadata:
///   name: default
///   namespace: shop
/// spec:
///   mode: Active
///   sourceRegion: us-west
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleetdns.firestoned.io",
    version = "v1alpha1",
    kind = "DNSPolicy",
    namespaced,
    doc = "DNSPolicy gates DNS publication for one namespace. Active policies publish through the regional controllers of matching clusters; RegionBound policies publish through every controller from a single owning cluster."
)]
#[kube(status = "DNSPolicyStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSPolicySpec {
    /// Activation mode. See [`DnsPolicyMode`].
    pub mode: DnsPolicyMode,

    /// Region whose clusters this policy applies to.
    ///
    /// When unset the policy activates on every cluster; set it to pin
    /// publication to the clusters of one region.
    #[serde(default)]
    pub source_region: Option<String>,

    /// Cluster name the policy is pinned to.
    ///
    /// When unset, every cluster matching `sourceRegion` may publish.
    #[serde(default)]
    pub source_cluster: Option<String>,
}

/// `DNSPolicy` status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSPolicyStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Whether the policy is active on this cluster.
    #[serde(default)]
    pub active: bool,
    /// DNS controllers selected for record fan-out, empty when inactive.
    #[serde(default)]
    pub active_controllers: Vec<String>,
}

/// `Gateway` describes a desired ingress gateway.
///
/// The operator realizes each `Gateway` as an Istio Gateway of the same name
/// serving HTTPS for every hostname derived from the `ServiceRoute` resources
/// that reference it. The gateway also anchors the infrastructure DNS records
/// that point `{cluster}-{region}-{targetPostfix}.{domain}` names at the
/// ingress load balancer.
///
/// # Example
///
/// ```yaml
/// apiVersion: fleetdns.firestoned.io/v1alpha1
/// kind: Gateway
/// metadata:
///   name: public
///   namespace: ingress
/// spec:
///   controller: ingressgateway
///   credentialName: wildcard-example-net
///   targetPostfix: apps
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleetdns.firestoned.io",
    version = "v1alpha1",
    kind = "Gateway",
    namespaced,
    doc = "Gateway describes a desired ingress gateway, realized as an Istio Gateway serving HTTPS for the hostnames of every ServiceRoute that references it."
)]
#[kube(status = "GatewayStatus")]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// Istio ingress controller class handling this gateway.
    ///
    /// Matches the `istio` label on the ingress Deployment and its
    /// load balancer Service (e.g., "ingressgateway").
    pub controller: String,

    /// Name of the Kubernetes TLS secret presented by the gateway.
    pub credential_name: String,

    /// Postfix distinguishing this gateway's target hostnames
    /// (`{cluster}-{region}-{targetPostfix}.{domain}`).
    ///
    /// Lowercase alphanumeric runs separated by single hyphens.
    #[schemars(regex(pattern = r"^[a-z0-9]+(-[a-z0-9]+)*$"))]
    pub target_postfix: String,
}

/// `Gateway` status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub phase: Phase,
    /// External IP of the ingress load balancer, once assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,
}

/// `ServiceRoute` exposes one service through a gateway with a DNS name.
///
/// Each route contributes a source hostname
/// `{serviceName}-ns-{environmentLetter}-{environment}-{application}.{domain}`
/// to its gateway and, while the namespace `DNSPolicy` is active, one CNAME
/// record per active DNS controller pointing that hostname at the gateway's
/// target hostname.
///
/// # Example
///
/// ```yaml
/// apiVersion: fleetdns.firestoned.io/v1alpha1
/// kind: ServiceRoute
/// metadata:
///   name: checkout
///   namespace: shop
/// spec:
///   serviceName: checkout
///   gatewayName: public
///   environment: prod
///   application: shop
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleetdns.firestoned.io",
    version = "v1alpha1",
    kind = "ServiceRoute",
    namespaced,
    doc = "ServiceRoute exposes one service through a Gateway with a derived DNS name, materialized as CNAME records fanned out per active DNS controller."
)]
#[kube(status = "ServiceRouteStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceRouteSpec {
    /// Service being exposed; the first label of the derived hostname.
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub service_name: String,

    /// Name of the `Gateway` this route attaches to.
    pub gateway_name: String,

    /// Namespace of the referenced `Gateway`.
    ///
    /// Defaults to the operator's configured gateway namespace.
    #[serde(default)]
    pub gateway_namespace: Option<String>,

    /// Deployment environment embedded in the hostname (e.g., "prod").
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub environment: String,

    /// Application grouping embedded in the hostname (e.g., "shop").
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$"))]
    pub application: String,
}

/// `ServiceRoute` status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRouteStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub phase: Phase,
    /// Name of the first derived DNS record, as a convenience for `kubectl get`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_record: Option<String>,
}
