// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed definitions of foreign resources the operator writes but does not own.
//!
//! Two external control planes consume the resources defined here:
//!
//! - **Istio** realizes the ingress data plane from `networking.istio.io`
//!   [`Gateway`] resources.
//! - **external-dns** agents propagate `externaldns.k8s.io` [`DNSEndpoint`]
//!   resources to the DNS backends.
//!
//! Both CRDs are installed by their own projects, so the `crdgen` binary
//! never emits them; the types exist purely to get typed `Api` handles and
//! schema-checked serialization.
//!
//! The Istio root type generated here is also named `Gateway`. Import it as
//! `use fleetdns::external::Gateway as IstioGateway;` to keep it apart from
//! the fleetdns [`Gateway`](crate::crd::Gateway) CRD.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Istio Gateway (networking.istio.io/v1beta1)
// ============================================================================

/// Spec of an Istio `Gateway`.
///
/// Only the fields the operator manages are modeled. Istio tolerates the
/// omission of everything else, and the drift check in the gateway
/// reconciler only compares these fields.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "Gateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IstioGatewaySpec {
    /// Workload selector; `{"istio": <controller>}` targets an ingress deployment.
    #[serde(default)]
    pub selector: BTreeMap<String, String>,

    /// Server blocks exposed by this gateway.
    #[serde(default)]
    pub servers: Vec<IstioServer>,
}

/// One server block of an Istio gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioServer {
    /// Port the gateway listens on.
    pub port: IstioPort,

    /// Hostnames served on this port.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// TLS termination settings; absent for plaintext servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<IstioServerTls>,
}

/// Listening port of an Istio gateway server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioPort {
    /// Port number (e.g., 443).
    pub number: u32,

    /// Port name (e.g., "https").
    pub name: String,

    /// Protocol (e.g., "HTTPS", "HTTP", "TCP").
    pub protocol: String,
}

/// TLS settings of an Istio gateway server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IstioServerTls {
    /// TLS mode (e.g., "SIMPLE", "MUTUAL", "PASSTHROUGH").
    pub mode: String,

    /// Name of the Kubernetes TLS secret holding the certificate.
    pub credential_name: String,
}

// ============================================================================
// external-dns DNSEndpoint (externaldns.k8s.io/v1alpha1)
// ============================================================================

/// Spec of an external-dns `DNSEndpoint`.
#[derive(CustomResource, Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "externaldns.k8s.io",
    version = "v1alpha1",
    kind = "DNSEndpoint",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DNSEndpointSpec {
    /// DNS records requested by this endpoint resource.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// A single DNS record within a `DNSEndpoint`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Fully qualified record name.
    pub dns_name: String,

    /// Record type (e.g., "A", "CNAME").
    pub record_type: String,

    /// Record targets: IP addresses for A records, hostnames for CNAMEs.
    #[serde(default)]
    pub targets: Vec<String>,

    /// Record TTL in seconds.
    // external-dns spells this field "recordTTL", which camelCase renaming
    // would mangle to "recordTtl".
    #[serde(rename = "recordTTL", skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<i64>,
}
