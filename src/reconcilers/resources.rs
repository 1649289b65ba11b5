// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create, patch, and delete helpers for the derived resources.
//!
//! The operator owns two kinds of derived resources: Istio `Gateway` objects
//! realizing the ingress data plane and external-dns `DNSEndpoint` objects
//! carrying the DNS records. Both follow the same convergence contract:
//!
//! - **apply** helpers diff the live object against the desired one and only
//!   patch when the operator-owned fields differ, so a steady-state reconcile
//!   makes no writes and triggers no further watch events;
//! - **delete** helpers treat "already gone" as success.
//!
//! Creation/update/deletion counts feed the Prometheus metrics.

use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::constants::{KIND_DNS_ENDPOINT, KIND_ISTIO_GATEWAY};
use crate::external::{DNSEndpoint, Gateway as IstioGateway, IstioGatewaySpec};
use crate::metrics;

use super::ignore_not_found;

/// Build owner references for a derived resource.
///
/// Sets up cascade deletion so the derived Istio gateway or DNS record goes
/// away with its owner even if the finalizer never runs.
#[must_use]
pub fn build_owner_references<K>(owner: &K) -> Vec<OwnerReference>
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    vec![OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: owner.name_any(),
        uid: owner.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// What an apply helper did to converge the live object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The resource did not exist and was created.
    Created,
    /// The resource existed but differed and was patched.
    Updated,
    /// The resource already matched the desired state.
    Unchanged,
}

/// Compare two Istio gateway specs over the fields the operator manages.
///
/// Host lists are compared as sets: Istio and other writers may reorder
/// them, and order carries no meaning for serving.
#[must_use]
pub fn istio_specs_equivalent(current: &IstioGatewaySpec, desired: &IstioGatewaySpec) -> bool {
    if current.selector != desired.selector || current.servers.len() != desired.servers.len() {
        return false;
    }

    current.servers.iter().zip(&desired.servers).all(|(c, d)| {
        c.port == d.port
            && c.tls == d.tls
            && c.hosts.iter().collect::<BTreeSet<_>>() == d.hosts.iter().collect::<BTreeSet<_>>()
    })
}

/// Check whether a live DNS record drifted from the desired one.
///
/// Besides the spec, the operator owns the record's identity labels (the GC
/// selectors key off them) and the agent annotation (topology changes move
/// records between DNS agents), so drift in either forces a patch. Labels
/// and annotations added by other writers are left alone.
#[must_use]
pub fn dns_endpoint_needs_patch(existing: &DNSEndpoint, desired: &DNSEndpoint) -> bool {
    if existing.spec != desired.spec {
        return true;
    }

    let labels_match = desired
        .labels()
        .iter()
        .all(|(k, v)| existing.labels().get(k) == Some(v));
    let annotations_match = desired
        .annotations()
        .iter()
        .all(|(k, v)| existing.annotations().get(k) == Some(v));

    !(labels_match && annotations_match)
}

/// Create or patch an Istio gateway to match the desired object.
///
/// Patches only when [`istio_specs_equivalent`] reports drift; the patch
/// replaces the whole spec with the desired one.
///
/// # Errors
///
/// Returns an error if the get, create, or patch API call fails.
pub async fn apply_istio_gateway(client: &Client, desired: &IstioGateway) -> Result<ApplyOutcome> {
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let api: Api<IstioGateway> = Api::namespaced(client.clone(), &namespace);

    match api.get(&name).await {
        Ok(existing) => {
            if istio_specs_equivalent(&existing.spec, &desired.spec) {
                debug!("Istio gateway {}/{} already up to date", namespace, name);
                return Ok(ApplyOutcome::Unchanged);
            }

            let patch = json!({ "spec": desired.spec });
            api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .with_context(|| format!("Failed to patch Istio gateway {namespace}/{name}"))?;

            info!(
                "Updated Istio gateway {}/{} ({} hosts)",
                namespace,
                name,
                desired.spec.servers.first().map_or(0, |s| s.hosts.len())
            );
            metrics::record_resource_updated(KIND_ISTIO_GATEWAY);
            Ok(ApplyOutcome::Updated)
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            api.create(&PostParams::default(), desired)
                .await
                .with_context(|| format!("Failed to create Istio gateway {namespace}/{name}"))?;

            info!(
                "Created Istio gateway {}/{} ({} hosts)",
                namespace,
                name,
                desired.spec.servers.first().map_or(0, |s| s.hosts.len())
            );
            metrics::record_resource_created(KIND_ISTIO_GATEWAY);
            Ok(ApplyOutcome::Created)
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to get Istio gateway {namespace}/{name}"))
        }
    }
}

/// Create or patch a DNS record to match the desired object.
///
/// Patches only when [`dns_endpoint_needs_patch`] reports drift; the patch
/// covers the spec plus the operator-owned labels and annotations.
///
/// # Errors
///
/// Returns an error if the get, create, or patch API call fails.
pub async fn apply_dns_endpoint(client: &Client, desired: &DNSEndpoint) -> Result<ApplyOutcome> {
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let api: Api<DNSEndpoint> = Api::namespaced(client.clone(), &namespace);

    match api.get(&name).await {
        Ok(existing) => {
            if !dns_endpoint_needs_patch(&existing, desired) {
                debug!("DNS record {}/{} already up to date", namespace, name);
                return Ok(ApplyOutcome::Unchanged);
            }

            let patch = json!({
                "metadata": {
                    "labels": desired.labels(),
                    "annotations": desired.annotations(),
                },
                "spec": desired.spec,
            });
            api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .with_context(|| format!("Failed to patch DNS record {namespace}/{name}"))?;

            info!("Updated DNS record {}/{}", namespace, name);
            metrics::record_resource_updated(KIND_DNS_ENDPOINT);
            Ok(ApplyOutcome::Updated)
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            api.create(&PostParams::default(), desired)
                .await
                .with_context(|| format!("Failed to create DNS record {namespace}/{name}"))?;

            info!("Created DNS record {}/{}", namespace, name);
            metrics::record_resource_created(KIND_DNS_ENDPOINT);
            Ok(ApplyOutcome::Created)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to get DNS record {namespace}/{name}")),
    }
}

/// Delete an Istio gateway, treating absence as success.
///
/// Returns `true` when the call actually removed something.
///
/// # Errors
///
/// Returns an error if the delete API call fails with anything but 404.
pub async fn delete_istio_gateway(client: &Client, namespace: &str, name: &str) -> Result<bool> {
    let api: Api<IstioGateway> = Api::namespaced(client.clone(), namespace);
    let deleted = ignore_not_found(api.delete(name, &DeleteParams::default()).await)
        .with_context(|| format!("Failed to delete Istio gateway {namespace}/{name}"))?
        .is_some();

    if deleted {
        info!("Deleted Istio gateway {}/{}", namespace, name);
        metrics::record_resource_deleted(KIND_ISTIO_GATEWAY);
    }
    Ok(deleted)
}

/// Delete a DNS record, treating absence as success.
///
/// Returns `true` when the call actually removed something.
///
/// # Errors
///
/// Returns an error if the delete API call fails with anything but 404.
pub async fn delete_dns_endpoint(client: &Client, namespace: &str, name: &str) -> Result<bool> {
    let api: Api<DNSEndpoint> = Api::namespaced(client.clone(), namespace);
    let deleted = ignore_not_found(api.delete(name, &DeleteParams::default()).await)
        .with_context(|| format!("Failed to delete DNS record {namespace}/{name}"))?
        .is_some();

    if deleted {
        info!("Deleted DNS record {}/{}", namespace, name);
        metrics::record_resource_deleted(KIND_DNS_ENDPOINT);
    }
    Ok(deleted)
}

/// List the DNS records in a namespace matching a label selector.
///
/// # Errors
///
/// Returns an error if the list API call fails.
pub async fn list_dns_endpoints(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<Vec<DNSEndpoint>> {
    let api: Api<DNSEndpoint> = Api::namespaced(client.clone(), namespace);
    let records = api
        .list(&ListParams::default().labels(selector))
        .await
        .with_context(|| format!("Failed to list DNS records in {namespace} ({selector})"))?;
    Ok(records.items)
}

/// Delete every DNS record in a namespace matching a label selector.
///
/// Used for route cleanup (all records of one `ServiceRoute`) where the whole
/// labeled set goes away at once. Returns the number of records removed.
///
/// # Errors
///
/// Returns an error if the list or any delete API call fails.
pub async fn delete_dns_endpoints_matching(
    client: &Client,
    namespace: &str,
    selector: &str,
) -> Result<usize> {
    let records = list_dns_endpoints(client, namespace, selector).await?;

    let mut deleted = 0;
    for record in &records {
        if delete_dns_endpoint(client, namespace, &record.name_any()).await? {
            deleted += 1;
        }
    }

    if deleted > 0 {
        info!(
            "Deleted {} DNS record(s) in {} matching {}",
            deleted, namespace, selector
        );
    }
    Ok(deleted)
}
