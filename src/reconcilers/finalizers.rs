// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management shared by every fleetdns reconciler.
//!
//! Resources that own derived state (DNS records, Istio gateways, the
//! process-wide caches) carry a finalizer so their cleanup runs before
//! Kubernetes lets the object go. The entry points come in namespaced and
//! cluster-scoped pairs because the fleet singletons (ClusterIdentity,
//! DNSConfiguration) have no namespace; both pairs funnel into the same
//! patch helpers.
//!
//! Cleanup receives the shared [`Context`] rather than a bare client because
//! the singleton resources must clear their process-wide caches on deletion,
//! not just delete API objects.

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::info;

use crate::context::Context;

/// Cleanup hook run while a resource is deleting and still holds its
/// finalizer.
///
/// # Errors
///
/// If `cleanup` fails the finalizer stays on the resource and deletion
/// remains blocked until a later reconcile succeeds. Implementations must
/// treat already-deleted children as success so retries converge.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    async fn cleanup(&self, ctx: &Context) -> Result<()>;
}

fn has_finalizer<T: ResourceExt>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Display name for log lines: `Kind ns/name` or `Kind name`.
fn describe<T>(resource: &T) -> String
where
    T: Resource<DynamicType = ()> + ResourceExt,
{
    match resource.namespace() {
        Some(ns) => format!("{} {}/{}", T::kind(&()), ns, resource.name_any()),
        None => format!("{} {}", T::kind(&()), resource.name_any()),
    }
}

/// Merge-patch the full finalizer list onto the resource's metadata.
async fn patch_finalizers<T>(api: &Api<T>, name: &str, finalizers: &[String]) -> Result<()>
where
    T: Resource<DynamicType = ()>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

async fn add_finalizer_via<T>(api: &Api<T>, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if has_finalizer(resource, finalizer) {
        return Ok(());
    }
    info!(
        resource = %describe(resource),
        finalizer = finalizer,
        "Adding finalizer"
    );
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    patch_finalizers(api, &resource.name_any(), &finalizers).await
}

async fn drop_finalizer_via<T>(api: &Api<T>, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = ()>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }
    info!(
        resource = %describe(resource),
        finalizer = finalizer,
        "Removing finalizer"
    );
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != finalizer);
    patch_finalizers(api, &resource.name_any(), &finalizers).await
}

/// Add a finalizer to a namespaced resource if not already present.
///
/// Idempotent; a present finalizer is left alone.
///
/// # Errors
///
/// Returns an error if the metadata patch fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::namespaced(client.clone(), &resource.namespace().unwrap_or_default());
    add_finalizer_via(&api, resource, finalizer).await
}

/// Remove a finalizer from a namespaced resource.
///
/// Idempotent; removing an absent finalizer is a no-op. Typically called
/// through [`handle_deletion`], which runs cleanup first.
///
/// # Errors
///
/// Returns an error if the metadata patch fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::namespaced(client.clone(), &resource.namespace().unwrap_or_default());
    drop_finalizer_via(&api, resource, finalizer).await
}

/// Run cleanup for a deleting namespaced resource, then release its
/// finalizer.
///
/// Call this when the resource carries a deletion timestamp. If the
/// finalizer is already gone there is nothing left to do.
///
/// # Errors
///
/// Returns an error if cleanup or the finalizer removal fails; the
/// finalizer then stays in place and deletion remains blocked.
pub async fn handle_deletion<T>(ctx: &Context, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }
    info!(resource = %describe(resource), "Running deletion cleanup");
    resource.cleanup(ctx).await?;
    remove_finalizer(&ctx.client, resource, finalizer).await
}

/// [`ensure_finalizer`] for cluster-scoped resources.
///
/// # Errors
///
/// Returns an error if the metadata patch fails.
pub async fn ensure_cluster_finalizer<T>(
    client: &Client,
    resource: &T,
    finalizer: &str,
) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::all(client.clone());
    add_finalizer_via(&api, resource, finalizer).await
}

/// [`remove_finalizer`] for cluster-scoped resources.
///
/// # Errors
///
/// Returns an error if the metadata patch fails.
pub async fn remove_cluster_finalizer<T>(
    client: &Client,
    resource: &T,
    finalizer: &str,
) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::all(client.clone());
    drop_finalizer_via(&api, resource, finalizer).await
}

/// [`handle_deletion`] for cluster-scoped resources.
///
/// # Errors
///
/// Returns an error if cleanup or the finalizer removal fails.
pub async fn handle_cluster_deletion<T>(ctx: &Context, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }
    info!(resource = %describe(resource), "Running deletion cleanup");
    resource.cleanup(ctx).await?;
    remove_cluster_finalizer(&ctx.client, resource, finalizer).await
}
