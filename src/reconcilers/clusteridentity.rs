// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ClusterIdentity` reconciliation logic.
//!
//! The identity is a fleet singleton: every hostname the operator derives
//! embeds its fields, so nothing else converges until it exists. This
//! reconciler enforces the singleton (oldest instance wins), validates the
//! spec, soft-validates `adoptsRegions` against the DNS topology, and
//! publishes the result to the shared identity cache that every other
//! reconciler reads.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, info, warn};

use crate::cache::{authoritative_instance, fetch_topology, ClusterInfo};
use crate::constants::{DEPENDENCY_REQUEUE_DURATION_SECS, READY_REQUEUE_DURATION_SECS};
use crate::context::Context;
use crate::crd::{ClusterIdentity, ClusterIdentitySpec, ClusterIdentityStatus, Phase};
use crate::labels::FINALIZER_CLUSTER_IDENTITY;
use crate::status_reasons::{
    CONDITION_TYPE_ADOPTED_REGIONS_VALID, CONDITION_TYPE_READY, REASON_INVALID_SPEC,
    REASON_RECONCILE_SUCCEEDED, REASON_REGIONS_VALID, REASON_SINGLETON_VIOLATION,
    REASON_TOPOLOGY_UNAVAILABLE, REASON_UNKNOWN_REGIONS,
};

use super::finalizers::{ensure_cluster_finalizer, handle_cluster_deletion, FinalizerCleanup};
use super::next_action;
use super::status::{
    condition_changed, conditions_equal, emit_condition_event, find_condition,
    patch_cluster_status, update_condition_in_memory, StatusOutcome,
};

#[async_trait::async_trait]
impl FinalizerCleanup for ClusterIdentity {
    async fn cleanup(&self, ctx: &Context) -> Result<()> {
        info!(
            "Clearing identity cache for deleted ClusterIdentity {}",
            self.name_any()
        );
        ctx.identity_cache.clear();
        Ok(())
    }
}

/// Check the identity spec fields the hostname grammar depends on.
///
/// Returns the first problem found, or `None` when the spec is usable.
/// The CRD schema enforces the same constraints at admission; this covers
/// resources created before the schema was installed.
pub(crate) fn validate_spec(spec: &ClusterIdentitySpec) -> Option<String> {
    if spec.region.trim().is_empty() {
        return Some("spec.region must not be empty".to_string());
    }
    if spec.cluster.trim().is_empty() {
        return Some("spec.cluster must not be empty".to_string());
    }
    if spec.domain.trim().is_empty() {
        return Some("spec.domain must not be empty".to_string());
    }
    if spec.environment_letter.trim().is_empty() {
        return Some("spec.environmentLetter must not be empty".to_string());
    }
    None
}

/// Reconciles a `ClusterIdentity` resource.
///
/// Workflow:
/// 1. Handles deletion (clears the identity cache, removes the finalizer)
/// 2. Ensures the finalizer is present
/// 3. Enforces the fleet singleton: the oldest instance is authoritative,
///    younger duplicates are marked `Failed`
/// 4. Validates the spec fields every derived hostname embeds
/// 5. Soft-validates `adoptsRegions` against the DNS topology
/// 6. Publishes the identity to the shared cache and updates status
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail; validation problems
/// are reported through status conditions, not as errors.
pub async fn reconcile_clusteridentity(
    ctx: Arc<Context>,
    identity: ClusterIdentity,
) -> Result<Action> {
    let client = ctx.client.clone();
    let name = identity.name_any();

    info!("Reconciling ClusterIdentity: {}", name);
    debug!(
        name = %name,
        generation = ?identity.metadata.generation,
        "Starting ClusterIdentity reconciliation"
    );

    // Handle deletion if the identity is being deleted
    if identity.metadata.deletion_timestamp.is_some() {
        handle_cluster_deletion(&ctx, &identity, FINALIZER_CLUSTER_IDENTITY).await?;
        return Ok(Action::await_change());
    }

    // Ensure finalizer is present
    ensure_cluster_finalizer(&client, &identity, FINALIZER_CLUSTER_IDENTITY).await?;

    // Singleton enforcement: the oldest instance (ties broken by name) is
    // authoritative, every younger duplicate is rejected without touching
    // the authoritative one.
    let api: Api<ClusterIdentity> = Api::all(client.clone());
    let instances = api
        .list(&ListParams::default())
        .await
        .context("Failed to list ClusterIdentity instances")?;

    let authoritative = authoritative_instance(&instances.items).map(ResourceExt::name_any);
    if instances.items.len() > 1 && authoritative.as_deref() != Some(name.as_str()) {
        let winner = authoritative.unwrap_or_default();
        warn!(
            "ClusterIdentity {} conflicts with authoritative instance {}",
            name, winner
        );
        let message =
            format!("ClusterIdentity {winner} is authoritative; delete this duplicate instance");
        let outcome = update_status(
            &ctx,
            &identity,
            Phase::Failed,
            "False",
            REASON_SINGLETON_VIOLATION,
            &message,
            None,
        )
        .await?;
        // The duplicate recovers by requeue once the authoritative instance
        // is deleted; its deletion does not enqueue this object.
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Spec validation
    if let Some(problem) = validate_spec(&identity.spec) {
        warn!("ClusterIdentity {} has an invalid spec: {}", name, problem);
        let outcome = update_status(
            &ctx,
            &identity,
            Phase::Failed,
            "False",
            REASON_INVALID_SPEC,
            &problem,
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Soft validation of adopted regions against the DNS topology. A missing
    // or unreadable topology is reported on its own condition and never
    // blocks publication of the identity itself.
    let adopted: Vec<String> = identity
        .spec
        .adopts_regions
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect();

    let adopted_condition = if adopted.is_empty() {
        (
            "True",
            REASON_REGIONS_VALID,
            "No adopted regions declared".to_string(),
        )
    } else {
        match fetch_topology(&ctx.topology_cache, client.clone()).await {
            Ok(Some(topology)) => {
                let unknown: Vec<&str> = adopted
                    .iter()
                    .filter(|region| !topology.has_region(region))
                    .map(String::as_str)
                    .collect();
                if unknown.is_empty() {
                    (
                        "True",
                        REASON_REGIONS_VALID,
                        format!("All {} adopted regions are configured", adopted.len()),
                    )
                } else {
                    (
                        "False",
                        REASON_UNKNOWN_REGIONS,
                        format!(
                            "Adopted regions not present in the DNS topology: {}",
                            unknown.join(", ")
                        ),
                    )
                }
            }
            Ok(None) => (
                "False",
                REASON_TOPOLOGY_UNAVAILABLE,
                "No DNSConfiguration exists to validate adopted regions against".to_string(),
            ),
            Err(e) => {
                warn!(
                    "Failed to fetch DNS topology while validating ClusterIdentity {}: {:#}",
                    name, e
                );
                (
                    "False",
                    REASON_TOPOLOGY_UNAVAILABLE,
                    "DNS topology could not be read; adopted regions not validated".to_string(),
                )
            }
        }
    };

    // Publish to the identity cache before the status write so consumers see
    // fresh identity data even if the status patch hits a conflict.
    let info = ClusterInfo::from(&identity);
    debug!(
        region = %info.region,
        cluster = %info.cluster,
        domain = %info.domain,
        "Publishing cluster identity to cache"
    );
    ctx.identity_cache.set(info);

    let message = format!(
        "Cluster {} published for region {}",
        identity.spec.cluster, identity.spec.region
    );
    let outcome = update_status(
        &ctx,
        &identity,
        Phase::Active,
        "True",
        REASON_RECONCILE_SUCCEEDED,
        &message,
        Some(adopted_condition),
    )
    .await?;

    Ok(next_action(
        &outcome,
        Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
    ))
}

/// Patch the `ClusterIdentity` status if it changed.
///
/// Updates the `Ready` condition and, when provided, the
/// `AdoptedRegionsValid` condition. Emits a Kubernetes Event when the
/// `Ready` condition transitions.
async fn update_status(
    ctx: &Context,
    identity: &ClusterIdentity,
    phase: Phase,
    ready_status: &str,
    reason: &str,
    message: &str,
    adopted_condition: Option<(&str, &str, String)>,
) -> Result<StatusOutcome> {
    let current = identity.status.clone().unwrap_or_default();

    let mut conditions = current.conditions.clone();
    update_condition_in_memory(
        &mut conditions,
        CONDITION_TYPE_READY,
        ready_status,
        reason,
        message,
    );
    if let Some((status, reason, message)) = adopted_condition {
        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_ADOPTED_REGIONS_VALID,
            status,
            reason,
            &message,
        );
    }

    let new_status = ClusterIdentityStatus {
        conditions,
        observed_generation: identity.metadata.generation,
        phase,
    };

    if current.phase == new_status.phase
        && current.observed_generation == new_status.observed_generation
        && conditions_equal(&current.conditions, &new_status.conditions)
    {
        debug!(
            "ClusterIdentity {} status unchanged, skipping update",
            identity.name_any()
        );
        return Ok(StatusOutcome::Unchanged);
    }

    let outcome =
        patch_cluster_status::<ClusterIdentity>(&ctx.client, &identity.name_any(), &new_status)
            .await?;

    if outcome == StatusOutcome::Applied {
        if let Some(ready) = find_condition(&new_status.conditions, CONDITION_TYPE_READY) {
            let previous = find_condition(&current.conditions, CONDITION_TYPE_READY).cloned();
            if condition_changed(&previous, ready) {
                emit_condition_event(&ctx.client, identity, ready).await;
            }
        }
    }

    Ok(outcome)
}
