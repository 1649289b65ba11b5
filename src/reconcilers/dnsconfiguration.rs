// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSConfiguration` reconciliation logic.
//!
//! The DNS topology is the second fleet singleton: it names every DNS
//! controller (synchronization agent) and the region each one serves.
//! Record fan-out, agent annotations, and policy activation all read the
//! topology this reconciler publishes to the shared cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, info, warn};

use crate::cache::{authoritative_instance, DnsTopology};
use crate::constants::{DEPENDENCY_REQUEUE_DURATION_SECS, READY_REQUEUE_DURATION_SECS};
use crate::context::Context;
use crate::crd::{DNSConfiguration, DNSConfigurationSpec, DNSConfigurationStatus, Phase};
use crate::labels::FINALIZER_DNS_CONFIGURATION;
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_INVALID_SPEC, REASON_RECONCILE_SUCCEEDED,
    REASON_SINGLETON_VIOLATION,
};

use super::finalizers::{ensure_cluster_finalizer, handle_cluster_deletion, FinalizerCleanup};
use super::next_action;
use super::status::{
    condition_changed, conditions_equal, emit_condition_event, find_condition,
    patch_cluster_status, update_condition_in_memory, StatusOutcome,
};

#[async_trait::async_trait]
impl FinalizerCleanup for DNSConfiguration {
    async fn cleanup(&self, ctx: &Context) -> Result<()> {
        info!(
            "Clearing topology cache for deleted DNSConfiguration {}",
            self.name_any()
        );
        ctx.topology_cache.clear();
        Ok(())
    }
}

/// Check the controller descriptors the record fan-out depends on.
///
/// Returns the first problem found, or `None` when the topology is usable.
pub(crate) fn validate_spec(spec: &DNSConfigurationSpec) -> Option<String> {
    if spec.controllers.is_empty() {
        return Some("spec.controllers must contain at least one controller".to_string());
    }
    for (index, controller) in spec.controllers.iter().enumerate() {
        if controller.name.trim().is_empty() {
            return Some(format!("spec.controllers[{index}].name must not be empty"));
        }
        if controller.region.trim().is_empty() {
            return Some(format!("spec.controllers[{index}].region must not be empty"));
        }
    }
    let mut seen = std::collections::BTreeSet::new();
    for controller in &spec.controllers {
        if !seen.insert(controller.name.as_str()) {
            return Some(format!(
                "spec.controllers contains duplicate controller name {}",
                controller.name
            ));
        }
    }
    None
}

/// Reconciles a `DNSConfiguration` resource.
///
/// Workflow:
/// 1. Handles deletion (clears the topology cache, removes the finalizer)
/// 2. Ensures the finalizer is present
/// 3. Enforces the fleet singleton: the oldest instance is authoritative,
///    younger duplicates are marked `Failed`
/// 4. Validates the controller descriptors
/// 5. Publishes the topology to the shared cache and updates status
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail; validation problems
/// are reported through status conditions, not as errors.
pub async fn reconcile_dnsconfiguration(
    ctx: Arc<Context>,
    config: DNSConfiguration,
) -> Result<Action> {
    let client = ctx.client.clone();
    let name = config.name_any();

    info!("Reconciling DNSConfiguration: {}", name);
    debug!(
        name = %name,
        generation = ?config.metadata.generation,
        controllers = config.spec.controllers.len(),
        "Starting DNSConfiguration reconciliation"
    );

    // Handle deletion if the configuration is being deleted
    if config.metadata.deletion_timestamp.is_some() {
        handle_cluster_deletion(&ctx, &config, FINALIZER_DNS_CONFIGURATION).await?;
        return Ok(Action::await_change());
    }

    // Ensure finalizer is present
    ensure_cluster_finalizer(&client, &config, FINALIZER_DNS_CONFIGURATION).await?;

    // Singleton enforcement, same rule as ClusterIdentity: oldest wins.
    let api: Api<DNSConfiguration> = Api::all(client.clone());
    let instances = api
        .list(&ListParams::default())
        .await
        .context("Failed to list DNSConfiguration instances")?;

    let authoritative = authoritative_instance(&instances.items).map(ResourceExt::name_any);
    if instances.items.len() > 1 && authoritative.as_deref() != Some(name.as_str()) {
        let winner = authoritative.unwrap_or_default();
        warn!(
            "DNSConfiguration {} conflicts with authoritative instance {}",
            name, winner
        );
        let message =
            format!("DNSConfiguration {winner} is authoritative; delete this duplicate instance");
        let outcome = update_status(
            &ctx,
            &config,
            Phase::Failed,
            "False",
            REASON_SINGLETON_VIOLATION,
            &message,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Spec validation
    if let Some(problem) = validate_spec(&config.spec) {
        warn!("DNSConfiguration {} has an invalid spec: {}", name, problem);
        let outcome = update_status(
            &ctx,
            &config,
            Phase::Failed,
            "False",
            REASON_INVALID_SPEC,
            &problem,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Publish to the topology cache before the status write so consumers
    // see the fresh topology even if the status patch hits a conflict.
    let topology = DnsTopology::from(&config);
    debug!(
        controllers = topology.controllers.len(),
        "Publishing DNS topology to cache"
    );
    ctx.topology_cache.set(topology);

    let message = format!(
        "DNS topology published with {} controllers",
        config.spec.controllers.len()
    );
    let outcome = update_status(
        &ctx,
        &config,
        Phase::Active,
        "True",
        REASON_RECONCILE_SUCCEEDED,
        &message,
    )
    .await?;

    Ok(next_action(
        &outcome,
        Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
    ))
}

/// Patch the `DNSConfiguration` status if it changed.
async fn update_status(
    ctx: &Context,
    config: &DNSConfiguration,
    phase: Phase,
    ready_status: &str,
    reason: &str,
    message: &str,
) -> Result<StatusOutcome> {
    let current = config.status.clone().unwrap_or_default();

    let mut conditions = current.conditions.clone();
    update_condition_in_memory(
        &mut conditions,
        CONDITION_TYPE_READY,
        ready_status,
        reason,
        message,
    );

    let new_status = DNSConfigurationStatus {
        conditions,
        observed_generation: config.metadata.generation,
        phase,
    };

    if current.phase == new_status.phase
        && current.observed_generation == new_status.observed_generation
        && conditions_equal(&current.conditions, &new_status.conditions)
    {
        debug!(
            "DNSConfiguration {} status unchanged, skipping update",
            config.name_any()
        );
        return Ok(StatusOutcome::Unchanged);
    }

    let outcome =
        patch_cluster_status::<DNSConfiguration>(&ctx.client, &config.name_any(), &new_status)
            .await?;

    if outcome == StatusOutcome::Applied {
        if let Some(ready) = find_condition(&new_status.conditions, CONDITION_TYPE_READY) {
            let previous = find_condition(&current.conditions, CONDITION_TYPE_READY).cloned();
            if condition_changed(&previous, ready) {
                emit_condition_event(&ctx.client, config, ready).await;
            }
        }
    }

    Ok(outcome)
}
