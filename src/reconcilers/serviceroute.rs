// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ServiceRoute` reconciliation logic.
//!
//! A `ServiceRoute` is the tenant-facing request for one DNS name. The
//! reconciler resolves the namespace policy, the fleet singletons, and the
//! referenced gateway, then fans the route out into one CNAME `DNSEndpoint`
//! per active DNS controller. Records are diffed by name against the
//! observed owned set, so re-running with no input change makes no writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::cache::{fetch_cluster_info, fetch_topology, ClusterInfo, DnsTopology};
use crate::constants::{
    DEFAULT_DNS_RECORD_TTL_SECS, DEPENDENCY_REQUEUE_DURATION_SECS, READY_REQUEUE_DURATION_SECS,
};
use crate::context::Context;
use crate::crd::{Phase, ServiceRoute, ServiceRouteSpec, ServiceRouteStatus};
use crate::external::{DNSEndpoint, DNSEndpointSpec, Endpoint};
use crate::hostnames::{route_record_name, source_hostname, target_hostname};
use crate::labels::{
    route_record_labels, route_record_selector, DNS_AGENT_ANNOTATION, FINALIZER_SERVICE_ROUTE,
};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_CLUSTER_IDENTITY_NOT_FOUND, REASON_DNS_CONFIGURATION_NOT_FOUND,
    REASON_DNS_POLICY_INACTIVE, REASON_DNS_POLICY_NOT_FOUND, REASON_GATEWAY_NOT_FOUND,
    REASON_RECONCILE_SUCCEEDED, REASON_VALIDATION_FAILED,
};

use super::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use super::next_action;
use super::resources::{
    apply_dns_endpoint, build_owner_references, delete_dns_endpoint, delete_dns_endpoints_matching,
    list_dns_endpoints,
};
use super::status::{
    condition_changed, conditions_equal, emit_condition_event, find_condition,
    patch_namespaced_status, update_condition_in_memory, StatusOutcome,
};

#[async_trait::async_trait]
impl FinalizerCleanup for ServiceRoute {
    async fn cleanup(&self, ctx: &Context) -> Result<()> {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();
        let selector = route_record_selector(&name);
        let deleted = delete_dns_endpoints_matching(&ctx.client, &namespace, &selector).await?;
        info!(
            "Deleted {} DNS records for removed ServiceRoute {}/{}",
            deleted, namespace, name
        );
        Ok(())
    }
}

/// Check the route spec fields the hostname grammar depends on.
///
/// Returns the first problem found, or `None` when the spec is usable.
pub(crate) fn validate_spec(spec: &ServiceRouteSpec) -> Option<String> {
    if spec.service_name.trim().is_empty() {
        return Some("spec.serviceName must not be empty".to_string());
    }
    if spec.gateway_name.trim().is_empty() {
        return Some("spec.gatewayName must not be empty".to_string());
    }
    if spec.environment.trim().is_empty() {
        return Some("spec.environment must not be empty".to_string());
    }
    if spec.application.trim().is_empty() {
        return Some("spec.application must not be empty".to_string());
    }
    None
}

/// Build one CNAME record for a route and one DNS controller.
///
/// The record lives in the route's namespace under the name
/// `{route}-{controller}` and carries the identity labels that make
/// re-discovery and cleanup idempotent. `agent` is the DNS agent the
/// consuming annotation selects; it is resolved by the caller.
#[must_use]
pub fn build_route_record(
    route: &ServiceRoute,
    controller: &str,
    agent: &str,
    source_host: &str,
    target_host: &str,
) -> DNSEndpoint {
    let namespace = route.namespace().unwrap_or_default();
    let name = route.name_any();

    let mut annotations = BTreeMap::new();
    annotations.insert(DNS_AGENT_ANNOTATION.to_string(), agent.to_string());

    DNSEndpoint {
        metadata: ObjectMeta {
            name: Some(route_record_name(&name, controller)),
            namespace: Some(namespace.clone()),
            labels: Some(route_record_labels(&name, &namespace)),
            annotations: Some(annotations),
            owner_references: Some(build_owner_references(route)),
            ..ObjectMeta::default()
        },
        spec: DNSEndpointSpec {
            endpoints: vec![Endpoint {
                dns_name: source_host.to_string(),
                record_type: "CNAME".to_string(),
                targets: vec![target_host.to_string()],
                record_ttl: Some(DEFAULT_DNS_RECORD_TTL_SECS),
            }],
        },
    }
}

/// Compute the full desired record set for a route.
///
/// One record per active controller still present in the topology; entries
/// that vanished from the topology are skipped so stale policy status never
/// resurrects records for removed controllers. All records of a route
/// carry the same annotation: the agent responsible for the cluster's own
/// region, falling back to the record's controller name when that region
/// has no agent. The adopting cluster's agent is the one alive during a
/// region takeover, so it must be the one selected to write the records.
#[must_use]
pub fn desired_route_records(
    route: &ServiceRoute,
    active_controllers: &[String],
    topology: &DnsTopology,
    info: &ClusterInfo,
    target_postfix: &str,
) -> Vec<DNSEndpoint> {
    let source_host = source_hostname(
        &route.spec.service_name,
        &info.environment_letter,
        &route.spec.environment,
        &route.spec.application,
        &info.domain,
    );
    let target_host = target_hostname(&info.cluster, &info.region, target_postfix, &info.domain);

    active_controllers
        .iter()
        .filter(|controller| topology.has_controller(controller))
        .map(|controller| {
            let agent = topology
                .agent_for_region(&info.region)
                .unwrap_or(controller.as_str());
            build_route_record(route, controller, agent, &source_host, &target_host)
        })
        .collect()
}

/// Reconciles a `ServiceRoute` resource.
///
/// Workflow:
/// 1. Handles deletion (deletes all owned records by identity labels,
///    removes the finalizer)
/// 2. Ensures the finalizer is present
/// 3. Validates required fields
/// 4. Resolves the namespace `DNSPolicy` and honors its activation as the
///    master switch; an inactive policy proactively deletes this route's
///    records so two clusters never race to claim the same name during a
///    topology transition
/// 5. Resolves identity, topology, and the referenced gateway
/// 6. Diffs desired records against observed ones: create missing, patch
///    differing, delete stale
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail; validation problems
/// are reported through status conditions, not as errors.
pub async fn reconcile_serviceroute(ctx: Arc<Context>, route: ServiceRoute) -> Result<Action> {
    let client = ctx.client.clone();
    let namespace = route.namespace().unwrap_or_default();
    let name = route.name_any();

    info!("Reconciling ServiceRoute: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        service = %route.spec.service_name,
        gateway = %route.spec.gateway_name,
        "Starting ServiceRoute reconciliation"
    );

    // Handle deletion if the route is being deleted
    if route.metadata.deletion_timestamp.is_some() {
        handle_deletion(&ctx, &route, FINALIZER_SERVICE_ROUTE).await?;
        return Ok(Action::await_change());
    }

    // Ensure finalizer is present
    ensure_finalizer(&client, &route, FINALIZER_SERVICE_ROUTE).await?;

    // Spec validation
    if let Some(problem) = validate_spec(&route.spec) {
        warn!("ServiceRoute {}/{} has an invalid spec: {}", namespace, name, problem);
        let outcome = update_status(
            &ctx,
            &route,
            Phase::Failed,
            ("False", REASON_VALIDATION_FAILED, problem),
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
        ));
    }

    // The namespace policy is the master switch for record generation.
    let Some(policy) = ctx.stores.policy_for_namespace(&namespace) else {
        debug!("No DNSPolicy in namespace {}, ServiceRoute {} pending", namespace, name);
        let outcome = update_status(
            &ctx,
            &route,
            Phase::Pending,
            (
                "False",
                REASON_DNS_POLICY_NOT_FOUND,
                format!("No DNSPolicy exists in namespace {namespace}"),
            ),
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    let policy_status = policy.status.clone().unwrap_or_default();
    if !policy_status.active {
        // Another cluster owns these names right now; drop our copies so
        // the two sides never fight over the same record.
        let selector = route_record_selector(&name);
        let removed = delete_dns_endpoints_matching(&client, &namespace, &selector).await?;
        if removed > 0 {
            info!(
                "Removed {} DNS records for ServiceRoute {}/{} under inactive policy {}",
                removed,
                namespace,
                name,
                policy.name_any()
            );
        }
        let outcome = update_status(
            &ctx,
            &route,
            Phase::Pending,
            (
                "False",
                REASON_DNS_POLICY_INACTIVE,
                format!("DNSPolicy {} is not active on this cluster", policy.name_any()),
            ),
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Hard dependencies: identity and topology, cache-first.
    let Some(info) = fetch_cluster_info(&ctx.identity_cache, client.clone()).await? else {
        let outcome = update_status(
            &ctx,
            &route,
            Phase::Pending,
            (
                "False",
                REASON_CLUSTER_IDENTITY_NOT_FOUND,
                "No ClusterIdentity exists; hostnames cannot be derived".to_string(),
            ),
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    let Some(topology) = fetch_topology(&ctx.topology_cache, client.clone()).await? else {
        let outcome = update_status(
            &ctx,
            &route,
            Phase::Pending,
            (
                "False",
                REASON_DNS_CONFIGURATION_NOT_FOUND,
                "No DNSConfiguration exists; records cannot be fanned out".to_string(),
            ),
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    // The referenced gateway provides the target postfix.
    let gateway_namespace = ctx.gateway_namespace_for(&route);
    let Some(gateway) = ctx
        .stores
        .get_gateway(&route.spec.gateway_name, &gateway_namespace)
    else {
        debug!(
            "Gateway {}/{} not found for ServiceRoute {}/{}",
            gateway_namespace, route.spec.gateway_name, namespace, name
        );
        let outcome = update_status(
            &ctx,
            &route,
            Phase::Pending,
            (
                "False",
                REASON_GATEWAY_NOT_FOUND,
                format!(
                    "Gateway {}/{} not found",
                    gateway_namespace, route.spec.gateway_name
                ),
            ),
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    let desired = desired_route_records(
        &route,
        &policy_status.active_controllers,
        &topology,
        &info,
        &gateway.spec.target_postfix,
    );

    // Diff desired against observed owned records by name.
    let selector = route_record_selector(&name);
    let observed = list_dns_endpoints(&client, &namespace, &selector).await?;

    let desired_names: BTreeSet<String> = desired.iter().map(ResourceExt::name_any).collect();
    for record in &desired {
        apply_dns_endpoint(&client, record).await?;
    }
    for record in &observed {
        let record_name = record.name_any();
        if !desired_names.contains(&record_name) {
            debug!("DNS record {}/{} is stale, deleting", namespace, record_name);
            delete_dns_endpoint(&client, &namespace, &record_name).await?;
        }
    }

    info!(
        "ServiceRoute {}/{} published {} DNS records",
        namespace,
        name,
        desired.len()
    );

    let representative = desired.first().map(ResourceExt::name_any);
    let outcome = update_status(
        &ctx,
        &route,
        Phase::Active,
        (
            "True",
            REASON_RECONCILE_SUCCEEDED,
            format!("Published {} DNS records", desired.len()),
        ),
        representative,
    )
    .await?;

    Ok(next_action(
        &outcome,
        Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
    ))
}

/// Patch the `ServiceRoute` status if it changed.
async fn update_status(
    ctx: &Context,
    route: &ServiceRoute,
    phase: Phase,
    ready: (&str, &str, String),
    dns_record: Option<String>,
) -> Result<StatusOutcome> {
    let namespace = route.namespace().unwrap_or_default();
    let current = route.status.clone().unwrap_or_default();

    let mut conditions = current.conditions.clone();
    let (ready_status, ready_reason, ready_message) = ready;
    update_condition_in_memory(
        &mut conditions,
        CONDITION_TYPE_READY,
        ready_status,
        ready_reason,
        &ready_message,
    );

    let new_status = ServiceRouteStatus {
        conditions,
        observed_generation: route.metadata.generation,
        phase,
        dns_record,
    };

    if current.phase == new_status.phase
        && current.dns_record == new_status.dns_record
        && current.observed_generation == new_status.observed_generation
        && conditions_equal(&current.conditions, &new_status.conditions)
    {
        debug!(
            "ServiceRoute {}/{} status unchanged, skipping update",
            namespace,
            route.name_any()
        );
        return Ok(StatusOutcome::Unchanged);
    }

    let outcome = patch_namespaced_status::<ServiceRoute>(
        &ctx.client,
        &namespace,
        &route.name_any(),
        &new_status,
    )
    .await?;

    if outcome == StatusOutcome::Applied {
        if let Some(ready) = find_condition(&new_status.conditions, CONDITION_TYPE_READY) {
            let previous = find_condition(&current.conditions, CONDITION_TYPE_READY).cloned();
            if condition_changed(&previous, ready) {
                emit_condition_event(&ctx.client, route, ready).await;
            }
        }
    }

    Ok(outcome)
}
