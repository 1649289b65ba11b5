// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Gateway` reconciliation logic.
//!
//! A fleetdns `Gateway` aggregates the source hostnames of every
//! `ServiceRoute` that resolves to it and materializes them as one Istio
//! gateway with a single HTTPS server block. Readiness splits in two:
//! `Ready` tracks whether any route feeds the gateway, `DNSReady` tracks
//! whether the ingress controller's LoadBalancer Service has an IP that
//! infrastructure DNS records can point at.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::cache::{fetch_cluster_info, ClusterInfo};
use crate::config::OperatorConfig;
use crate::constants::{
    DEPENDENCY_REQUEUE_DURATION_SECS, GATEWAY_HTTPS_PORT, GATEWAY_HTTPS_PORT_NAME,
    GATEWAY_HTTPS_PROTOCOL, GATEWAY_TLS_MODE, LOAD_BALANCER_REQUEUE_DURATION_SECS,
    READY_REQUEUE_DURATION_SECS,
};
use crate::context::Context;
use crate::crd::{Gateway, GatewaySpec, GatewayStatus, Phase, ServiceRoute};
use crate::external::{
    Gateway as IstioGateway, IstioGatewaySpec, IstioPort, IstioServer, IstioServerTls,
};
use crate::hostnames::{is_valid_postfix, source_hostname};
use crate::labels::{managed_labels, FINALIZER_GATEWAY, ISTIO_SELECTOR_LABEL};
use crate::status_reasons::{
    CONDITION_TYPE_DNS_READY, CONDITION_TYPE_READY, REASON_CLUSTER_IDENTITY_NOT_FOUND,
    REASON_INVALID_SPEC, REASON_LOAD_BALANCER_PENDING, REASON_LOAD_BALANCER_READY,
    REASON_NO_SERVICE_ROUTES, REASON_RECONCILE_SUCCEEDED,
};

use super::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use super::next_action;
use super::resources::{apply_istio_gateway, build_owner_references, delete_istio_gateway};
use super::status::{
    condition_changed, conditions_equal, emit_condition_event, find_condition,
    patch_namespaced_status, update_condition_in_memory, StatusOutcome,
};

#[async_trait::async_trait]
impl FinalizerCleanup for Gateway {
    async fn cleanup(&self, ctx: &Context) -> Result<()> {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();
        info!("Deleting derived Istio gateway {}/{}", namespace, name);
        delete_istio_gateway(&ctx.client, &namespace, &name).await?;
        Ok(())
    }
}

/// Check the gateway spec fields the derived resources depend on.
///
/// Returns the first problem found, or `None` when the spec is usable.
pub(crate) fn validate_spec(spec: &GatewaySpec) -> Option<String> {
    if spec.controller.trim().is_empty() {
        return Some("spec.controller must not be empty".to_string());
    }
    if spec.credential_name.trim().is_empty() {
        return Some("spec.credentialName must not be empty".to_string());
    }
    if !is_valid_postfix(&spec.target_postfix) {
        return Some(format!(
            "spec.targetPostfix {:?} must be lowercase alphanumeric runs separated by single hyphens",
            spec.target_postfix
        ));
    }
    None
}

/// Aggregate the source hostnames of every route that resolves to a gateway.
///
/// A route resolves to the gateway when its `gatewayName` matches and its
/// namespace reference (explicit `gatewayNamespace` or the configured
/// default) matches the gateway's namespace. Routes mid-deletion and routes
/// with unusable hostname fields contribute nothing; the set is ordered so
/// the derived host list is deterministic.
#[must_use]
pub fn aggregate_route_hosts(
    routes: &[Arc<ServiceRoute>],
    gateway_name: &str,
    gateway_namespace: &str,
    config: &OperatorConfig,
    info: &ClusterInfo,
) -> BTreeSet<String> {
    routes
        .iter()
        .filter(|route| route.metadata.deletion_timestamp.is_none())
        .filter(|route| route.spec.gateway_name == gateway_name)
        .filter(|route| {
            config.resolve_gateway_namespace(route.spec.gateway_namespace.as_deref())
                == gateway_namespace
        })
        .filter(|route| {
            !route.spec.service_name.trim().is_empty()
                && !route.spec.environment.trim().is_empty()
                && !route.spec.application.trim().is_empty()
        })
        .map(|route| {
            source_hostname(
                &route.spec.service_name,
                &info.environment_letter,
                &route.spec.environment,
                &route.spec.application,
                &info.domain,
            )
        })
        .collect()
}

/// Build the desired Istio gateway for a fleetdns `Gateway`.
///
/// One HTTPS:443 server block in SIMPLE TLS mode bound to the gateway's
/// credential, selecting the ingress deployment labeled
/// `istio=<controller>`. The derived object shares the owner's name and
/// namespace and carries an owner reference for cascade deletion.
#[must_use]
pub fn build_istio_gateway(gateway: &Gateway, hosts: &BTreeSet<String>) -> IstioGateway {
    let mut selector = BTreeMap::new();
    selector.insert(
        ISTIO_SELECTOR_LABEL.to_string(),
        gateway.spec.controller.clone(),
    );

    IstioGateway {
        metadata: ObjectMeta {
            name: Some(gateway.name_any()),
            namespace: gateway.namespace(),
            labels: Some(managed_labels()),
            owner_references: Some(build_owner_references(gateway)),
            ..ObjectMeta::default()
        },
        spec: IstioGatewaySpec {
            selector,
            servers: vec![IstioServer {
                port: IstioPort {
                    number: GATEWAY_HTTPS_PORT,
                    name: GATEWAY_HTTPS_PORT_NAME.to_string(),
                    protocol: GATEWAY_HTTPS_PROTOCOL.to_string(),
                },
                hosts: hosts.iter().cloned().collect(),
                tls: Some(IstioServerTls {
                    mode: GATEWAY_TLS_MODE.to_string(),
                    credential_name: gateway.spec.credential_name.clone(),
                }),
            }],
        },
    }
}

/// First assigned ingress IP of a Service, if any.
#[must_use]
pub fn load_balancer_ingress_ip(service: &Service) -> Option<String> {
    service
        .status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .iter()
        .find_map(|ingress| ingress.ip.clone().filter(|ip| !ip.is_empty()))
}

/// Reconciles a `Gateway` resource.
///
/// Workflow:
/// 1. Handles deletion (deletes the derived Istio gateway, removes the
///    finalizer)
/// 2. Ensures the finalizer is present
/// 3. Validates the spec fields the derived resources embed
/// 4. Aggregates source hostnames from every route resolving to this
///    gateway; an empty set deletes the derived Istio gateway
/// 5. Creates or patches the derived Istio gateway
/// 6. Resolves the ingress LoadBalancer IP for `DNSReady` independently of
///    host aggregation
///
/// # Errors
///
/// Returns an error if Kubernetes API operations fail; validation problems
/// are reported through status conditions, not as errors.
pub async fn reconcile_gateway(ctx: Arc<Context>, gateway: Gateway) -> Result<Action> {
    let client = ctx.client.clone();
    let namespace = gateway.namespace().unwrap_or_default();
    let name = gateway.name_any();

    info!("Reconciling Gateway: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        controller = %gateway.spec.controller,
        generation = ?gateway.metadata.generation,
        "Starting Gateway reconciliation"
    );

    // Handle deletion if the gateway is being deleted
    if gateway.metadata.deletion_timestamp.is_some() {
        handle_deletion(&ctx, &gateway, FINALIZER_GATEWAY).await?;
        return Ok(Action::await_change());
    }

    // Ensure finalizer is present
    ensure_finalizer(&client, &gateway, FINALIZER_GATEWAY).await?;

    // Spec validation
    if let Some(problem) = validate_spec(&gateway.spec) {
        warn!("Gateway {}/{} has an invalid spec: {}", namespace, name, problem);
        let outcome = update_status(
            &ctx,
            &gateway,
            Phase::Failed,
            ("False", REASON_INVALID_SPEC, problem),
            None,
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS)),
        ));
    }

    // Hard dependency: the cluster identity provides the hostname parts.
    let Some(info) = fetch_cluster_info(&ctx.identity_cache, client.clone()).await? else {
        debug!("No ClusterIdentity available, Gateway {}/{} pending", namespace, name);
        let outcome = update_status(
            &ctx,
            &gateway,
            Phase::Pending,
            (
                "False",
                REASON_CLUSTER_IDENTITY_NOT_FOUND,
                "No ClusterIdentity exists; hostnames cannot be derived".to_string(),
            ),
            None,
            None,
        )
        .await?;
        return Ok(next_action(
            &outcome,
            Action::requeue(Duration::from_secs(DEPENDENCY_REQUEUE_DURATION_SECS)),
        ));
    };

    // Host aggregation across the fleet-wide route store.
    let routes = ctx.stores.service_routes.state();
    let hosts = aggregate_route_hosts(&routes, &name, &namespace, &ctx.config, &info);

    // DNS readiness is resolved independently of host aggregation: the
    // LoadBalancer IP feeds the infrastructure A records either way.
    let load_balancer_ip = ctx
        .stores
        .load_balancer_service_for(&gateway.spec.controller)
        .and_then(|service| load_balancer_ingress_ip(&service));

    let dns_ready = match &load_balancer_ip {
        Some(ip) => (
            "True",
            REASON_LOAD_BALANCER_READY,
            format!("Load balancer IP {ip} assigned"),
        ),
        None => (
            "False",
            REASON_LOAD_BALANCER_PENDING,
            format!(
                "Waiting for a LoadBalancer Service with label {}={}",
                ISTIO_SELECTOR_LABEL, gateway.spec.controller
            ),
        ),
    };

    let outcome = if hosts.is_empty() {
        debug!("No routes resolve to Gateway {}/{}", namespace, name);
        delete_istio_gateway(&client, &namespace, &name).await?;
        update_status(
            &ctx,
            &gateway,
            Phase::Pending,
            (
                "False",
                REASON_NO_SERVICE_ROUTES,
                "No ServiceRoute references this gateway".to_string(),
            ),
            Some(dns_ready),
            load_balancer_ip.clone(),
        )
        .await?
    } else {
        let desired = build_istio_gateway(&gateway, &hosts);
        apply_istio_gateway(&client, &desired).await?;

        let phase = if load_balancer_ip.is_some() {
            Phase::Active
        } else {
            Phase::Pending
        };
        update_status(
            &ctx,
            &gateway,
            phase,
            (
                "True",
                REASON_RECONCILE_SUCCEEDED,
                format!("Serving {} hosts", hosts.len()),
            ),
            Some(dns_ready),
            load_balancer_ip.clone(),
        )
        .await?
    };

    // While the load balancer has no IP the gateway polls for it; watches
    // on the Service cover the common path, the requeue covers IP changes
    // that arrive without an event.
    let on_success = if load_balancer_ip.is_some() {
        Action::requeue(Duration::from_secs(READY_REQUEUE_DURATION_SECS))
    } else {
        Action::requeue(Duration::from_secs(LOAD_BALANCER_REQUEUE_DURATION_SECS))
    };

    Ok(next_action(&outcome, on_success))
}

/// Patch the `Gateway` status if it changed.
///
/// `dns_ready` is `None` when the reconcile failed before the load
/// balancer was resolved; the existing `DNSReady` condition is left as-is
/// in that case.
async fn update_status(
    ctx: &Context,
    gateway: &Gateway,
    phase: Phase,
    ready: (&str, &str, String),
    dns_ready: Option<(&str, &str, String)>,
    load_balancer_ip: Option<String>,
) -> Result<StatusOutcome> {
    let namespace = gateway.namespace().unwrap_or_default();
    let current = gateway.status.clone().unwrap_or_default();

    let mut conditions = current.conditions.clone();
    let (ready_status, ready_reason, ready_message) = ready;
    update_condition_in_memory(
        &mut conditions,
        CONDITION_TYPE_READY,
        ready_status,
        ready_reason,
        &ready_message,
    );
    if let Some((status, reason, message)) = dns_ready {
        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_DNS_READY,
            status,
            reason,
            &message,
        );
    }

    let new_status = GatewayStatus {
        conditions,
        observed_generation: gateway.metadata.generation,
        phase,
        load_balancer_ip,
    };

    if current.phase == new_status.phase
        && current.load_balancer_ip == new_status.load_balancer_ip
        && current.observed_generation == new_status.observed_generation
        && conditions_equal(&current.conditions, &new_status.conditions)
    {
        debug!(
            "Gateway {}/{} status unchanged, skipping update",
            namespace,
            gateway.name_any()
        );
        return Ok(StatusOutcome::Unchanged);
    }

    let outcome =
        patch_namespaced_status::<Gateway>(&ctx.client, &namespace, &gateway.name_any(), &new_status)
            .await?;

    if outcome == StatusOutcome::Applied {
        if let Some(ready) = find_condition(&new_status.conditions, CONDITION_TYPE_READY) {
            let previous = find_condition(&current.conditions, CONDITION_TYPE_READY).cloned();
            if condition_changed(&previous, ready) {
                emit_condition_event(&ctx.client, gateway, ready).await;
            }
        }
    }

    Ok(outcome)
}
