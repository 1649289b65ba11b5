// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Infrastructure DNS record reconciliation.
//!
//! Every `(ingress controller, target postfix)` pair served by a live
//! `Gateway` needs one A record per configured DNS controller, pointing the
//! target hostname at the controller's LoadBalancer IP. These records are
//! global state, not owned by any single resource, so this reconciler runs
//! as one debounced singleton loop instead of a per-resource controller:
//! every triggering event maps to the same logical pass.
//!
//! Each pass garbage-collects records for pairs no live gateway serves
//! anymore, then ensures records for the pairs that remain.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, ResourceExt};
use tracing::{debug, error, info};

use crate::cache::{fetch_cluster_info, fetch_topology, DnsController};
use crate::constants::{
    DEFAULT_DNS_RECORD_TTL_SECS, INGRESS_DNS_DEBOUNCE_SECS, INGRESS_DNS_RESYNC_SECS,
};
use crate::context::Context;
use crate::crd::{ClusterIdentity, DNSConfiguration, Gateway};
use crate::external::{DNSEndpoint, DNSEndpointSpec, Endpoint};
use crate::hostnames::{infra_record_name, is_valid_postfix, target_hostname};
use crate::labels::{
    infra_record_labels, infra_record_selector, DNS_AGENT_ANNOTATION, INGRESS_CONTROLLER_LABEL,
    ISTIO_SELECTOR_LABEL, TARGET_POSTFIX_LABEL,
};
use crate::metrics;

use super::gateway::load_balancer_ingress_ip;
use super::resources::{
    apply_dns_endpoint, build_owner_references, delete_dns_endpoint, list_dns_endpoints,
};

/// Metrics label for the singleton pass.
const RECONCILER_NAME: &str = "IngressDNS";

/// Active `(controller, targetPostfix)` pairs across live gateways.
///
/// Gateways mid-deletion are excluded so their infrastructure records are
/// garbage-collected by the same pass that observes the deletion. Pairs
/// with unusable fields never become active, which keeps malformed records
/// out of the ensure step and lets GC remove them.
#[must_use]
pub fn active_gateway_pairs(gateways: &[Gateway]) -> BTreeSet<(String, String)> {
    gateways
        .iter()
        .filter(|gw| gw.metadata.deletion_timestamp.is_none())
        .filter(|gw| {
            !gw.spec.controller.trim().is_empty() && is_valid_postfix(&gw.spec.target_postfix)
        })
        .map(|gw| (gw.spec.controller.clone(), gw.spec.target_postfix.clone()))
        .collect()
}

/// Names of infrastructure records whose pair is no longer active.
///
/// Records missing the identifying labels count as stale: they can only be
/// left over from an older labeling scheme and would otherwise leak.
#[must_use]
pub fn stale_infra_records(
    records: &[DNSEndpoint],
    active: &BTreeSet<(String, String)>,
) -> Vec<String> {
    records
        .iter()
        .filter(|record| {
            let labels = record.labels();
            let controller = labels
                .get(INGRESS_CONTROLLER_LABEL)
                .cloned()
                .unwrap_or_default();
            let postfix = labels.get(TARGET_POSTFIX_LABEL).cloned().unwrap_or_default();
            !active.contains(&(controller, postfix))
        })
        .map(ResourceExt::name_any)
        .collect()
}

/// Build one infrastructure A record for an active pair and DNS controller.
///
/// The record lives in the LoadBalancer Service's namespace and is owned by
/// the Service rather than any gateway: its content is IP-driven, so its
/// lifecycle follows the Service that holds the IP.
#[must_use]
pub fn build_infra_record(
    service: &Service,
    controller: &str,
    target_postfix: &str,
    dns_controller: &DnsController,
    agent: &str,
    target_host: &str,
    ip: &str,
) -> DNSEndpoint {
    let mut annotations = BTreeMap::new();
    annotations.insert(DNS_AGENT_ANNOTATION.to_string(), agent.to_string());

    DNSEndpoint {
        metadata: ObjectMeta {
            name: Some(infra_record_name(
                controller,
                target_postfix,
                &dns_controller.name,
            )),
            namespace: service.namespace(),
            labels: Some(infra_record_labels(
                controller,
                target_postfix,
                &dns_controller.name,
            )),
            annotations: Some(annotations),
            owner_references: Some(build_owner_references(service)),
            ..ObjectMeta::default()
        },
        spec: DNSEndpointSpec {
            endpoints: vec![Endpoint {
                dns_name: target_host.to_string(),
                record_type: "A".to_string(),
                targets: vec![ip.to_string()],
                record_ttl: Some(DEFAULT_DNS_RECORD_TTL_SECS),
            }],
        },
    }
}

/// Run one global infrastructure DNS pass.
///
/// Pass 1 (GC): list gateways fleet-wide, build the active pair set, and
/// delete any infrastructure record in an ingress namespace whose pair is
/// not active. Pass 2 (ensure): for each active pair with an assigned
/// LoadBalancer IP, create-or-patch one A record per configured DNS
/// controller, annotated with the agent responsible for that controller's
/// region.
///
/// Missing identity or topology defers the ensure step to a later pass;
/// GC still runs so orphans never wait on the singletons.
///
/// # Errors
///
/// Returns an error if a Kubernetes API operation fails; the caller logs
/// and retries on the next trigger or resync.
pub async fn reconcile_ingress_dns(ctx: &Context) -> Result<()> {
    let client = ctx.client.clone();
    debug!("Starting infrastructure DNS pass");

    // GC works off an authoritative list, not the reflector store: deleting
    // a record because the store lagged would bounce live DNS.
    let gateway_api: Api<Gateway> = Api::all(client.clone());
    let gateways = gateway_api
        .list(&ListParams::default())
        .await
        .context("Failed to list Gateways for the infrastructure DNS pass")?;
    let active = active_gateway_pairs(&gateways.items);

    let service_api: Api<Service> = Api::all(client.clone());
    let services = service_api
        .list(&ListParams::default().labels(ISTIO_SELECTOR_LABEL))
        .await
        .context("Failed to list ingress Services for the infrastructure DNS pass")?;

    let mut namespaces: Vec<String> = services
        .items
        .iter()
        .filter_map(ResourceExt::namespace)
        .collect();
    namespaces.sort();
    namespaces.dedup();

    let selector = infra_record_selector();
    for namespace in &namespaces {
        let records = list_dns_endpoints(&client, namespace, &selector).await?;
        for name in stale_infra_records(&records, &active) {
            info!(
                "Infrastructure DNS record {}/{} no longer matches a live gateway, deleting",
                namespace, name
            );
            delete_dns_endpoint(&client, namespace, &name).await?;
        }
    }

    // Ensure step needs the singletons; without them there is nothing to
    // point records at yet.
    let Some(info) = fetch_cluster_info(&ctx.identity_cache, client.clone()).await? else {
        debug!("No ClusterIdentity available, skipping infrastructure record ensure");
        return Ok(());
    };
    let Some(topology) = fetch_topology(&ctx.topology_cache, client.clone()).await? else {
        debug!("No DNSConfiguration available, skipping infrastructure record ensure");
        return Ok(());
    };

    for (controller, postfix) in &active {
        // Deterministic pick when several LoadBalancer Services carry the
        // same controller label.
        let service = services
            .items
            .iter()
            .filter(|svc| {
                svc.labels().get(ISTIO_SELECTOR_LABEL).map(String::as_str)
                    == Some(controller.as_str())
                    && svc
                        .spec
                        .as_ref()
                        .and_then(|spec| spec.type_.as_deref())
                        == Some("LoadBalancer")
            })
            .min_by_key(|svc| svc.name_any());

        let Some(service) = service else {
            debug!(
                "No LoadBalancer Service labeled {}={}, skipping pair ({}, {})",
                ISTIO_SELECTOR_LABEL, controller, controller, postfix
            );
            continue;
        };

        let Some(ip) = load_balancer_ingress_ip(service) else {
            debug!(
                "Service {}/{} has no ingress IP yet, skipping pair ({}, {})",
                service.namespace().unwrap_or_default(),
                service.name_any(),
                controller,
                postfix
            );
            continue;
        };

        let target_host = target_hostname(&info.cluster, &info.region, postfix, &info.domain);
        for dns_controller in &topology.controllers {
            let agent = topology
                .agent_for_region(&dns_controller.region)
                .unwrap_or(&dns_controller.name);
            let record = build_infra_record(
                service,
                controller,
                postfix,
                dns_controller,
                agent,
                &target_host,
                &ip,
            );
            apply_dns_endpoint(&client, &record).await?;
        }
    }

    debug!("Infrastructure DNS pass complete");
    Ok(())
}

/// Watch stream reduced to bare change notifications.
fn trigger_stream<K>(api: Api<K>, config: WatcherConfig) -> BoxStream<'static, ()>
where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug + Send + 'static,
{
    watcher(api, config)
        .touched_objects()
        .default_backoff()
        .filter_map(|event| futures::future::ready(event.ok()))
        .map(|_| ())
        .boxed()
}

/// Drive the infrastructure DNS singleton loop.
///
/// Merges watch streams over everything a pass reads (gateways, ingress
/// Services, the two fleet singletons) into a single trigger, debounces
/// bursts, and reruns the pass on a fixed resync interval even without
/// events. Pass failures are logged and retried; they never kill the loop.
pub async fn run_ingress_dns(ctx: Arc<Context>) -> Result<()> {
    info!("Starting infrastructure DNS reconciler");
    let client = ctx.client.clone();

    let config = WatcherConfig::default().any_semantic();
    let mut triggers = futures::stream::select_all(vec![
        trigger_stream(Api::<Gateway>::all(client.clone()), config.clone()),
        trigger_stream(
            Api::<Service>::all(client.clone()),
            config.clone().labels(ISTIO_SELECTOR_LABEL),
        ),
        trigger_stream(Api::<ClusterIdentity>::all(client.clone()), config.clone()),
        trigger_stream(Api::<DNSConfiguration>::all(client.clone()), config),
    ]);

    loop {
        let start = Instant::now();
        match reconcile_ingress_dns(&ctx).await {
            Ok(()) => metrics::record_reconciliation_success(RECONCILER_NAME, start.elapsed()),
            Err(e) => {
                metrics::record_reconciliation_error(RECONCILER_NAME, start.elapsed());
                metrics::record_error(RECONCILER_NAME, "reconcile");
                error!("Infrastructure DNS pass failed: {:#}", e);
            }
        }

        let resync = tokio::time::sleep(Duration::from_secs(INGRESS_DNS_RESYNC_SECS));
        tokio::pin!(resync);
        tokio::select! {
            _ = triggers.next() => {
                // Let a burst of related events settle, then drain whatever
                // queued up so one pass covers the whole burst.
                tokio::time::sleep(Duration::from_secs(INGRESS_DNS_DEBOUNCE_SECS)).await;
                while triggers.next().now_or_never().flatten().is_some() {}
            }
            () = &mut resync => {
                debug!("Infrastructure DNS resync interval elapsed");
            }
        }
    }
}
