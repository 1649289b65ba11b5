// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use fleetdns::{
    cache::SingletonCache,
    config::OperatorConfig,
    constants::{
        ERROR_REQUEUE_DURATION_SECS, KIND_CLUSTER_IDENTITY, KIND_DNS_CONFIGURATION,
        KIND_DNS_POLICY, KIND_GATEWAY, KIND_SERVICE_ROUTE, TOKIO_WORKER_THREADS,
    },
    context::{Context, Stores},
    crd::{ClusterIdentity, DNSConfiguration, DNSPolicy, Gateway, ServiceRoute},
    labels::ISTIO_SELECTOR_LABEL,
    metrics,
    reconcilers::{
        reconcile_clusteridentity, reconcile_dnsconfiguration, reconcile_dnspolicy,
        reconcile_gateway, reconcile_serviceroute, run_ingress_dns,
        watches::{cluster_scoped_refs, ingress_controller_of, namespaced_refs, referenced_gateway},
    },
};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use kube::{
    runtime::{
        controller::Action, reflector, watcher, watcher::Config, Controller, WatchStreamExt,
    },
    Api, Client, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("fleetdns-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    // Example: 2025-11-29T23:45:00.123456Z main.rs:49 INFO Starting fleetdns controller
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug cargo run
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json cargo run
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting fleetdns controller");
    debug!("Logging initialized with file and line number tracking");

    // Initialize Kubernetes client
    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    // Resolve startup configuration from the environment
    let config = OperatorConfig::from_env();

    // Reflector stores shared by every controller through the Context.
    // Each store is kept warm by a dedicated background watch task, so
    // watch mappers and reconcilers can query cross-resource state without
    // issuing API list calls.
    debug!("Starting reflector stores");

    let (cluster_identities, identity_writer) = reflector::store::<ClusterIdentity>();
    spawn_reflector(
        Api::<ClusterIdentity>::all(client.clone()),
        Config::default().any_semantic(),
        identity_writer,
        KIND_CLUSTER_IDENTITY,
    );

    let (dns_configurations, configuration_writer) = reflector::store::<DNSConfiguration>();
    spawn_reflector(
        Api::<DNSConfiguration>::all(client.clone()),
        Config::default().any_semantic(),
        configuration_writer,
        KIND_DNS_CONFIGURATION,
    );

    let (dns_policies, policy_writer) = reflector::store::<DNSPolicy>();
    spawn_reflector(
        Api::<DNSPolicy>::all(client.clone()),
        Config::default().any_semantic(),
        policy_writer,
        KIND_DNS_POLICY,
    );

    let (gateways, gateway_writer) = reflector::store::<Gateway>();
    spawn_reflector(
        Api::<Gateway>::all(client.clone()),
        Config::default().any_semantic(),
        gateway_writer,
        KIND_GATEWAY,
    );

    let (service_routes, route_writer) = reflector::store::<ServiceRoute>();
    spawn_reflector(
        Api::<ServiceRoute>::all(client.clone()),
        Config::default().any_semantic(),
        route_writer,
        KIND_SERVICE_ROUTE,
    );

    // Only istio-labeled Services matter: the ingress LoadBalancers carry
    // the label, everything else in the fleet does not.
    let (ingress_services, service_writer) = reflector::store::<Service>();
    spawn_reflector(
        Api::<Service>::all(client.clone()),
        Config::default().labels(ISTIO_SELECTOR_LABEL).any_semantic(),
        service_writer,
        "Service",
    );

    let context = Arc::new(Context {
        client: client.clone(),
        stores: Stores {
            cluster_identities,
            dns_configurations,
            dns_policies,
            gateways,
            service_routes,
            ingress_services,
        },
        config,
        identity_cache: Arc::new(SingletonCache::default()),
        topology_cache: Arc::new(SingletonCache::default()),
    });

    info!("Starting all controllers");

    // Run controllers concurrently
    // Controllers should never exit - if one fails, we log it and exit the main process
    tokio::select! {
        result = run_clusteridentity_controller(context.clone()) => {
            error!("CRITICAL: ClusterIdentity controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ClusterIdentity controller exited unexpectedly without error")
        }
        result = run_dnsconfiguration_controller(context.clone()) => {
            error!("CRITICAL: DNSConfiguration controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("DNSConfiguration controller exited unexpectedly without error")
        }
        result = run_dnspolicy_controller(context.clone()) => {
            error!("CRITICAL: DNSPolicy controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("DNSPolicy controller exited unexpectedly without error")
        }
        result = run_gateway_controller(context.clone()) => {
            error!("CRITICAL: Gateway controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Gateway controller exited unexpectedly without error")
        }
        result = run_serviceroute_controller(context.clone()) => {
            error!("CRITICAL: ServiceRoute controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ServiceRoute controller exited unexpectedly without error")
        }
        result = run_ingress_dns(context.clone()) => {
            error!("CRITICAL: IngressDNS controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("IngressDNS controller exited unexpectedly without error")
        }
    }
}

/// Spawn the background watch task that keeps a reflector store warm.
///
/// The task owns the store writer and runs for the lifetime of the process;
/// watch errors are logged and retried with the default backoff.
fn spawn_reflector<K>(
    api: Api<K>,
    cfg: Config,
    writer: reflector::store::Writer<K>,
    kind: &'static str,
) where
    K: kube::Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    tokio::spawn(async move {
        reflector(writer, watcher(api, cfg))
            .touched_objects()
            .default_backoff()
            .for_each(|event| {
                match event {
                    Ok(obj) => debug!("{} reflector saw {}", kind, obj.name_any()),
                    Err(e) => warn!("{} reflector stream error: {:?}", kind, e),
                }
                futures::future::ready(())
            })
            .await;
        error!("CRITICAL: {} reflector stream ended", kind);
    });
}

/// Run the `ClusterIdentity` controller
async fn run_clusteridentity_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting ClusterIdentity controller");

    let client = ctx.client.clone();
    let api = Api::<ClusterIdentity>::all(client.clone());
    let configurations = Api::<DNSConfiguration>::all(client);

    // Topology changes re-validate the adopted regions of every identity.
    let configuration_ctx = ctx.clone();
    Controller::new(api, Config::default().any_semantic())
        .watches(
            configurations,
            Config::default().any_semantic(),
            move |_configuration: DNSConfiguration| {
                cluster_scoped_refs::<ClusterIdentity>(
                    &configuration_ctx.stores.all_cluster_identities(),
                )
            },
        )
        .run(reconcile_clusteridentity_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ClusterIdentity`
async fn reconcile_clusteridentity_wrapper(
    identity: Arc<ClusterIdentity>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        identity_name = %identity.name_any(),
        "Reconcile wrapper called for ClusterIdentity"
    );

    let start = Instant::now();
    match reconcile_clusteridentity(ctx, (*identity).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_CLUSTER_IDENTITY, start.elapsed());
            info!(
                "Successfully reconciled ClusterIdentity: {}",
                identity.name_any()
            );
            Ok(action)
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_CLUSTER_IDENTITY, start.elapsed());
            metrics::record_error(KIND_CLUSTER_IDENTITY, "reconcile_error");
            error!("Failed to reconcile ClusterIdentity: {}", e);
            Err(e.into())
        }
    }
}

/// Run the `DNSConfiguration` controller
async fn run_dnsconfiguration_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting DNSConfiguration controller");

    let api = Api::<DNSConfiguration>::all(ctx.client.clone());

    Controller::new(api, Config::default().any_semantic())
        .run(reconcile_dnsconfiguration_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `DNSConfiguration`
async fn reconcile_dnsconfiguration_wrapper(
    configuration: Arc<DNSConfiguration>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        configuration_name = %configuration.name_any(),
        "Reconcile wrapper called for DNSConfiguration"
    );

    let start = Instant::now();
    match reconcile_dnsconfiguration(ctx, (*configuration).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_DNS_CONFIGURATION, start.elapsed());
            info!(
                "Successfully reconciled DNSConfiguration: {}",
                configuration.name_any()
            );
            Ok(action)
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_DNS_CONFIGURATION, start.elapsed());
            metrics::record_error(KIND_DNS_CONFIGURATION, "reconcile_error");
            error!("Failed to reconcile DNSConfiguration: {}", e);
            Err(e.into())
        }
    }
}

/// Run the `DNSPolicy` controller
async fn run_dnspolicy_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting DNSPolicy controller");

    let client = ctx.client.clone();
    let api = Api::<DNSPolicy>::all(client.clone());
    let identities = Api::<ClusterIdentity>::all(client.clone());
    let configurations = Api::<DNSConfiguration>::all(client);

    // Activation depends on the cluster identity and the topology, so a
    // change to either one re-enqueues every policy in the fleet.
    let identity_ctx = ctx.clone();
    let configuration_ctx = ctx.clone();
    Controller::new(api, Config::default().any_semantic())
        .watches(
            identities,
            Config::default().any_semantic(),
            move |_identity: ClusterIdentity| {
                namespaced_refs::<DNSPolicy>(&identity_ctx.stores.all_dns_policies())
            },
        )
        .watches(
            configurations,
            Config::default().any_semantic(),
            move |_configuration: DNSConfiguration| {
                namespaced_refs::<DNSPolicy>(&configuration_ctx.stores.all_dns_policies())
            },
        )
        .run(reconcile_dnspolicy_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `DNSPolicy`
async fn reconcile_dnspolicy_wrapper(
    policy: Arc<DNSPolicy>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        policy_name = %policy.name_any(),
        namespace = ?policy.namespace(),
        "Reconcile wrapper called for DNSPolicy"
    );

    let start = Instant::now();
    match reconcile_dnspolicy(ctx, (*policy).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_DNS_POLICY, start.elapsed());
            info!("Successfully reconciled DNSPolicy: {}", policy.name_any());
            Ok(action)
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_DNS_POLICY, start.elapsed());
            metrics::record_error(KIND_DNS_POLICY, "reconcile_error");
            error!("Failed to reconcile DNSPolicy: {}", e);
            Err(e.into())
        }
    }
}

/// Run the `Gateway` controller
async fn run_gateway_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Gateway controller");

    let client = ctx.client.clone();
    let api = Api::<Gateway>::all(client.clone());
    let routes = Api::<ServiceRoute>::all(client.clone());
    let services = Api::<Service>::all(client.clone());
    let configurations = Api::<DNSConfiguration>::all(client);

    // A route change touches the one gateway it references; a LoadBalancer
    // Service change touches the gateways bound to its ingress controller.
    let route_ctx = ctx.clone();
    let service_ctx = ctx.clone();
    let configuration_ctx = ctx.clone();
    Controller::new(api, Config::default().any_semantic())
        .watches(
            routes,
            Config::default().any_semantic(),
            move |route: ServiceRoute| vec![referenced_gateway(&route, &route_ctx.config)],
        )
        .watches(
            services,
            Config::default().labels(ISTIO_SELECTOR_LABEL).any_semantic(),
            move |service: Service| {
                let gateways = ingress_controller_of(&service)
                    .map(|controller| service_ctx.stores.gateways_for_controller(&controller))
                    .unwrap_or_default();
                namespaced_refs::<Gateway>(&gateways)
            },
        )
        .watches(
            configurations,
            Config::default().any_semantic(),
            move |_configuration: DNSConfiguration| {
                namespaced_refs::<Gateway>(&configuration_ctx.stores.all_gateways())
            },
        )
        .run(reconcile_gateway_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Gateway`
async fn reconcile_gateway_wrapper(
    gateway: Arc<Gateway>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        gateway_name = %gateway.name_any(),
        namespace = ?gateway.namespace(),
        "Reconcile wrapper called for Gateway"
    );

    let start = Instant::now();
    match reconcile_gateway(ctx, (*gateway).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_GATEWAY, start.elapsed());
            info!("Successfully reconciled Gateway: {}", gateway.name_any());
            Ok(action)
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_GATEWAY, start.elapsed());
            metrics::record_error(KIND_GATEWAY, "reconcile_error");
            error!("Failed to reconcile Gateway: {}", e);
            Err(e.into())
        }
    }
}

/// Run the `ServiceRoute` controller
async fn run_serviceroute_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting ServiceRoute controller");

    let client = ctx.client.clone();
    let api = Api::<ServiceRoute>::all(client.clone());
    let policies = Api::<DNSPolicy>::all(client.clone());
    let gateways = Api::<Gateway>::all(client.clone());
    let identities = Api::<ClusterIdentity>::all(client);

    // A policy change re-enqueues the routes of its namespace; a gateway
    // change re-enqueues the routes that reference it; an identity change
    // re-enqueues everything since hostnames derive from it.
    let policy_ctx = ctx.clone();
    let gateway_ctx = ctx.clone();
    let identity_ctx = ctx.clone();
    Controller::new(api, Config::default().any_semantic())
        .watches(
            policies,
            Config::default().any_semantic(),
            move |policy: DNSPolicy| {
                let namespace = policy.namespace().unwrap_or_default();
                namespaced_refs::<ServiceRoute>(
                    &policy_ctx.stores.service_routes_in_namespace(&namespace),
                )
            },
        )
        .watches(
            gateways,
            Config::default().any_semantic(),
            move |gateway: Gateway| {
                let name = gateway.name_any();
                let namespace = gateway.namespace().unwrap_or_default();
                namespaced_refs::<ServiceRoute>(&gateway_ctx.stores.service_routes_for_gateway(
                    &name,
                    &namespace,
                    &gateway_ctx.config.default_gateway_namespace,
                ))
            },
        )
        .watches(
            identities,
            Config::default().any_semantic(),
            move |_identity: ClusterIdentity| {
                namespaced_refs::<ServiceRoute>(&identity_ctx.stores.all_service_routes())
            },
        )
        .run(reconcile_serviceroute_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `ServiceRoute`
async fn reconcile_serviceroute_wrapper(
    route: Arc<ServiceRoute>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        route_name = %route.name_any(),
        namespace = ?route.namespace(),
        "Reconcile wrapper called for ServiceRoute"
    );

    let start = Instant::now();
    match reconcile_serviceroute(ctx, (*route).clone()).await {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_SERVICE_ROUTE, start.elapsed());
            info!("Successfully reconciled ServiceRoute: {}", route.name_any());
            Ok(action)
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_SERVICE_ROUTE, start.elapsed());
            metrics::record_error(KIND_SERVICE_ROUTE, "reconcile_error");
            error!("Failed to reconcile ServiceRoute: {}", e);
            Err(e.into())
        }
    }
}

/// Error policy for controller
fn error_policy(
    _resource: Arc<impl std::fmt::Debug>,
    _err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
