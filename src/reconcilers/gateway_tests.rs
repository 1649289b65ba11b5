// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for `Gateway` reconciliation logic.

#[cfg(test)]
mod tests {
    use super::super::gateway::{
        aggregate_route_hosts, build_istio_gateway, load_balancer_ingress_ip, validate_spec,
    };
    use crate::cache::ClusterInfo;
    use crate::config::OperatorConfig;
    use crate::crd::{Gateway, GatewaySpec, ServiceRoute, ServiceRouteSpec};
    use crate::labels::{ISTIO_SELECTOR_LABEL, K8S_MANAGED_BY, MANAGED_BY_FLEETDNS};
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, Service, ServiceStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use std::sync::Arc;

    fn cluster_info() -> ClusterInfo {
        ClusterInfo {
            region: "neu".to_string(),
            cluster: "aks01".to_string(),
            domain: "example.com".to_string(),
            environment_letter: "d".to_string(),
            adopts_regions: vec![],
        }
    }

    fn gateway_spec() -> GatewaySpec {
        GatewaySpec {
            controller: "ingressgateway".to_string(),
            credential_name: "wildcard-tls".to_string(),
            target_postfix: "external".to_string(),
        }
    }

    fn create_test_gateway(name: &str, namespace: &str) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            spec: gateway_spec(),
            status: None,
        }
    }

    fn create_test_route(
        name: &str,
        namespace: &str,
        gateway_name: &str,
        gateway_namespace: Option<&str>,
        service_name: &str,
        environment: &str,
        application: &str,
    ) -> Arc<ServiceRoute> {
        Arc::new(ServiceRoute {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            spec: ServiceRouteSpec {
                service_name: service_name.to_string(),
                gateway_name: gateway_name.to_string(),
                gateway_namespace: gateway_namespace.map(str::to_string),
                environment: environment.to_string(),
                application: application.to_string(),
            },
            status: None,
        })
    }

    fn service_with_ips(ips: &[Option<&str>]) -> Service {
        Service {
            metadata: ObjectMeta::default(),
            spec: None,
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(
                        ips.iter()
                            .map(|ip| LoadBalancerIngress {
                                ip: ip.map(str::to_string),
                                ..LoadBalancerIngress::default()
                            })
                            .collect(),
                    ),
                }),
                ..ServiceStatus::default()
            }),
        }
    }

    // ========== Spec Validation Tests ==========

    #[test]
    fn test_validate_spec_accepts_valid_spec() {
        assert_eq!(validate_spec(&gateway_spec()), None);
    }

    #[test]
    fn test_validate_spec_rejects_empty_controller() {
        let mut spec = gateway_spec();
        spec.controller = "  ".to_string();

        let problem = validate_spec(&spec);

        assert_eq!(problem, Some("spec.controller must not be empty".to_string()));
    }

    #[test]
    fn test_validate_spec_rejects_empty_credential_name() {
        let mut spec = gateway_spec();
        spec.credential_name = String::new();

        let problem = validate_spec(&spec);

        assert_eq!(
            problem,
            Some("spec.credentialName must not be empty".to_string())
        );
    }

    #[test]
    fn test_validate_spec_rejects_malformed_postfix() {
        for postfix in ["External", "ext--ra", "-external", "external-", ""] {
            let mut spec = gateway_spec();
            spec.target_postfix = postfix.to_string();

            let problem = validate_spec(&spec);

            assert!(
                problem
                    .as_deref()
                    .is_some_and(|p| p.contains("spec.targetPostfix")),
                "postfix {postfix:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_spec_accepts_multi_segment_postfix() {
        let mut spec = gateway_spec();
        spec.target_postfix = "external-02".to_string();

        assert_eq!(validate_spec(&spec), None);
    }

    // ========== Host Aggregation Tests ==========

    #[test]
    fn test_aggregate_route_hosts_builds_source_hostname() {
        let routes = vec![create_test_route(
            "auth-route",
            "apps",
            "external",
            Some("ingress"),
            "auth",
            "dev",
            "nid-02",
        )];

        let hosts = aggregate_route_hosts(
            &routes,
            "external",
            "ingress",
            &OperatorConfig::default(),
            &cluster_info(),
        );

        let expected: Vec<&str> = vec!["auth-ns-d-dev-nid-02.example.com"];
        assert_eq!(hosts.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_aggregate_route_hosts_resolves_default_namespace() {
        // No explicit gatewayNamespace: the configured default applies.
        let routes = vec![create_test_route(
            "auth-route",
            "apps",
            "external",
            None,
            "auth",
            "dev",
            "nid-02",
        )];
        let config = OperatorConfig::default();

        let matching = aggregate_route_hosts(&routes, "external", "ingress", &config, &cluster_info());
        let other = aggregate_route_hosts(&routes, "external", "edge", &config, &cluster_info());

        assert_eq!(matching.len(), 1);
        assert!(other.is_empty());
    }

    #[test]
    fn test_aggregate_route_hosts_ignores_other_gateways() {
        let routes = vec![
            create_test_route("a", "apps", "external", Some("ingress"), "auth", "dev", "nid-02"),
            create_test_route("b", "apps", "internal", Some("ingress"), "billing", "dev", "nid-02"),
            create_test_route("c", "apps", "external", Some("edge"), "catalog", "dev", "nid-02"),
        ];

        let hosts = aggregate_route_hosts(
            &routes,
            "external",
            "ingress",
            &OperatorConfig::default(),
            &cluster_info(),
        );

        assert_eq!(hosts.len(), 1);
        assert!(hosts.contains("auth-ns-d-dev-nid-02.example.com"));
    }

    #[test]
    fn test_aggregate_route_hosts_skips_deleting_routes() {
        let mut route = ServiceRoute::clone(&create_test_route(
            "auth-route",
            "apps",
            "external",
            Some("ingress"),
            "auth",
            "dev",
            "nid-02",
        ));
        route.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));

        let hosts = aggregate_route_hosts(
            &[Arc::new(route)],
            "external",
            "ingress",
            &OperatorConfig::default(),
            &cluster_info(),
        );

        assert!(hosts.is_empty());
    }

    #[test]
    fn test_aggregate_route_hosts_skips_blank_hostname_fields() {
        let routes = vec![
            create_test_route("a", "apps", "external", Some("ingress"), "", "dev", "nid-02"),
            create_test_route("b", "apps", "external", Some("ingress"), "auth", " ", "nid-02"),
            create_test_route("c", "apps", "external", Some("ingress"), "auth", "dev", ""),
        ];

        let hosts = aggregate_route_hosts(
            &routes,
            "external",
            "ingress",
            &OperatorConfig::default(),
            &cluster_info(),
        );

        assert!(hosts.is_empty());
    }

    #[test]
    fn test_aggregate_route_hosts_deduplicates_and_sorts() {
        // Two routes in different namespaces expose the same service; the
        // derived host list carries one sorted entry per hostname.
        let routes = vec![
            create_test_route("a", "team-a", "external", Some("ingress"), "zeta", "dev", "nid-02"),
            create_test_route("b", "team-b", "external", Some("ingress"), "auth", "dev", "nid-02"),
            create_test_route("c", "team-c", "external", Some("ingress"), "auth", "dev", "nid-02"),
        ];

        let hosts = aggregate_route_hosts(
            &routes,
            "external",
            "ingress",
            &OperatorConfig::default(),
            &cluster_info(),
        );

        let ordered: Vec<&str> = hosts.iter().map(String::as_str).collect();
        assert_eq!(
            ordered,
            vec![
                "auth-ns-d-dev-nid-02.example.com",
                "zeta-ns-d-dev-nid-02.example.com",
            ]
        );
    }

    // ========== Derived Istio Gateway Tests ==========

    #[test]
    fn test_build_istio_gateway_metadata() {
        let gateway = create_test_gateway("external", "ingress");
        let hosts = std::collections::BTreeSet::from(["auth-ns-d-dev-nid-02.example.com".to_string()]);

        let istio = build_istio_gateway(&gateway, &hosts);

        assert_eq!(istio.metadata.name, Some("external".to_string()));
        assert_eq!(istio.metadata.namespace, Some("ingress".to_string()));
        let labels = istio.metadata.labels.expect("managed labels");
        assert_eq!(
            labels.get(K8S_MANAGED_BY),
            Some(&MANAGED_BY_FLEETDNS.to_string())
        );

        let owners = istio.metadata.owner_references.expect("owner references");
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Gateway");
        assert_eq!(owners[0].name, "external");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn test_build_istio_gateway_selector_and_server() {
        let gateway = create_test_gateway("external", "ingress");
        let hosts = std::collections::BTreeSet::from([
            "auth-ns-d-dev-nid-02.example.com".to_string(),
            "billing-ns-d-dev-nid-02.example.com".to_string(),
        ]);

        let istio = build_istio_gateway(&gateway, &hosts);

        assert_eq!(
            istio.spec.selector.get(ISTIO_SELECTOR_LABEL),
            Some(&"ingressgateway".to_string())
        );
        assert_eq!(istio.spec.servers.len(), 1);

        let server = &istio.spec.servers[0];
        assert_eq!(server.port.number, 443);
        assert_eq!(server.port.name, "https");
        assert_eq!(server.port.protocol, "HTTPS");
        assert_eq!(
            server.hosts,
            vec![
                "auth-ns-d-dev-nid-02.example.com".to_string(),
                "billing-ns-d-dev-nid-02.example.com".to_string(),
            ]
        );

        let tls = server.tls.as_ref().expect("tls settings");
        assert_eq!(tls.mode, "SIMPLE");
        assert_eq!(tls.credential_name, "wildcard-tls");
    }

    // ========== Load Balancer IP Tests ==========

    #[test]
    fn test_load_balancer_ingress_ip_missing_status() {
        let service = Service::default();

        assert_eq!(load_balancer_ingress_ip(&service), None);
    }

    #[test]
    fn test_load_balancer_ingress_ip_assigned() {
        let service = service_with_ips(&[Some("10.0.0.7")]);

        assert_eq!(load_balancer_ingress_ip(&service), Some("10.0.0.7".to_string()));
    }

    #[test]
    fn test_load_balancer_ingress_ip_skips_empty_entries() {
        // Hostname-only and empty-string entries are skipped in favor of the
        // first real IP.
        let service = service_with_ips(&[None, Some(""), Some("10.0.0.9")]);

        assert_eq!(load_balancer_ingress_ip(&service), Some("10.0.0.9".to_string()));
    }

    #[test]
    fn test_load_balancer_ingress_ip_hostname_only() {
        let service = service_with_ips(&[None]);

        assert_eq!(load_balancer_ingress_ip(&service), None);
    }
}
