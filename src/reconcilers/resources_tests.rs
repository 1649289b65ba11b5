// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{Gateway, GatewaySpec};
    use crate::external::{
        DNSEndpoint, DNSEndpointSpec, Endpoint, IstioGatewaySpec, IstioPort, IstioServer,
        IstioServerTls,
    };
    use crate::labels::{route_record_labels, DNS_AGENT_ANNOTATION};
    use crate::reconcilers::resources::{
        build_owner_references, dns_endpoint_needs_patch, istio_specs_equivalent,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn create_test_gateway(uid: Option<&str>) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                name: Some("external".to_string()),
                namespace: Some("ingress".to_string()),
                uid: uid.map(str::to_string),
                ..ObjectMeta::default()
            },
            spec: GatewaySpec {
                controller: "ingressgateway".to_string(),
                credential_name: "wildcard-tls".to_string(),
                target_postfix: "external".to_string(),
            },
            status: None,
        }
    }

    fn istio_spec(hosts: &[&str]) -> IstioGatewaySpec {
        let mut selector = BTreeMap::new();
        selector.insert("istio".to_string(), "ingressgateway".to_string());

        IstioGatewaySpec {
            selector,
            servers: vec![IstioServer {
                port: IstioPort {
                    number: 443,
                    name: "https".to_string(),
                    protocol: "HTTPS".to_string(),
                },
                hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
                tls: Some(IstioServerTls {
                    mode: "SIMPLE".to_string(),
                    credential_name: "wildcard-tls".to_string(),
                }),
            }],
        }
    }

    fn route_record(agent: &str, target: &str) -> DNSEndpoint {
        let mut annotations = BTreeMap::new();
        annotations.insert(DNS_AGENT_ANNOTATION.to_string(), agent.to_string());

        DNSEndpoint {
            metadata: ObjectMeta {
                name: Some("auth-route-a".to_string()),
                namespace: Some("apps".to_string()),
                labels: Some(route_record_labels("auth-route", "apps")),
                annotations: Some(annotations),
                ..ObjectMeta::default()
            },
            spec: DNSEndpointSpec {
                endpoints: vec![Endpoint {
                    dns_name: "auth-ns-d-dev-nid-02.example.com".to_string(),
                    record_type: "CNAME".to_string(),
                    targets: vec![target.to_string()],
                    record_ttl: Some(300),
                }],
            },
        }
    }

    // ========== Owner Reference Tests ==========

    #[test]
    fn test_build_owner_references_for_gateway() {
        let gateway = create_test_gateway(Some("abc-123"));

        let owners = build_owner_references(&gateway);

        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].api_version, "fleetdns.firestoned.io/v1alpha1");
        assert_eq!(owners[0].kind, "Gateway");
        assert_eq!(owners[0].name, "external");
        assert_eq!(owners[0].uid, "abc-123");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(owners[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn test_build_owner_references_without_uid() {
        let gateway = create_test_gateway(None);

        let owners = build_owner_references(&gateway);

        assert_eq!(owners[0].uid, "");
    }

    // ========== Istio Spec Drift Tests ==========

    #[test]
    fn test_istio_specs_equivalent_identical() {
        let current = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        let desired = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);

        assert!(istio_specs_equivalent(&current, &desired));
    }

    #[test]
    fn test_istio_specs_equivalent_ignores_host_order() {
        let current = istio_spec(&[
            "billing-ns-d-dev-nid-02.example.com",
            "auth-ns-d-dev-nid-02.example.com",
        ]);
        let desired = istio_spec(&[
            "auth-ns-d-dev-nid-02.example.com",
            "billing-ns-d-dev-nid-02.example.com",
        ]);

        assert!(istio_specs_equivalent(&current, &desired));
    }

    #[test]
    fn test_istio_specs_equivalent_detects_host_drift() {
        let current = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        let desired = istio_spec(&[
            "auth-ns-d-dev-nid-02.example.com",
            "billing-ns-d-dev-nid-02.example.com",
        ]);

        assert!(!istio_specs_equivalent(&current, &desired));
    }

    #[test]
    fn test_istio_specs_equivalent_detects_selector_drift() {
        let current = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        let mut desired = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        desired
            .selector
            .insert("istio".to_string(), "ingressgateway-internal".to_string());

        assert!(!istio_specs_equivalent(&current, &desired));
    }

    #[test]
    fn test_istio_specs_equivalent_detects_tls_drift() {
        let current = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        let mut desired = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        desired.servers[0].tls.as_mut().unwrap().credential_name = "rotated-tls".to_string();

        assert!(!istio_specs_equivalent(&current, &desired));
    }

    #[test]
    fn test_istio_specs_equivalent_detects_server_count_drift() {
        let current = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        let mut desired = istio_spec(&["auth-ns-d-dev-nid-02.example.com"]);
        desired.servers.push(desired.servers[0].clone());

        assert!(!istio_specs_equivalent(&current, &desired));
    }

    // ========== DNS Record Drift Tests ==========

    #[test]
    fn test_dns_endpoint_no_patch_when_identical() {
        let existing = route_record("a", "aks01-neu-external.example.com");
        let desired = route_record("a", "aks01-neu-external.example.com");

        assert!(!dns_endpoint_needs_patch(&existing, &desired));
    }

    #[test]
    fn test_dns_endpoint_patch_on_spec_drift() {
        let existing = route_record("a", "aks01-neu-external.example.com");
        let desired = route_record("a", "aks02-neu-external.example.com");

        assert!(dns_endpoint_needs_patch(&existing, &desired));
    }

    #[test]
    fn test_dns_endpoint_patch_on_agent_drift() {
        // Topology changes move records between DNS agents; the annotation
        // drift must force a patch even though the spec is unchanged.
        let existing = route_record("a", "aks01-neu-external.example.com");
        let desired = route_record("d", "aks01-neu-external.example.com");

        assert!(dns_endpoint_needs_patch(&existing, &desired));
    }

    #[test]
    fn test_dns_endpoint_patch_on_missing_label() {
        let mut existing = route_record("a", "aks01-neu-external.example.com");
        existing.metadata.labels = None;
        let desired = route_record("a", "aks01-neu-external.example.com");

        assert!(dns_endpoint_needs_patch(&existing, &desired));
    }

    #[test]
    fn test_dns_endpoint_ignores_foreign_metadata() {
        // Labels and annotations added by other writers are not operator
        // owned and never force a patch.
        let mut existing = route_record("a", "aks01-neu-external.example.com");
        existing
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert("team".to_string(), "platform".to_string());
        existing
            .metadata
            .annotations
            .as_mut()
            .unwrap()
            .insert("audit/owner".to_string(), "sre".to_string());
        let desired = route_record("a", "aks01-neu-external.example.com");

        assert!(!dns_endpoint_needs_patch(&existing, &desired));
    }
}
