// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the `external` module
//!
//! These tests pin the wire format of the foreign resource types: Istio and
//! external-dns only accept the exact field spellings asserted here.

#[cfg(test)]
mod tests {
    use crate::external::*;
    use kube::Resource;
    use std::collections::BTreeMap;

    fn sample_server() -> IstioServer {
        IstioServer {
            port: IstioPort {
                number: 443,
                name: "https".into(),
                protocol: "HTTPS".into(),
            },
            hosts: vec!["checkout-ns-p-prod-shop.example.net".into()],
            tls: Some(IstioServerTls {
                mode: "SIMPLE".into(),
                credential_name: "wildcard-example-net".into(),
            }),
        }
    }

    #[test]
    fn test_istio_gateway_api_version() {
        assert_eq!(Gateway::api_version(&()), "networking.istio.io/v1beta1");
        assert_eq!(Gateway::kind(&()), "Gateway");
    }

    #[test]
    fn test_dns_endpoint_api_version() {
        assert_eq!(DNSEndpoint::api_version(&()), "externaldns.k8s.io/v1alpha1");
        assert_eq!(DNSEndpoint::kind(&()), "DNSEndpoint");
    }

    #[test]
    fn test_istio_gateway_spec_serializes_camel_case() {
        let spec = IstioGatewaySpec {
            selector: BTreeMap::from([("istio".to_string(), "ingressgateway".to_string())]),
            servers: vec![sample_server()],
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["selector"]["istio"], "ingressgateway");
        assert_eq!(json["servers"][0]["port"]["number"], 443);
        assert_eq!(json["servers"][0]["tls"]["mode"], "SIMPLE");
        // credentialName must be camelCase for Istio to accept it
        assert_eq!(
            json["servers"][0]["tls"]["credentialName"],
            "wildcard-example-net"
        );
    }

    #[test]
    fn test_istio_server_without_tls_omits_field() {
        let server = IstioServer {
            port: IstioPort {
                number: 80,
                name: "http".into(),
                protocol: "HTTP".into(),
            },
            hosts: vec!["a.example.net".into()],
            tls: None,
        };

        let json = serde_json::to_value(&server).unwrap();
        assert!(json.get("tls").is_none());
    }

    #[test]
    fn test_endpoint_record_ttl_spelling() {
        let endpoint = Endpoint {
            dns_name: "checkout-ns-p-prod-shop.example.net".into(),
            record_type: "CNAME".into(),
            targets: vec!["prod-a-us-west-apps.example.net".into()],
            record_ttl: Some(300),
        };

        let json = serde_json::to_value(&endpoint).unwrap();
        // external-dns expects "recordTTL", not "recordTtl"
        assert_eq!(json["recordTTL"], 300);
        assert!(json.get("recordTtl").is_none());
        assert_eq!(json["dnsName"], "checkout-ns-p-prod-shop.example.net");
        assert_eq!(json["recordType"], "CNAME");
    }

    #[test]
    fn test_endpoint_without_ttl_omits_field() {
        let endpoint = Endpoint {
            dns_name: "a.example.net".into(),
            record_type: "A".into(),
            targets: vec!["192.0.2.10".into()],
            record_ttl: None,
        };

        let json = serde_json::to_value(&endpoint).unwrap();
        assert!(json.get("recordTTL").is_none());
    }

    #[test]
    fn test_endpoint_deserializes_external_dns_form() {
        let json = r#"{
            "dnsName": "svc.example.net",
            "recordType": "CNAME",
            "targets": ["target.example.net"],
            "recordTTL": 600
        }"#;

        let endpoint: Endpoint = serde_json::from_str(json).unwrap();
        assert_eq!(endpoint.dns_name, "svc.example.net");
        assert_eq!(endpoint.record_type, "CNAME");
        assert_eq!(endpoint.targets, vec!["target.example.net"]);
        assert_eq!(endpoint.record_ttl, Some(600));
    }

    #[test]
    fn test_istio_gateway_spec_equality_is_order_sensitive() {
        let mut a = sample_server();
        let mut b = sample_server();
        a.hosts = vec!["x.example.net".into(), "y.example.net".into()];
        b.hosts = vec!["y.example.net".into(), "x.example.net".into()];

        // PartialEq on the raw spec compares host order; callers that want
        // set semantics must compare through a BTreeSet.
        assert_ne!(a, b);
    }
}
