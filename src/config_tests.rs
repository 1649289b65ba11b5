// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn test_default_gateway_namespace() {
    let config = OperatorConfig::from_lookup(|_| None);
    assert_eq!(config.default_gateway_namespace, "ingress");
}

#[test]
fn test_gateway_namespace_from_environment() {
    let config = OperatorConfig::from_lookup(|key| {
        (key == ENV_GATEWAY_NAMESPACE).then(|| "edge".to_string())
    });
    assert_eq!(config.default_gateway_namespace, "edge");
}

#[test]
fn test_empty_environment_value_falls_back() {
    let config = OperatorConfig::from_lookup(|_| Some(String::new()));
    assert_eq!(config.default_gateway_namespace, "ingress");
}

#[test]
fn test_whitespace_environment_value_falls_back() {
    let config = OperatorConfig::from_lookup(|_| Some("   ".to_string()));
    assert_eq!(config.default_gateway_namespace, "ingress");
}

#[test]
fn test_resolve_gateway_namespace_prefers_explicit() {
    let config = OperatorConfig::default();
    assert_eq!(config.resolve_gateway_namespace(Some("edge")), "edge");
}

#[test]
fn test_resolve_gateway_namespace_ignores_empty_explicit() {
    let config = OperatorConfig::default();
    assert_eq!(config.resolve_gateway_namespace(Some("")), "ingress");
}

#[test]
fn test_resolve_gateway_namespace_uses_default_when_unset() {
    let config = OperatorConfig {
        default_gateway_namespace: "edge".into(),
    };
    assert_eq!(config.resolve_gateway_namespace(None), "edge");
}
