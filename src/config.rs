// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration read from the environment at startup.
//!
//! Configuration is deliberately small: everything that describes the fleet
//! lives in the `ClusterIdentity` and `DNSConfiguration` resources, so the
//! environment only carries deployment-local knobs.

use crate::constants::{DEFAULT_GATEWAY_NAMESPACE, ENV_GATEWAY_NAMESPACE};

/// Deployment-local settings, parsed once in `main` and carried in the
/// shared `Context`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace searched for `Gateway` resources when a `ServiceRoute`
    /// omits `gatewayNamespace`.
    pub default_gateway_namespace: String,
}

impl OperatorConfig {
    /// Read configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        tracing::info!(
            default_gateway_namespace = %config.default_gateway_namespace,
            "Loaded operator configuration"
        );
        config
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty values both fall back to the default, so an empty
    /// `FLEETDNS_GATEWAY_NAMESPACE=` in a pod spec behaves like an absent one.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_gateway_namespace = lookup(ENV_GATEWAY_NAMESPACE)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_NAMESPACE.to_string());

        Self {
            default_gateway_namespace,
        }
    }

    /// Resolve the namespace a `ServiceRoute` looks its gateway up in.
    #[must_use]
    pub fn resolve_gateway_namespace(&self, explicit: Option<&str>) -> String {
        match explicit {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => self.default_gateway_namespace.clone(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            default_gateway_namespace: DEFAULT_GATEWAY_NAMESPACE.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
