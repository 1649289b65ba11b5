// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-wide caches for the fleet singleton resources.
//!
//! The operator keeps exactly two pieces of shared mutable state: the local
//! cluster's identity and the fleet DNS topology. Each lives in a
//! [`SingletonCache`] owned by the `Context` and follows the same lifecycle:
//!
//! - the owning reconciler (`ClusterIdentity` / `DNSConfiguration`) is the
//!   only writer — it publishes on successful reconcile and clears on delete;
//! - every other reconciler reads through [`fetch_with`], which falls back to
//!   an authoritative API list when the cache is empty but never populates it.
//!
//! `Get` returns a clone so no reference to the guarded value ever escapes
//! the lock.

use anyhow::{Context as _, Result};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use std::future::Future;
use std::sync::RwLock;

use crate::crd::{ClusterIdentity, DNSConfiguration};
use crate::reconcilers::retry::retry_api_call;

/// Thread-safe container for a single cached value.
///
/// Reads return defensive copies; writes replace the value wholesale.
#[derive(Debug)]
pub struct SingletonCache<T: Clone> {
    inner: RwLock<Option<T>>,
}

impl<T: Clone> Default for SingletonCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SingletonCache<T> {
    /// Create an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Replace the cached value.
    pub fn set(&self, value: T) {
        // A poisoned lock only means a writer panicked; the Option inside
        // is still coherent, so recover the guard instead of propagating.
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(value);
    }

    /// Return a copy of the cached value, or `None` when unset.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Drop the cached value.
    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

/// The local cluster's identity, as published by the `ClusterIdentity`
/// reconciler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterInfo {
    pub region: String,
    pub cluster: String,
    pub domain: String,
    pub environment_letter: String,
    /// Regions this cluster additionally serves DNS for; empty when the
    /// spec omits `adoptsRegions`.
    pub adopts_regions: Vec<String>,
}

impl From<&ClusterIdentity> for ClusterInfo {
    fn from(identity: &ClusterIdentity) -> Self {
        Self {
            region: identity.spec.region.clone(),
            cluster: identity.spec.cluster.clone(),
            domain: identity.spec.domain.clone(),
            environment_letter: identity.spec.environment_letter.clone(),
            adopts_regions: identity.spec.adopts_regions.clone().unwrap_or_default(),
        }
    }
}

/// One DNS controller of the fleet topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsController {
    pub name: String,
    pub region: String,
}

/// The fleet DNS topology, as published by the `DNSConfiguration` reconciler.
///
/// Descriptor order is preserved from the spec: "first controller for a
/// region" is a meaningful lookup because the agent annotation on derived
/// records names exactly that controller.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DnsTopology {
    pub controllers: Vec<DnsController>,
}

impl DnsTopology {
    /// Whether any configured controller serves the given region.
    #[must_use]
    pub fn has_region(&self, region: &str) -> bool {
        self.controllers.iter().any(|c| c.region == region)
    }

    /// Whether a controller with the given name is configured.
    #[must_use]
    pub fn has_controller(&self, name: &str) -> bool {
        self.controllers.iter().any(|c| c.name == name)
    }

    /// Name of the first configured controller serving the given region.
    ///
    /// This is the DNS agent that records for the region are annotated with.
    #[must_use]
    pub fn agent_for_region(&self, region: &str) -> Option<&str> {
        self.controllers
            .iter()
            .find(|c| c.region == region)
            .map(|c| c.name.as_str())
    }

    /// Names of every configured controller, in descriptor order.
    #[must_use]
    pub fn controller_names(&self) -> Vec<String> {
        self.controllers.iter().map(|c| c.name.clone()).collect()
    }

    /// Names of the controllers serving the given region, in descriptor order.
    #[must_use]
    pub fn controllers_for_region(&self, region: &str) -> Vec<String> {
        self.controllers
            .iter()
            .filter(|c| c.region == region)
            .map(|c| c.name.clone())
            .collect()
    }
}

impl From<&DNSConfiguration> for DnsTopology {
    fn from(config: &DNSConfiguration) -> Self {
        Self {
            controllers: config
                .spec
                .controllers
                .iter()
                .map(|c| DnsController {
                    name: c.name.clone(),
                    region: c.region.clone(),
                })
                .collect(),
        }
    }
}

/// Pick the authoritative instance of a fleet singleton: oldest creation
/// timestamp wins, name breaks ties.
///
/// Objects the API server has not stamped yet sort last, so a persisted
/// instance always beats an unpersisted one.
#[must_use]
pub fn authoritative_instance<K: ResourceExt>(instances: &[K]) -> Option<&K> {
    instances.iter().min_by_key(|obj| {
        let stamped = obj
            .creation_timestamp()
            .map_or(k8s_openapi::jiff::Timestamp::MAX, |t| t.0);
        (stamped, obj.name_any())
    })
}

/// Cache-first read: return the cached value when present, otherwise await
/// the fallback. The fallback result is NOT written back — the owning
/// reconciler stays the only cache writer.
pub async fn fetch_with<T, F, Fut>(cache: &SingletonCache<T>, fallback: F) -> Result<Option<T>>
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    if let Some(value) = cache.get() {
        return Ok(Some(value));
    }
    fallback().await
}

/// Fetch the local cluster identity, falling back to an authoritative list
/// of `ClusterIdentity` resources. The fallback list retries transient API
/// errors with backoff. `Ok(None)` means the fleet singleton does not exist
/// yet.
pub async fn fetch_cluster_info(
    cache: &SingletonCache<ClusterInfo>,
    client: Client,
) -> Result<Option<ClusterInfo>> {
    fetch_with(cache, || async move {
        tracing::debug!("Identity cache empty, listing ClusterIdentity resources");
        let api: Api<ClusterIdentity> = Api::all(client);
        let identities = retry_api_call(
            || async { api.list(&ListParams::default()).await },
            "list cluster identities",
        )
        .await
        .context("Failed to list ClusterIdentity resources")?;
        Ok(authoritative_instance(&identities.items).map(ClusterInfo::from))
    })
    .await
}

/// Fetch the fleet DNS topology, falling back to an authoritative list of
/// `DNSConfiguration` resources. The fallback list retries transient API
/// errors with backoff. `Ok(None)` means the fleet singleton does not exist
/// yet.
pub async fn fetch_topology(
    cache: &SingletonCache<DnsTopology>,
    client: Client,
) -> Result<Option<DnsTopology>> {
    fetch_with(cache, || async move {
        tracing::debug!("Topology cache empty, listing DNSConfiguration resources");
        let api: Api<DNSConfiguration> = Api::all(client);
        let configs = retry_api_call(
            || async { api.list(&ListParams::default()).await },
            "list dns configurations",
        )
        .await
        .context("Failed to list DNSConfiguration resources")?;
        Ok(authoritative_instance(&configs.items).map(DnsTopology::from))
    })
    .await
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
