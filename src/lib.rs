// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # fleetdns - Multi-Region DNS and Ingress Control Plane for Kubernetes
//!
//! fleetdns is a Kubernetes operator written in Rust that turns per-namespace
//! routing intents into Istio ingress gateways and fleet-wide DNS records.
//!
//! ## Overview
//!
//! This library provides the core functionality for the fleetdns operator,
//! including:
//!
//! - Custom Resource Definitions (CRDs) for cluster identity, DNS topology,
//!   per-namespace policies, gateways, and service routes
//! - Reconciliation logic deriving Istio `Gateway` and external-dns
//!   `DNSEndpoint` resources
//! - Hostname grammar shared by every derived record
//! - Regional activation and failover via adopted regions
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for fleet DNS resources
//! - [`external`] - Typed Istio and external-dns resources the operator writes
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`context`] - Shared context and reflector stores for the controllers
//! - [`cache`] - Process-wide caches for the fleet singleton resources
//! - [`hostnames`] - The hostname and record-name grammar
//!
//! ## Example
//!
//! ```rust,no_run
//! use fleetdns::crd::{ServiceRoute, ServiceRouteSpec};
//!
//! // Request a DNS name for a service behind the "external" gateway
//! let route_spec = ServiceRouteSpec {
//!     service_name: "auth".to_string(),
//!     gateway_name: "external".to_string(),
//!     gateway_namespace: None,
//!     environment: "dev".to_string(),
//!     application: "nid-02".to_string(),
//! };
//! ```
//!
//! ## Features
//!
//! - **Multi-Region** - One control plane per cluster, records fanned out per
//!   DNS controller
//! - **Regional Failover** - Adopted regions move DNS ownership without
//!   touching tenant resources
//! - **Idempotent Writes** - Steady-state reconciles make no API writes
//! - **Status Tracking** - Full status subresources with conditions and events
//!
//! For more information, see the [documentation](https://firestoned.github.io/fleetdns/).

pub mod cache;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod external;
pub mod hostnames;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;

#[cfg(test)]
mod external_tests;
