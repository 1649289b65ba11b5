// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the fleetdns operator.
//!
//! All metrics live under the `fleetdns_firestoned_io_` prefix (the
//! prometheus-safe spelling of the API group) and are registered in one
//! process-wide registry. Reconcile wrappers in `main.rs` record outcome
//! and latency per kind; the derived-resource helpers in
//! `reconcilers::resources` record every write the operator performs
//! against Istio gateways and DNS endpoints.
//!
//! # Example
//!
//! ```rust,no_run
//! use fleetdns::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("ServiceRoute", std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

const METRICS_NAMESPACE: &str = "fleetdns_firestoned_io";

/// Process-wide registry behind [`gather_metrics`].
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

/// Reconcile outcomes by resource kind.
///
/// Labels: `kind` (e.g. `ServiceRoute`), `status` (`success` | `error`).
pub static RECONCILE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "reconciliations_total",
        "Total reconciliations by resource kind and outcome",
        &["kind", "status"],
    )
});

/// Reconcile latency by resource kind.
pub static RECONCILE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Reconciliation duration in seconds by resource kind",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Writes against derived resources (Istio gateways, DNS endpoints).
///
/// Labels: `kind` of the derived resource, `op` (`create` | `update` |
/// `delete`).
pub static DERIVED_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "derived_writes_total",
        "Create/update/delete operations on derived resources by kind",
        &["kind", "op"],
    )
});

/// Derived resources currently believed to exist, per kind.
///
/// Incremented on create and decremented on delete, so steady-state
/// reconciles leave it untouched.
pub static DERIVED_ACTIVE: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_derived_resources_active"),
        "Derived resources currently managed, by kind",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Errors by resource kind and category.
///
/// Labels: `kind`, `category` (e.g. `reconcile_error`).
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "errors_total",
        "Errors by resource kind and category",
        &["kind", "category"],
    )
});

/// Record a successful reconciliation and its latency.
pub fn record_reconciliation_success(kind: &str, duration: Duration) {
    RECONCILE_TOTAL.with_label_values(&[kind, "success"]).inc();
    RECONCILE_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation and how long it ran before failing.
pub fn record_reconciliation_error(kind: &str, duration: Duration) {
    RECONCILE_TOTAL.with_label_values(&[kind, "error"]).inc();
    RECONCILE_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record creation of a derived resource.
pub fn record_resource_created(kind: &str) {
    DERIVED_WRITES_TOTAL
        .with_label_values(&[kind, "create"])
        .inc();
    DERIVED_ACTIVE.with_label_values(&[kind]).inc();
}

/// Record an update (patch) of a derived resource.
pub fn record_resource_updated(kind: &str) {
    DERIVED_WRITES_TOTAL
        .with_label_values(&[kind, "update"])
        .inc();
}

/// Record deletion of a derived resource.
pub fn record_resource_deleted(kind: &str) {
    DERIVED_WRITES_TOTAL
        .with_label_values(&[kind, "delete"])
        .inc();
    DERIVED_ACTIVE.with_label_values(&[kind]).dec();
}

/// Record an error occurrence.
pub fn record_error(kind: &str, category: &str) {
    ERRORS_TOTAL.with_label_values(&[kind, category]).inc();
}

/// Gather every registered metric in Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_outcomes_are_counted() {
        record_reconciliation_success("TestKind", Duration::from_millis(500));
        record_reconciliation_error("TestKind", Duration::from_millis(250));

        assert!(
            RECONCILE_TOTAL
                .with_label_values(&["TestKind", "success"])
                .get()
                > 0.0
        );
        assert!(
            RECONCILE_TOTAL
                .with_label_values(&["TestKind", "error"])
                .get()
                > 0.0
        );
        assert!(
            RECONCILE_DURATION_SECONDS
                .with_label_values(&["TestKind"])
                .get_sample_count()
                >= 2
        );
    }

    #[test]
    fn derived_writes_net_out_in_the_active_gauge() {
        let kind = "LifecycleKind";

        record_resource_created(kind);
        record_resource_updated(kind);
        record_resource_deleted(kind);

        for op in ["create", "update", "delete"] {
            assert!(DERIVED_WRITES_TOTAL.with_label_values(&[kind, op]).get() > 0.0);
        }
        // Created then deleted nets out to zero active
        let active = DERIVED_ACTIVE.with_label_values(&[kind]).get();
        assert!(active.abs() < f64::EPSILON);
    }

    #[test]
    fn errors_are_counted_by_category() {
        record_error("TestKind", "reconcile_error");
        assert!(
            ERRORS_TOTAL
                .with_label_values(&["TestKind", "reconcile_error"])
                .get()
                > 0.0
        );
    }

    #[test]
    fn gathered_text_carries_the_namespace_prefix() {
        record_reconciliation_success("GatherKind", Duration::from_millis(100));

        let text = gather_metrics().expect("encoding succeeds");
        assert!(text.contains("fleetdns_firestoned_io"));
        assert!(text.contains("reconciliations_total"));
    }
}
