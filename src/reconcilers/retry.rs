// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry for transient Kubernetes API failures.
//!
//! The cache fallback paths list fleet singletons straight from the API
//! server; a flaky apiserver there would otherwise surface as a failed
//! reconcile. Calls are retried on HTTP 429 and 5xx with exponential
//! backoff, and fail fast on every other client error.

use anyhow::Result;
use rand::RngExt;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const INITIAL_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(30);
const RETRY_BUDGET: Duration = Duration::from_secs(300);
const JITTER_FRACTION: f64 = 0.1;

/// Exponential backoff schedule: 100ms doubling up to a 30s ceiling,
/// jittered by ±10%, with an overall five-minute budget measured from
/// construction.
pub struct Backoff {
    delay: Duration,
    started: Instant,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            delay: INITIAL_DELAY,
            started: Instant::now(),
        }
    }
}

impl Backoff {
    /// Next sleep duration, or `None` once the retry budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= RETRY_BUDGET {
            return None;
        }
        let base = self.delay;
        self.delay = (base * 2).min(MAX_DELAY);
        Some(jittered(base))
    }
}

/// Spread a delay by ±10% so synchronized reconcilers don't hammer the
/// apiserver in lockstep.
fn jittered(delay: Duration) -> Duration {
    let secs = delay.as_secs_f64();
    let spread = secs * JITTER_FRACTION;
    let mut rng = rand::rng();
    Duration::from_secs_f64(rng.random_range((secs - spread).max(0.0)..=secs + spread))
}

/// Whether an API error is worth retrying.
///
/// 429 and 5xx are apiserver-side and transient; connection-level
/// `Service` errors likewise. Everything else (400, 401, 404, 409, ...)
/// reflects the request itself and retrying it verbatim cannot help.
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(resp) => resp.code == 429 || (500u16..600).contains(&resp.code),
        kube::Error::Service(_) => true,
        _ => false,
    }
}

/// Run a Kubernetes API call, retrying transient failures with backoff.
///
/// `operation_name` labels the log lines (e.g. "list cluster identities").
///
/// # Errors
///
/// Returns the underlying error for non-retryable failures, or a budget
/// exhaustion error wrapping the last failure once five minutes of retries
/// have passed.
///
/// # Example
///
/// ```no_run
/// use kube::{Api, Client};
/// use kube::api::ListParams;
/// use fleetdns::crd::ClusterIdentity;
/// use fleetdns::reconcilers::retry::retry_api_call;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<ClusterIdentity> = Api::all(client);
///
/// let identities = retry_api_call(
///     || async { api.list(&ListParams::default()).await },
///     "list cluster identities"
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = Backoff::default();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt, "API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !is_retryable_error(&err) {
            error!(
                operation = operation_name,
                error = %err,
                "Non-retryable API error"
            );
            return Err(err.into());
        }

        match backoff.next_delay() {
            Some(delay) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_after = ?delay,
                    error = %err,
                    "Transient API error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Retry budget exhausted"
                );
                return Err(anyhow::anyhow!(
                    "{operation_name}: retry budget exhausted after {attempt} attempts: {err}"
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
