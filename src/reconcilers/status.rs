// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and status-subresource patching.
//!
//! All fleetdns resources report state through the same condition format, so
//! the helpers for building conditions, diffing them, and persisting status
//! live here.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready", "DNSReady")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Update Flow
//!
//! Reconcilers clone the current status, mutate the clone through
//! [`update_condition_in_memory`] (which preserves `lastTransitionTime` when
//! the status value did not change), compare it against the original, and
//! only then patch the status subresource. A concurrent writer winning the
//! patch surfaces as [`StatusOutcome::Conflict`] so the caller can requeue
//! instead of treating it as an error.

use crate::crd::Condition;
use anyhow::{Context as _, Result};
use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, warn};

use super::is_conflict;

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "Ready", "DNSReady")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase` (e.g., "`ReconcileSucceeded`")
/// * `message` - A human-readable explanation
///
/// # Example
///
/// ```rust,no_run
/// # use fleetdns::reconcilers::status::create_condition;
/// let condition = create_condition(
///     "Ready",
///     "True",
///     "ReconcileSucceeded",
///     "3 DNS records published"
/// );
/// assert_eq!(condition.r#type, "Ready");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Check if a condition has changed compared to the existing status.
///
/// A condition is considered changed if the type, status value, or message
/// differ. The `reason` and `lastTransitionTime` are not compared, as these
/// typically change with the condition itself.
#[must_use]
pub fn condition_changed(existing: &Option<Condition>, new_condition: &Condition) -> bool {
    if let Some(current) = existing {
        current.r#type != new_condition.r#type
            || current.status != new_condition.status
            || current.message != new_condition.message
    } else {
        // No existing condition, so it has changed
        true
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// Preserves `lastTransitionTime` if the status value hasn't changed, or sets
/// a new timestamp if it has. Callers persist the result separately through
/// [`patch_namespaced_status`] or [`patch_cluster_status`].
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    // Find existing condition
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        // Preserve lastTransitionTime if status hasn't changed
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        // Create new condition
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists to check if they are semantically equal.
///
/// Ignores `lastTransitionTime` differences and only compares the semantic
/// content (type, status, reason, message).
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    for new_cond in new {
        match current.iter().find(|c| c.r#type == new_cond.r#type) {
            None => return false,
            Some(curr_cond) => {
                if curr_cond.status != new_cond.status
                    || curr_cond.reason != new_cond.reason
                    || curr_cond.message != new_cond.message
                {
                    return false;
                }
            }
        }
    }

    true
}

/// Result of a status patch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The status subresource was patched.
    Applied,
    /// The status already matched the desired state; no API call was made.
    Unchanged,
    /// A concurrent writer won the patch; the caller should requeue shortly.
    Conflict,
}

/// Patch the status subresource of a namespaced resource.
///
/// An optimistic-concurrency conflict (HTTP 409) is reported as
/// [`StatusOutcome::Conflict`] rather than an error: status conflicts are
/// expected under concurrent reconciliation and resolve on the next attempt.
///
/// # Errors
///
/// Returns an error if the API call fails for any reason other than a
/// conflict.
pub async fn patch_namespaced_status<T>(
    client: &Client,
    namespace: &str,
    name: &str,
    status: &impl serde::Serialize,
) -> Result<StatusOutcome>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let patch = json!({ "status": status });

    match api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => {
            debug!("Updated {} {}/{} status", T::kind(&()), namespace, name);
            Ok(StatusOutcome::Applied)
        }
        Err(e) if is_conflict(&e) => {
            warn!(
                "Status update conflict for {} {}/{}, will requeue",
                T::kind(&()),
                namespace,
                name
            );
            Ok(StatusOutcome::Conflict)
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Failed to update status for {} {namespace}/{name}",
                T::kind(&())
            )
        }),
    }
}

/// Patch the status subresource of a cluster-scoped resource.
///
/// Conflict handling matches [`patch_namespaced_status`].
///
/// # Errors
///
/// Returns an error if the API call fails for any reason other than a
/// conflict.
pub async fn patch_cluster_status<T>(
    client: &Client,
    name: &str,
    status: &impl serde::Serialize,
) -> Result<StatusOutcome>
where
    T: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let api: Api<T> = Api::all(client.clone());
    let patch = json!({ "status": status });

    match api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => {
            debug!("Updated {} {} status", T::kind(&()), name);
            Ok(StatusOutcome::Applied)
        }
        Err(e) if is_conflict(&e) => {
            warn!(
                "Status update conflict for {} {}, will requeue",
                T::kind(&()),
                name
            );
            Ok(StatusOutcome::Conflict)
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to update status for {} {name}", T::kind(&())))
        }
    }
}

/// Emit a Kubernetes Event mirroring a freshly published condition.
///
/// The event type is Normal when the condition status is "True" and Warning
/// otherwise. Event creation failure never fails the reconcile; it is logged
/// and swallowed.
pub async fn emit_condition_event<T>(client: &Client, resource: &T, condition: &Condition)
where
    T: Resource<DynamicType = ()> + ResourceExt,
{
    let event_type = if condition.status == "True" {
        "Normal"
    } else {
        "Warning"
    };
    let reason = condition.reason.as_deref().unwrap_or("Reconcile");
    let message = condition.message.as_deref().unwrap_or_default();

    create_event(client, resource, event_type, reason, message).await;
}

/// Create a Kubernetes Event for a resource.
///
/// Events for cluster-scoped resources land in the `default` namespace.
async fn create_event<T>(client: &Client, resource: &T, event_type: &str, reason: &str, message: &str)
where
    T: Resource<DynamicType = ()> + ResourceExt,
{
    let name = resource.name_any();
    let event_namespace = resource
        .namespace()
        .unwrap_or_else(|| "default".to_string());
    let event_api: Api<Event> = Api::namespaced(client.clone(), &event_namespace);

    let now = Time(k8s_openapi::jiff::Timestamp::now());
    let event = Event {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            generate_name: Some(format!("{name}-")),
            namespace: Some(event_namespace),
            ..Default::default()
        },
        involved_object: ObjectReference {
            api_version: Some(T::api_version(&()).to_string()),
            kind: Some(T::kind(&()).to_string()),
            name: Some(name.clone()),
            namespace: resource.namespace(),
            uid: resource.meta().uid.clone(),
            ..Default::default()
        },
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        type_: Some(event_type.to_string()),
        first_timestamp: Some(now.clone()),
        last_timestamp: Some(now),
        count: Some(1),
        ..Default::default()
    };

    if let Err(e) = event_api.create(&PostParams::default(), &event).await {
        // Events are best-effort visibility; reconciliation must not fail on them
        warn!("Failed to create event for {}: {}", name, e);
    }
}
