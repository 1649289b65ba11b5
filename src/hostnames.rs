// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname and record-name grammar.
//!
//! Every name the operator derives is assembled here, so the grammar lives in
//! exactly one place:
//!
//! - Source hostnames (what callers resolve):
//!   `{serviceName}-ns-{environmentLetter}-{environment}-{application}.{domain}`
//! - Target hostnames (where ingress traffic lands):
//!   `{cluster}-{region}-{targetPostfix}.{domain}`
//! - Route record names: `{route}-{controller}`
//! - Infrastructure record names: `{controller}-{postfix}-{dnsController}`
//!
//! All functions are pure; reconcilers pass in the already-resolved parts.

/// Build the source hostname a `ServiceRoute` publishes.
///
/// The `ns` infix marks operator-derived names so they can never collide
/// with manually managed records under the same domain.
#[must_use]
pub fn source_hostname(
    service_name: &str,
    environment_letter: &str,
    environment: &str,
    application: &str,
    domain: &str,
) -> String {
    format!("{service_name}-ns-{environment_letter}-{environment}-{application}.{domain}")
}

/// Build the target hostname ingress traffic for a gateway lands on.
#[must_use]
pub fn target_hostname(cluster: &str, region: &str, target_postfix: &str, domain: &str) -> String {
    format!("{cluster}-{region}-{target_postfix}.{domain}")
}

/// Name of the CNAME record a route fans out for one DNS controller.
#[must_use]
pub fn route_record_name(route_name: &str, controller_name: &str) -> String {
    format!("{route_name}-{controller_name}")
}

/// Name of the A record anchoring one (ingress controller, postfix) pair
/// for one DNS controller.
#[must_use]
pub fn infra_record_name(controller: &str, target_postfix: &str, dns_controller: &str) -> String {
    format!("{controller}-{target_postfix}-{dns_controller}")
}

/// Check a gateway `targetPostfix` against the grammar
/// `^[a-z0-9]+(-[a-z0-9]+)*$`: lowercase alphanumeric runs separated by
/// single hyphens, no leading or trailing hyphen.
///
/// The CRD schema enforces the same pattern at admission; this check covers
/// resources created before the schema was installed.
#[must_use]
pub fn is_valid_postfix(postfix: &str) -> bool {
    if postfix.is_empty() {
        return false;
    }

    let mut previous_was_hyphen = true;
    for c in postfix.chars() {
        match c {
            'a'..='z' | '0'..='9' => previous_was_hyphen = false,
            '-' => {
                if previous_was_hyphen {
                    return false;
                }
                previous_was_hyphen = true;
            }
            _ => return false,
        }
    }

    !previous_was_hyphen
}

#[cfg(test)]
#[path = "hostnames_tests.rs"]
mod hostnames_tests;
