// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{is_retryable_error, retry_api_call, Backoff};
    use std::cell::Cell;
    use std::time::Duration;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("HTTP {code}"),
            reason: reason.to_string(),
            code,
            details: None,
            metadata: None,
        }))
    }

    #[test]
    fn first_delay_is_jittered_initial_interval() {
        let mut backoff = Backoff::default();
        let first = backoff.next_delay().expect("fresh backoff yields a delay");

        // 100ms ±10%
        assert!(first >= Duration::from_millis(90) && first <= Duration::from_millis(110));
    }

    #[test]
    fn delays_double_until_the_ceiling() {
        let mut backoff = Backoff::default();

        let first = backoff.next_delay().unwrap();
        let second = backoff.next_delay().unwrap();
        assert!(second > first, "delays should grow");

        // 100ms * 2^20 is far past the 30s ceiling, so from here on every
        // delay is a jittered 30s.
        for _ in 0..20 {
            backoff.next_delay();
        }
        let capped = backoff.next_delay().expect("budget not yet spent");
        assert!(capped >= Duration::from_secs(27) && capped <= Duration::from_secs(33));
    }

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(is_retryable_error(&api_error(429, "TooManyRequests")));
        assert!(is_retryable_error(&api_error(500, "InternalServerError")));
        assert!(is_retryable_error(&api_error(503, "ServiceUnavailable")));
        assert!(is_retryable_error(&api_error(599, "ServerError")));
    }

    #[test]
    fn client_errors_fail_fast() {
        assert!(!is_retryable_error(&api_error(400, "BadRequest")));
        assert!(!is_retryable_error(&api_error(401, "Unauthorized")));
        assert!(!is_retryable_error(&api_error(404, "NotFound")));
        assert!(!is_retryable_error(&api_error(409, "Conflict")));
    }

    #[test]
    fn connection_errors_are_retryable() {
        let service_error: Box<dyn std::error::Error + Send + Sync> = Box::new(
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection failed"),
        );

        assert!(is_retryable_error(&kube::Error::Service(service_error)));
    }

    #[tokio::test]
    async fn retries_through_transient_errors() {
        let attempts = Cell::new(0u32);

        let result: anyhow::Result<&str> = retry_api_call(
            || {
                attempts.set(attempts.get() + 1);
                let outcome = if attempts.get() < 3 {
                    Err(api_error(503, "ServiceUnavailable"))
                } else {
                    Ok("listed")
                };
                async move { outcome }
            },
            "list test resources",
        )
        .await;

        assert_eq!(result.unwrap(), "listed");
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_immediately_on_client_errors() {
        let attempts = Cell::new(0u32);

        let result: anyhow::Result<&str> = retry_api_call(
            || {
                attempts.set(attempts.get() + 1);
                let outcome = Err(api_error(404, "NotFound"));
                async move { outcome }
            },
            "get missing resource",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}
