// SPDX-License-Identifier: Apache-2.0

//! Retry logic with exponential backoff for transient GitHub failures.
//!
//! This is the short, in-call retry applied to idempotent reads. It is
//! separate from the long-horizon rescheduling in [`crate::sync::scheduler`],
//! which waits for records to replicate.

use backon::ExponentialBuilder;

use crate::error::SyncError;

/// Determines if an HTTP status code is retryable.
///
/// Retryable status codes are:
/// - 429 (Too Many Requests / Rate Limited)
/// - 500 (Internal Server Error)
/// - 502 (Bad Gateway)
/// - 503 (Service Unavailable)
/// - 504 (Gateway Timeout)
#[must_use]
pub fn is_retryable_http(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Determines if a sync error is worth retrying in place.
///
/// GitHub errors without a status (transport failures, timeouts) are retried,
/// as are retryable status codes and 403, which GitHub uses for secondary
/// rate limits. Everything else, token exchange failures included, is final.
#[must_use]
pub fn is_retryable(err: &SyncError) -> bool {
    match err {
        SyncError::GitHubApi { status: None, .. } => true,
        SyncError::GitHubApi {
            status: Some(status),
            ..
        } => is_retryable_http(*status) || *status == 403,
        _ => false,
    }
}

/// Creates a configured exponential backoff builder for retries.
///
/// - Factor: 2 (exponential growth)
/// - Min delay: 1 second
/// - Max times: 3
/// - Jitter: enabled
#[must_use]
pub fn retry_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(std::time::Duration::from_secs(1))
        .with_max_times(3)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_http_retryable_codes() {
        assert!(is_retryable_http(429));
        assert!(is_retryable_http(500));
        assert!(is_retryable_http(502));
        assert!(is_retryable_http(503));
        assert!(is_retryable_http(504));
    }

    #[test]
    fn test_is_retryable_http_non_retryable_codes() {
        assert!(!is_retryable_http(400));
        assert!(!is_retryable_http(401));
        assert!(!is_retryable_http(403));
        assert!(!is_retryable_http(404));
        assert!(!is_retryable_http(422));
        assert!(!is_retryable_http(200));
    }

    #[test]
    fn test_is_retryable_sync_errors() {
        assert!(is_retryable(&SyncError::github(None, "connection reset")));
        assert!(is_retryable(&SyncError::github(Some(503), "unavailable")));
        assert!(is_retryable(&SyncError::github(Some(403), "secondary rate limit")));
        assert!(!is_retryable(&SyncError::github(Some(404), "Not Found")));
        assert!(!is_retryable(&SyncError::github(Some(422), "Validation Failed")));
        assert!(!is_retryable(&SyncError::store("down")));
    }

    #[test]
    fn test_auth_failures_are_final() {
        assert!(!is_retryable(&SyncError::AuthExchange {
            message: "502 Bad Gateway".to_string(),
        }));
        assert!(!is_retryable(&SyncError::AuthConfig {
            message: "github.app_id is required".to_string(),
        }));
    }

    #[test]
    fn test_retry_backoff_configuration() {
        let backoff = retry_backoff();
        let _: ExponentialBuilder = backoff;
    }
}
