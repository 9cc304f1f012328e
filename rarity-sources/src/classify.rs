//! Shared status classification
//!
//! Every data source maps transport failures and non-2xx statuses the same
//! way; only the 429 fallback delay differs per source. Successful responses
//! are left to the source's payload handler.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use rarity_fetch::{retry_after, FetchItem, FetchOptions, FetchOutcome, FetchResponse, FetchStats};

/// Item metadata key: the marketplace already lists this token
pub const META_HAS_ASSET: &str = "has_asset";

/// Why an attempt did not produce a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("transport timeout")]
    TransportTimeout,

    #[error("request could not be built")]
    TransportSetupFailure,

    #[error("rate limited for {0:?}")]
    RateLimited(Duration),

    #[error("transient server error")]
    TransientServerError,

    #[error("client error {0}")]
    PermanentClientError(u16),

    #[error("not available yet")]
    NotYetAvailable,

    #[error("malformed payload")]
    MalformedPayload,

    #[error("unknown status {0}")]
    UnknownStatus(u16),

    #[error("retry budget exhausted")]
    BudgetExhausted,
}

impl FailureKind {
    /// Outcome for this failure under the run's options
    pub fn outcome(&self, options: &FetchOptions) -> FetchOutcome {
        match self {
            FailureKind::TransportTimeout => FetchOutcome::RetryAfter(options.timeout_delay),
            FailureKind::RateLimited(delay) => FetchOutcome::RetryAfter(*delay),
            FailureKind::TransientServerError => FetchOutcome::RetryAfter(options.standard_delay),
            FailureKind::NotYetAvailable => FetchOutcome::RetryAfter(options.placeholder_delay),
            FailureKind::TransportSetupFailure
            | FailureKind::PermanentClientError(_)
            | FailureKind::MalformedPayload
            | FailureKind::UnknownStatus(_)
            | FailureKind::BudgetExhausted => FetchOutcome::Skip,
        }
    }

    /// Count this failure and the outcome it leads to
    pub fn record(&self, stats: &mut FetchStats, outcome: FetchOutcome) {
        match self {
            FailureKind::TransportTimeout => stats.timeouts += 1,
            FailureKind::TransportSetupFailure => stats.no_request += 1,
            FailureKind::RateLimited(_) => stats.rate_limited += 1,
            FailureKind::TransientServerError => stats.server_errors += 1,
            FailureKind::PermanentClientError(_) => stats.not_found += 1,
            FailureKind::NotYetAvailable => stats.placeholders += 1,
            FailureKind::MalformedPayload => stats.malformed += 1,
            FailureKind::UnknownStatus(_) => stats.unknown_status += 1,
            FailureKind::BudgetExhausted => stats.expired += 1,
        }
        match outcome {
            FetchOutcome::RetryAfter(_) => stats.retries += 1,
            FetchOutcome::Skip => stats.skipped += 1,
            FetchOutcome::Accept => {}
        }
    }
}

/// Failure kind of a non-2xx response, `None` for success.
///
/// `rate_limit_default` is used when a 429 carries no usable `Retry-After`.
pub fn failure_kind(
    item: &FetchItem,
    response: &FetchResponse,
    rate_limit_default: Duration,
) -> Option<FailureKind> {
    let status = match response {
        FetchResponse::NoResponse(_) => return Some(FailureKind::TransportTimeout),
        FetchResponse::NoRequest(_) => return Some(FailureKind::TransportSetupFailure),
        FetchResponse::Expired => return Some(FailureKind::BudgetExhausted),
        FetchResponse::Http { status, .. } => *status,
    };

    match status {
        200..=299 => None,
        408 => Some(FailureKind::TransportTimeout),
        429 => Some(FailureKind::RateLimited(retry_after(response, rate_limit_default))),
        500 | 503 | 504 => Some(FailureKind::TransientServerError),
        403 | 404 | 502 if item.meta_bool(META_HAS_ASSET) => Some(FailureKind::NotYetAvailable),
        403 | 404 | 502 => Some(FailureKind::PermanentClientError(status)),
        other => Some(FailureKind::UnknownStatus(other)),
    }
}

/// Resolve a failure to an outcome, recording it in `stats`
pub fn resolve_failure(
    item: &FetchItem,
    kind: FailureKind,
    stats: &mut FetchStats,
    options: &FetchOptions,
) -> FetchOutcome {
    let outcome = kind.outcome(options);
    kind.record(stats, outcome);

    match kind {
        FailureKind::TransportSetupFailure => error!("{}: {}, skipping", item.uri, kind),
        FailureKind::RateLimited(_) | FailureKind::TransientServerError => {
            info!("{}: {}, {:?}", item.uri, kind, outcome)
        }
        _ => debug!("{}: {}, {:?}", item.uri, kind, outcome),
    }
    outcome
}

/// Shared mapping for transport failures and non-2xx statuses.
///
/// Returns `None` for a 2xx response, which the caller handles itself.
pub fn classify_status(
    item: &FetchItem,
    response: &FetchResponse,
    stats: &mut FetchStats,
    options: &FetchOptions,
    rate_limit_default: Duration,
) -> Option<FetchOutcome> {
    let kind = failure_kind(item, response, rate_limit_default)?;
    Some(resolve_failure(item, kind, stats, options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(item: &FetchItem, response: FetchResponse) -> (Option<FetchOutcome>, FetchStats) {
        let mut stats = FetchStats::default();
        let outcome = classify_status(
            item,
            &response,
            &mut stats,
            &FetchOptions::tokens(),
            Duration::from_secs(5),
        );
        (outcome, stats)
    }

    #[test]
    fn test_success_is_left_to_caller() {
        let item = FetchItem::new("https://api.test/1");
        assert_eq!(classify(&item, FetchResponse::http(200, "{}")).0, None);
    }

    #[test]
    fn test_transport_failures() {
        let item = FetchItem::new("https://api.test/1");
        let options = FetchOptions::tokens();

        let (outcome, stats) = classify(&item, FetchResponse::NoResponse("timed out".into()));
        assert_eq!(outcome, Some(FetchOutcome::RetryAfter(options.timeout_delay)));
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.retries, 1);

        let (outcome, stats) = classify(&item, FetchResponse::NoRequest("bad uri".into()));
        assert_eq!(outcome, Some(FetchOutcome::Skip));
        assert_eq!(stats.no_request, 1);

        let (outcome, stats) = classify(&item, FetchResponse::Expired);
        assert_eq!(outcome, Some(FetchOutcome::Skip));
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_status_mapping() {
        let item = FetchItem::new("https://api.test/1");
        let options = FetchOptions::tokens();

        assert_eq!(
            classify(&item, FetchResponse::http(408, "")).0,
            Some(FetchOutcome::RetryAfter(options.timeout_delay))
        );
        assert_eq!(
            classify(&item, FetchResponse::http(503, "")).0,
            Some(FetchOutcome::RetryAfter(options.standard_delay))
        );
        assert_eq!(classify(&item, FetchResponse::http(404, "")).0, Some(FetchOutcome::Skip));
        assert_eq!(classify(&item, FetchResponse::http(502, "")).0, Some(FetchOutcome::Skip));

        let (outcome, stats) = classify(&item, FetchResponse::http(418, ""));
        assert_eq!(outcome, Some(FetchOutcome::Skip));
        assert_eq!(stats.unknown_status, 1);
    }

    #[test]
    fn test_rate_limit_delay() {
        let item = FetchItem::new("https://api.test/1");
        let limited = FetchResponse::http(429, "").with_header("Retry-After", "120");
        assert_eq!(
            classify(&item, limited).0,
            Some(FetchOutcome::RetryAfter(Duration::from_secs(120)))
        );

        let (outcome, stats) = classify(&item, FetchResponse::http(429, ""));
        assert_eq!(outcome, Some(FetchOutcome::RetryAfter(Duration::from_secs(5))));
        assert_eq!(stats.rate_limited, 1);
    }

    #[test]
    fn test_known_asset_waits_for_reveal() {
        let item = FetchItem::new("https://api.test/1").with_meta(META_HAS_ASSET, true);
        let (outcome, stats) = classify(&item, FetchResponse::http(404, ""));
        assert_eq!(
            outcome,
            Some(FetchOutcome::RetryAfter(FetchOptions::tokens().placeholder_delay))
        );
        assert_eq!(stats.placeholders, 1);
    }
}
