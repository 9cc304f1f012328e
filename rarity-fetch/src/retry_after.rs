//! `Retry-After` header parsing
//!
//! The header is either delta-seconds (`120`) or an HTTP-date
//! (`Wed, 21 Oct 2015 07:28:00 GMT`).

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use crate::FetchResponse;

/// Parse a `Retry-After` value relative to `now`.
///
/// Dates in the past give a zero delay. Returns `None` when unparseable.
pub fn parse_retry_after_at(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Parse a `Retry-After` value relative to the current time
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    parse_retry_after_at(value, Utc::now())
}

/// Delay requested by a response's `Retry-After` header, or `default`
pub fn retry_after(response: &FetchResponse, default: Duration) -> Duration {
    match response.header("retry-after") {
        Some(value) => parse_retry_after(value).unwrap_or_else(|| {
            debug!("Unparseable Retry-After {:?}, using {:?}", value, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delta_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();
        let delay = parse_retry_after_at("Wed, 21 Oct 2015 07:28:00 GMT", now).unwrap();
        assert_eq!(delay, Duration::from_secs(30));

        let later = Utc.with_ymd_and_hms(2015, 10, 21, 8, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after_at("Wed, 21 Oct 2015 07:28:00 GMT", later),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_garbage_falls_back() {
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-5"), None);

        let default = Duration::from_secs(5);
        let garbage = FetchResponse::http(429, "").with_header("Retry-After", "soon");
        assert_eq!(retry_after(&garbage, default), default);
        let missing = FetchResponse::http(429, "");
        assert_eq!(retry_after(&missing, default), default);
        let two = FetchResponse::http(429, "").with_header("Retry-After", "2");
        assert_eq!(retry_after(&two, default), Duration::from_secs(2));
    }
}
