//! Single JSON documents (collection stats, contract details)

use serde_json::Value;
use std::time::Duration;

use rarity_fetch::{FetchItem, FetchOptions, FetchOutcome, FetchResponse, FetchStats};

use crate::{classify_status, resolve_failure, FailureKind};

/// 429 delay when the marketplace sends no usable `Retry-After`
pub const JSON_RATE_LIMIT_DEFAULT: Duration = Duration::from_secs(10);

/// Accumulator for a single-document run
#[derive(Debug, Clone, Default)]
pub struct JsonContext {
    pub value: Option<Value>,
    pub stats: FetchStats,
}

/// Classifier storing a 2xx JSON object
pub fn classify_json(
    item: &FetchItem,
    response: &FetchResponse,
    context: &mut JsonContext,
    options: &FetchOptions,
) -> FetchOutcome {
    if let Some(outcome) = classify_status(
        item,
        response,
        &mut context.stats,
        options,
        JSON_RATE_LIMIT_DEFAULT,
    ) {
        return outcome;
    }

    match response.body_json().filter(Value::is_object) {
        Some(value) => {
            context.value = Some(value);
            context.stats.ok += 1;
            FetchOutcome::Accept
        }
        None => resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options),
    }
}

/// Floor price from a collection stats document
pub fn stats_floor_price(stats: &Value) -> Option<f64> {
    stats
        .pointer("/stats/floor_price")
        .and_then(Value::as_f64)
        .filter(|p| *p > 0.0)
}

/// Total supply from a collection stats document
pub fn stats_total_supply(stats: &Value) -> Option<u64> {
    stats
        .pointer("/stats/total_supply")
        .and_then(Value::as_f64)
        .map(|n| n as u64)
}
