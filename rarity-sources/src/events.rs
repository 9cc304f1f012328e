//! Marketplace event pages

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use rarity_fetch::{FetchItem, FetchOptions, FetchOutcome, FetchResponse, FetchStats};

use crate::{classify_status, normalize_event, resolve_failure, Event, FailureKind, MarketplaceApi};

/// 429 delay when the marketplace sends no usable `Retry-After`
pub const EVENTS_RATE_LIMIT_DEFAULT: Duration = Duration::from_secs(10);

/// Listing events
pub const EVENT_TYPE_CREATED: &str = "created";

pub const META_OFFSET: &str = "offset";

/// Accumulator for event runs
#[derive(Debug, Clone, Default)]
pub struct EventsContext {
    pub events: Vec<Event>,
    pub stats: FetchStats,
}

/// Event page requests covering `api.events_limit` events
pub fn event_items(api: &MarketplaceApi, contract_address: &str, event_type: &str) -> Vec<FetchItem> {
    let page_size = api.events_page_size.max(1);
    (0..api.events_limit)
        .step_by(page_size)
        .map(|offset| {
            FetchItem::new(&api.events_url(contract_address, event_type, offset, page_size))
                .with_meta(META_OFFSET, offset)
        })
        .collect()
}

/// Classifier for event pages. An empty page is accepted with no records.
pub fn classify_events(
    item: &FetchItem,
    response: &FetchResponse,
    context: &mut EventsContext,
    options: &FetchOptions,
) -> FetchOutcome {
    if let Some(outcome) = classify_status(
        item,
        response,
        &mut context.stats,
        options,
        EVENTS_RATE_LIMIT_DEFAULT,
    ) {
        return outcome;
    }

    let Some(raw_events) = response
        .body_json()
        .and_then(|body| body.get("asset_events").and_then(Value::as_array).cloned())
    else {
        return resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options);
    };

    context
        .events
        .extend(raw_events.iter().filter_map(normalize_event));
    context.stats.ok += 1;
    let offset = item.meta(META_OFFSET).cloned().unwrap_or_default();
    debug!("Events at offset {}: {}", offset, raw_events.len());
    FetchOutcome::Accept
}
