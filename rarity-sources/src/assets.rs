//! Marketplace asset pages

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use rarity_fetch::{FetchItem, FetchOptions, FetchOutcome, FetchResponse, FetchStats};

use crate::{classify_status, normalize_asset, resolve_failure, Asset, FailureKind, MarketplaceApi, OrderDirection};

/// 429 delay when the marketplace sends no usable `Retry-After`
pub const ASSETS_RATE_LIMIT_DEFAULT: Duration = Duration::from_secs(10);

pub const META_BATCH: &str = "batch";
pub const META_NUM_BATCHES: &str = "num_batches";

/// Accumulator for asset runs
#[derive(Debug, Clone)]
pub struct AssetsContext {
    pub assets: Vec<Asset>,
    pub stats: FetchStats,
    /// Reference time for listing and sale ages
    pub now: DateTime<Utc>,
}

impl Default for AssetsContext {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            stats: FetchStats::default(),
            now: Utc::now(),
        }
    }
}

impl AssetsContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Asset requests for `token_ids`, in chunks of the API's chunk size
pub fn asset_items(api: &MarketplaceApi, contract_address: &str, token_ids: &[String]) -> Vec<FetchItem> {
    let chunk_size = api.assets_chunk_size.max(1);
    let num_batches = token_ids.len().div_ceil(chunk_size);
    token_ids
        .chunks(chunk_size)
        .enumerate()
        .map(|(batch, ids)| {
            FetchItem::new(&api.assets_url(contract_address, ids, 0, ids.len(), OrderDirection::Asc))
                .with_meta(META_BATCH, batch + 1)
                .with_meta(META_NUM_BATCHES, num_batches)
        })
        .collect()
}

/// Classifier for asset pages
pub fn classify_assets(
    item: &FetchItem,
    response: &FetchResponse,
    context: &mut AssetsContext,
    options: &FetchOptions,
) -> FetchOutcome {
    if let Some(outcome) = classify_status(
        item,
        response,
        &mut context.stats,
        options,
        ASSETS_RATE_LIMIT_DEFAULT,
    ) {
        return outcome;
    }

    let batch = item.meta(META_BATCH).cloned().unwrap_or(Value::Null);
    let num_batches = item.meta(META_NUM_BATCHES).cloned().unwrap_or(Value::Null);

    let Some(body) = response.body_json().filter(|b| b.get("error").is_none()) else {
        return resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options);
    };
    let Some(raw_assets) = body.get("assets").and_then(Value::as_array).filter(|a| !a.is_empty()) else {
        debug!("(Batch {}/{}) no assets, skip", batch, num_batches);
        context.stats.skipped += 1;
        return FetchOutcome::Skip;
    };

    let now = context.now;
    let before = context.assets.len();
    context
        .assets
        .extend(raw_assets.iter().filter_map(|raw| normalize_asset(raw, now)));
    context.stats.ok += 1;

    info!(
        "(Batch {}/{}) ok, {} assets",
        batch,
        num_batches,
        context.assets.len() - before
    );
    FetchOutcome::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_asset_items_are_chunked() {
        let api = MarketplaceApi::new("https://api.test");
        let items = asset_items(&api, "0xabc", &ids(45));

        assert_eq!(items.len(), 3);
        assert!(items[0].uri.contains("token_ids=1&"));
        assert!(items[0].uri.contains("limit=20"));
        assert!(items[2].uri.contains("token_ids=41"));
        assert!(items[2].uri.contains("limit=5"));
        assert_eq!(items[2].meta(META_BATCH), Some(&json!(3)));
        assert_eq!(items[2].meta(META_NUM_BATCHES), Some(&json!(3)));
    }

    #[test]
    fn test_classify_assets() {
        let item = FetchItem::new("https://api.test/api/v1/assets");
        let options = FetchOptions::assets();
        let mut context = AssetsContext::new();

        let page = json!({"assets": [{"token_id": "1"}, {"token_id": "2"}, {"no_id": true}]});
        assert_eq!(
            classify_assets(&item, &FetchResponse::json(&page), &mut context, &options),
            FetchOutcome::Accept
        );
        assert_eq!(context.assets.len(), 2);

        let empty = json!({"assets": []});
        assert_eq!(
            classify_assets(&item, &FetchResponse::json(&empty), &mut context, &options),
            FetchOutcome::Skip
        );

        let error = json!({"error": "bad request"});
        assert_eq!(
            classify_assets(&item, &FetchResponse::json(&error), &mut context, &options),
            FetchOutcome::Skip
        );
        assert_eq!(context.stats.malformed, 1);
        assert_eq!(context.stats.ok, 1);
    }

    #[test]
    fn test_assets_rate_limit_default() {
        let item = FetchItem::new("https://api.test/api/v1/assets");
        let mut context = AssetsContext::new();
        let outcome = classify_assets(
            &item,
            &FetchResponse::http(429, ""),
            &mut context,
            &FetchOptions::assets(),
        );
        assert_eq!(outcome, FetchOutcome::RetryAfter(ASSETS_RATE_LIMIT_DEFAULT));
    }
}
