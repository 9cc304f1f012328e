//! Token metadata sources
//!
//! Tokens are fetched either from their token URI (a JSON document) or from
//! the collection's token homepage (HTML with embedded page data). Both end up
//! in the same payload handler.

use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use rarity_core::{Attribute, Token};
use rarity_fetch::{
    extract_next_data, extract_title, FetchItem, FetchOptions, FetchOutcome, FetchResponse,
    FetchStats,
};

use crate::{
    classify_status, create_token_uri, is_placeholder, normalize_token, normalize_uri,
    resolve_failure, FailureKind, META_HAS_ASSET,
};

/// 429 delay when the token host sends no usable `Retry-After`
pub const TOKENS_RATE_LIMIT_DEFAULT: Duration = Duration::from_secs(5);

pub const META_TOKEN_ID: &str = "token_id";
pub const META_TOKEN_URI: &str = "token_uri";

/// Where the token payload sits inside a homepage's page data
pub const HOMEPAGE_TOKEN_POINTER: &str = "/props/pageProps/edition/tokenData";

/// Accumulator for token runs
#[derive(Debug, Clone, Default)]
pub struct TokensContext {
    pub tokens: Vec<Token>,
    pub stats: FetchStats,
    /// Image served by unrevealed tokens
    pub unrevealed_image: Option<String>,
}

impl TokensContext {
    pub fn new(unrevealed_image: Option<&str>) -> Self {
        Self {
            unrevealed_image: unrevealed_image.map(normalize_uri),
            ..Default::default()
        }
    }
}

/// One item per token id; ids in `known` are marked as listed on the marketplace
pub fn token_items(template: &str, token_ids: &[String], known: &HashSet<String>) -> Vec<FetchItem> {
    token_ids
        .iter()
        .map(|id| {
            let uri = normalize_uri(&create_token_uri(id, template));
            FetchItem::new(&uri)
                .with_meta(META_TOKEN_ID, id.as_str())
                .with_meta(META_TOKEN_URI, uri.as_str())
                .with_meta(META_HAS_ASSET, known.contains(id))
        })
        .collect()
}

/// Classifier for token URI responses
pub fn classify_token_metadata(
    item: &FetchItem,
    response: &FetchResponse,
    context: &mut TokensContext,
    options: &FetchOptions,
) -> FetchOutcome {
    if let Some(outcome) = classify_status(
        item,
        response,
        &mut context.stats,
        options,
        TOKENS_RATE_LIMIT_DEFAULT,
    ) {
        return outcome;
    }

    match response.body_json() {
        Some(payload) => handle_token_payload(item, &payload, context, options),
        None => resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options),
    }
}

/// Classifier for token homepage responses
pub fn classify_token_homepage(
    item: &FetchItem,
    response: &FetchResponse,
    context: &mut TokensContext,
    options: &FetchOptions,
) -> FetchOutcome {
    if let Some(outcome) = classify_status(
        item,
        response,
        &mut context.stats,
        options,
        TOKENS_RATE_LIMIT_DEFAULT,
    ) {
        return outcome;
    }

    let html = response.body().unwrap_or_default();
    let Some(data) = extract_next_data(html) else {
        return resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options);
    };
    let mut payload = data.pointer(HOMEPAGE_TOKEN_POINTER).cloned().unwrap_or(data);
    // Page title stands in for a missing token name
    if let (Some(metadata), Some(title)) = (payload.as_object_mut(), extract_title(html)) {
        metadata.entry("name").or_insert(Value::String(title));
    }
    handle_token_payload(item, &payload, context, options)
}

fn handle_token_payload(
    item: &FetchItem,
    payload: &Value,
    context: &mut TokensContext,
    options: &FetchOptions,
) -> FetchOutcome {
    let token_id = item.meta_str(META_TOKEN_ID).unwrap_or_default();

    let Some(metadata) = payload.as_object() else {
        debug!("[{}] skip (metadata is not an object)", token_id);
        return resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options);
    };
    if metadata.contains_key("error") {
        debug!("[{}] skip (metadata error field)", token_id);
        return resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options);
    }

    let attributes = metadata
        .get("attributes")
        .map(Attribute::parse_list)
        .unwrap_or_default();
    if attributes.is_empty() {
        // Known to the marketplace: metadata is most likely not revealed yet
        if item.meta_bool(META_HAS_ASSET) {
            return resolve_failure(item, FailureKind::NotYetAvailable, &mut context.stats, options);
        }
        debug!("[{}] skip (no attributes, likely non-existing token)", token_id);
        context.stats.skipped += 1;
        return FetchOutcome::Skip;
    }

    if !metadata.get("image").is_some_and(Value::is_string) {
        debug!("[{}] skip (attributes without image)", token_id);
        return resolve_failure(item, FailureKind::MalformedPayload, &mut context.stats, options);
    }

    let token = normalize_token(token_id, item.meta_str(META_TOKEN_URI), metadata);
    if is_placeholder(token.image.as_deref(), context.unrevealed_image.as_deref()) {
        info!("[{}] unrevealed image, retry later", token_id);
        return resolve_failure(item, FailureKind::NotYetAvailable, &mut context.stats, options);
    }

    context.tokens.push(token);
    context.stats.ok += 1;
    debug!("[{}] ok", token_id);
    FetchOutcome::Accept
}
