//! Collection assembler
//!
//! Joins fetched tokens with marketplace assets by token id, applies the
//! validation rules and orders tokens numerically. The result is an unscored
//! [`Collection`] ready for the rarity engine.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use rarity_core::{validate_token, Collection, MarketInfo, RarityRules, Token};
use rarity_sources::{normalize_uri, Asset, MarketplaceApi};

/// Marketplace view of one token, with the site's default permalink
pub fn market_info(
    token: &Token,
    asset: Option<&Asset>,
    api: &MarketplaceApi,
    contract_address: &str,
) -> MarketInfo {
    let owner = asset.and_then(|a| a.owner.clone());
    let image_url = asset
        .and_then(|a| a.image_url.as_deref().or(a.image_original_url.as_deref()))
        .or(token.image.as_deref())
        .map(normalize_uri);

    MarketInfo {
        price: asset.and_then(|a| a.listing_price),
        listing_symbol: asset.and_then(|a| a.listing_symbol.clone()),
        is_listed: asset.is_some_and(|a| a.is_listed),
        is_auction: asset.is_some_and(|a| a.is_auction),
        last_sale_price: asset.and_then(|a| a.last_sale_price),
        permalink: Some(
            asset
                .and_then(|a| a.permalink.clone())
                .unwrap_or_else(|| api.permalink(contract_address, &token.token_id)),
        ),
        owner_url: owner.as_deref().map(|o| api.owner_url(o)),
        owner,
        image_url,
        image_preview_url: asset.and_then(|a| a.image_preview_url.as_deref()).map(normalize_uri),
        image_thumbnail_url: asset
            .and_then(|a| a.image_thumbnail_url.as_deref())
            .map(normalize_uri),
        num_owned: 0,
    }
}

/// Set `num_owned` on every token from the number of tokens its owner holds
pub fn count_owned(tokens: &mut [Token]) {
    let mut owned: HashMap<String, usize> = HashMap::new();
    for owner in tokens
        .iter()
        .filter_map(|t| t.market.as_ref().and_then(|m| m.owner.clone()))
    {
        *owned.entry(owner).or_default() += 1;
    }

    for market in tokens.iter_mut().filter_map(|t| t.market.as_mut()) {
        market.num_owned = market
            .owner
            .as_ref()
            .and_then(|o| owned.get(o).copied())
            .unwrap_or(0);
    }
}

/// Build an unscored collection from fetched tokens and assets.
///
/// Duplicate token ids keep the first token. Tokens failing validation are
/// dropped. Numeric ids sort numerically, anything else after them by string.
pub fn assemble_collection(
    name: &str,
    tokens: Vec<Token>,
    assets: &[Asset],
    rules: &RarityRules,
    api: &MarketplaceApi,
    contract_address: &str,
) -> Collection {
    let assets_by_id: HashMap<&str, &Asset> = assets
        .iter()
        .map(|asset| (asset.token_id.as_str(), asset))
        .collect();

    let fetched = tokens.len();
    let mut seen = HashSet::new();
    let mut assembled: Vec<Token> = tokens
        .into_iter()
        .filter(|token| seen.insert(token.token_id.clone()))
        .filter(|token| validate_token(token, rules))
        .map(|mut token| {
            let asset = assets_by_id.get(token.token_id.as_str()).copied();
            token.market = Some(market_info(&token, asset, api, contract_address));
            token
        })
        .collect();

    assembled.sort_by(|a, b| match (a.sort_key(), b.sort_key()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.token_id.cmp(&b.token_id),
    });
    count_owned(&mut assembled);

    if assembled.len() < fetched {
        debug!(
            "Dropped {} duplicate or invalid tokens",
            fetched - assembled.len()
        );
    }
    info!(
        "Assembled {} tokens ({} with marketplace assets)",
        assembled.len(),
        assembled
            .iter()
            .filter(|t| assets_by_id.contains_key(t.token_id.as_str()))
            .count()
    );

    Collection::new(name, assembled)
}
