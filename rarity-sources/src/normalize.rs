//! Raw record normalizers
//!
//! Convert marketplace asset/event JSON and token metadata JSON into typed
//! records. Prices arrive as integer amounts in the payment token's smallest
//! unit and are scaled by the token's decimals.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use rarity_core::{Attribute, Token};

use crate::normalize_uri;

pub const SYMBOL_ETH: &str = "ETH";
pub const SYMBOL_WETH: &str = "WETH";

/// A marketplace asset (listing and ownership data for one token)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Asset {
    pub token_id: String,
    pub name: Option<String>,
    pub permalink: Option<String>,
    pub image_url: Option<String>,
    pub image_original_url: Option<String>,
    pub image_preview_url: Option<String>,
    pub image_thumbnail_url: Option<String>,
    /// Owner username, falling back to the address
    pub owner: Option<String>,
    pub owner_address: Option<String>,

    pub listing_price: Option<f64>,
    pub listing_symbol: Option<String>,
    pub is_listed: bool,
    pub is_auction: bool,
    pub listing_date: Option<DateTime<Utc>>,
    pub listing_closing_date: Option<DateTime<Utc>>,
    pub listing_hours: Option<f64>,
    pub listing_days: Option<f64>,

    pub last_sale_price: Option<f64>,
    pub last_sale_symbol: Option<String>,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub last_sale_hours: Option<f64>,
    pub last_sale_days: Option<f64>,
}

/// A marketplace event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    pub token_id: Option<String>,
    pub asset_name: Option<String>,
    pub event_type: String,
    pub listing_price: Option<f64>,
    pub listing_symbol: Option<String>,
    pub is_listing: bool,
    pub is_bundle: bool,
    pub is_public: bool,
    pub listing_date: Option<DateTime<Utc>>,
    /// `YYYY-MM-DD` of the listing date
    pub listing_short_date: Option<String>,
}

/// Scale an integer amount (string or number) by `decimals`
pub fn token_amount(amount: &Value, decimals: &Value) -> Option<f64> {
    let amount = match amount {
        Value::String(s) => s.parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    let decimals = decimals.as_i64()?;
    Some(amount / 10f64.powi(decimals as i32))
}

/// Parse marketplace timestamps (RFC 3339, or naive ISO 8601 taken as UTC)
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn hours_since(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<f64> {
    date.map(|d| (now - d).num_seconds() as f64 / 3600.0)
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Normalize one marketplace asset. Returns `None` without a token id.
pub fn normalize_asset(raw: &Value, now: DateTime<Utc>) -> Option<Asset> {
    let Some(token_id) = string_at(raw, "/token_id") else {
        debug!("Asset without token_id");
        return None;
    };

    let order = raw.pointer("/sell_orders/0");
    let listing_symbol = order.and_then(|o| string_at(o, "/payment_token_contract/symbol"));
    let listing_amount = order.and_then(|o| {
        token_amount(
            o.get("base_price")?,
            o.pointer("/payment_token_contract/decimals")?,
        )
    });
    let listing_price = listing_amount.filter(|_| listing_symbol.as_deref() == Some(SYMBOL_ETH));
    let listing_date = order.and_then(|o| parse_timestamp(o.get("created_date")?));
    let listing_closing_date = order.and_then(|o| parse_timestamp(o.get("closing_date")?));
    let listing_hours = hours_since(listing_date, now);

    let last_sale = raw.get("last_sale").filter(|v| v.is_object());
    let last_sale_price = last_sale.and_then(|s| {
        token_amount(s.get("total_price")?, s.pointer("/payment_token/decimals")?)
    });
    let last_sale_date = last_sale.and_then(|s| parse_timestamp(s.get("event_timestamp")?));
    let last_sale_hours = hours_since(last_sale_date, now);

    let owner_address = string_at(raw, "/owner/address");
    let owner = string_at(raw, "/owner/user/username").or_else(|| owner_address.clone());

    Some(Asset {
        token_id,
        name: string_at(raw, "/name"),
        permalink: string_at(raw, "/permalink"),
        image_url: string_at(raw, "/image_url"),
        image_original_url: string_at(raw, "/image_original_url"),
        image_preview_url: string_at(raw, "/image_preview_url"),
        image_thumbnail_url: string_at(raw, "/image_thumbnail_url"),
        owner,
        owner_address,
        is_listed: listing_price.is_some_and(|p| p > 0.0),
        is_auction: listing_symbol.as_deref() == Some(SYMBOL_WETH)
            && listing_amount.is_some_and(|p| p > 0.0),
        listing_price,
        listing_symbol,
        listing_date,
        listing_closing_date,
        listing_hours,
        listing_days: listing_hours.map(|h| h / 24.0),
        last_sale_price,
        last_sale_symbol: last_sale.and_then(|s| string_at(s, "/payment_token/symbol")),
        last_sale_date,
        last_sale_hours,
        last_sale_days: last_sale_hours.map(|h| h / 24.0),
    })
}

/// Normalize one marketplace event
pub fn normalize_event(raw: &Value) -> Option<Event> {
    let event_type = string_at(raw, "/event_type")?;
    let listing_date = raw.get("created_date").and_then(parse_timestamp);
    let listing_symbol = string_at(raw, "/payment_token/symbol");
    let listing_price = raw.get("starting_price").and_then(|price| {
        token_amount(price, raw.pointer("/payment_token/decimals")?)
    });

    Some(Event {
        token_id: string_at(raw, "/asset/token_id"),
        asset_name: string_at(raw, "/asset/name"),
        is_listing: event_type == "created",
        is_bundle: raw.get("asset_bundle").is_some_and(|b| !b.is_null()),
        is_public: !raw.get("is_private").and_then(Value::as_bool).unwrap_or(false),
        listing_short_date: listing_date.map(|d| d.format("%Y-%m-%d").to_string()),
        event_type,
        listing_price,
        listing_symbol,
        listing_date,
    })
}

/// Build a token from metadata JSON.
///
/// Known fields are lifted onto the token; everything else lands in `extra`.
/// The image is rewritten through the IPFS gateway.
pub fn normalize_token(token_id: &str, token_uri: Option<&str>, metadata: &Map<String, Value>) -> Token {
    let attributes = metadata
        .get("attributes")
        .map(Attribute::parse_list)
        .unwrap_or_default();

    let mut token = Token::new(token_id, attributes);
    token.name = metadata.get("name").and_then(Value::as_str).map(str::to_string);
    token.image = metadata
        .get("image")
        .and_then(Value::as_str)
        .map(normalize_uri);
    token.token_uri = token_uri.map(str::to_string);
    token.extra = metadata
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "attributes" | "name" | "image"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    token
}
