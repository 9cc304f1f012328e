//! Tokens of a collection
//!
//! A token starts life as a bag of raw attributes. The rarity engine fills in
//! its traits, levels, aggregate scores and ranks in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{Attribute, RankKey, TraitValueAgg, TRAIT_COUNT_TYPE};

/// Where a scored trait came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// Taken from the token's own attributes
    #[default]
    Normal,
    /// The synthetic `Trait Count` trait
    TraitCount,
    /// Derived from a custom trait rule
    Custom,
    /// Inserted by None-filling
    Filled,
}

/// A string-valued trait on a token, annotated with its collection metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenTrait {
    pub trait_type: String,
    pub value: String,
    #[serde(default)]
    pub kind: TraitKind,
    #[serde(default)]
    pub metrics: TraitValueAgg,
}

impl TokenTrait {
    pub fn new(trait_type: &str, value: &str, kind: TraitKind) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.to_string(),
            kind,
            metrics: TraitValueAgg::default(),
        }
    }

    pub fn is_trait_count(&self) -> bool {
        self.trait_type == TRAIT_COUNT_TYPE
    }

    /// `Type/Value` key used by weights and custom trait rules
    pub fn key(&self) -> String {
        format!("{}/{}", self.trait_type, self.value)
    }
}

/// A numeric attribute, summed into [`Token::level`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub trait_type: String,
    pub value: f64,
}

/// Rank of a token under one ranking key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    /// Dense rank, starting at 1
    pub rank: usize,
    /// `round(rank / num_tokens, 3)`
    pub top: f64,
}

/// Marketplace data merged onto a token by the collection assembler
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketInfo {
    pub price: Option<f64>,
    pub listing_symbol: Option<String>,
    pub is_listed: bool,
    pub is_auction: bool,
    pub last_sale_price: Option<f64>,
    pub permalink: Option<String>,
    pub owner: Option<String>,
    pub owner_url: Option<String>,
    pub image_url: Option<String>,
    pub image_preview_url: Option<String>,
    pub image_thumbnail_url: Option<String>,
    pub num_owned: usize,
}

/// A token of a collection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Token {
    pub token_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,

    /// Raw attributes as fetched
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Any other metadata fields (edition, description, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,

    #[serde(default)]
    pub traits: Vec<TokenTrait>,
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub others: Vec<Attribute>,
    #[serde(default)]
    pub trait_count: usize,

    #[serde(default)]
    pub level: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub rarity: f64,
    #[serde(default)]
    pub rarity_additional: f64,
    #[serde(default)]
    pub rarity_norm: f64,
    #[serde(default)]
    pub rarity_additional_norm: f64,
    #[serde(default)]
    pub has_rarity: bool,

    #[serde(default)]
    pub ranks: BTreeMap<RankKey, RankEntry>,
    /// Outlier values per score key
    #[serde(default)]
    pub ovs: BTreeMap<RankKey, f64>,
    /// Outlier value of the `score` key
    #[serde(default)]
    pub ov: Option<f64>,

    #[serde(default)]
    pub market: Option<MarketInfo>,
}

impl Token {
    /// Create an unscored token from raw attributes
    pub fn new(token_id: &str, attributes: Vec<Attribute>) -> Self {
        Self {
            token_id: token_id.to_string(),
            attributes,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    /// Numeric sort key for the token id (ids are decimal strings)
    pub fn sort_key(&self) -> Option<u64> {
        self.token_id.parse().ok()
    }

    /// Value of a scored trait
    pub fn trait_value(&self, trait_type: &str) -> Option<&str> {
        self.traits
            .iter()
            .find(|t| t.trait_type == trait_type)
            .map(|t| t.value.as_str())
    }

    pub fn has_trait_type(&self, trait_type: &str) -> bool {
        self.traits.iter().any(|t| t.trait_type == trait_type)
    }

    /// Rank under a ranking key, once ranks are computed
    pub fn rank(&self, key: RankKey) -> Option<usize> {
        self.ranks.get(&key).map(|r| r.rank)
    }

    /// Top fraction under a ranking key
    pub fn top(&self, key: RankKey) -> Option<f64> {
        self.ranks.get(&key).map(|r| r.top)
    }

    pub fn score_rank(&self) -> Option<usize> {
        self.rank(RankKey::Score)
    }

    pub fn score_top(&self) -> Option<f64> {
        self.top(RankKey::Score)
    }

    /// Look up a top-level property by name, for validation rules
    pub fn property(&self, key: &str) -> Option<Value> {
        match key {
            "token_id" => Some(Value::String(self.token_id.clone())),
            "name" => self.name.clone().map(Value::String),
            "image" => self.image.clone().map(Value::String),
            "token_uri" => self.token_uri.clone().map(Value::String),
            _ => self.extra.get(key).cloned(),
        }
    }
}
