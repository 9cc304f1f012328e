//! Collection container and trait aggregates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{OutlierStats, Token};

/// Metrics of one trait value across the collection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitValueAgg {
    /// Number of tokens carrying this value
    pub count: usize,
    pub freq: f64,
    pub rarity: f64,
    pub rarity_additional: f64,
    pub rarity_norm: f64,
    pub rarity_additional_norm: f64,
    pub score: f64,
}

/// Aggregate of one trait type across the collection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitTypeAgg {
    /// Number of trait instances of this type (equals the token count after None-filling)
    pub count: usize,
    pub items: BTreeMap<String, TraitValueAgg>,
    /// Number of distinct values
    pub num_values: usize,
    pub norm_factor: f64,
}

/// Aggregate of all trait types
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitSummary {
    pub items: BTreeMap<String, TraitTypeAgg>,
    pub num_values: usize,
    pub num_traits: usize,
    pub avg_num_values_per_trait: f64,
}

/// An assembled collection of tokens
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub traits: TraitSummary,
    #[serde(default)]
    pub outliers: Option<OutlierStats>,
    #[serde(default)]
    pub(crate) scored: bool,
}

impl Collection {
    /// Create a fresh, unscored collection
    pub fn new(name: &str, tokens: Vec<Token>) -> Self {
        Self {
            name: name.to_string(),
            tokens,
            ..Default::default()
        }
    }

    pub fn num_tokens(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the rarity engine has already run on this collection
    pub fn is_scored(&self) -> bool {
        self.scored
    }

    /// Frequency of a trait value, once rarity has been computed
    pub fn trait_frequency(&self, trait_type: &str, value: &str) -> Option<f64> {
        self.trait_value(trait_type, value).map(|v| v.freq)
    }

    pub fn trait_value(&self, trait_type: &str, value: &str) -> Option<&TraitValueAgg> {
        self.traits.items.get(trait_type).and_then(|t| t.items.get(value))
    }

    pub fn get_token(&self, token_id: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.token_id == token_id)
    }

    /// Tokens ordered by a ranking key, best first
    pub fn ranked_by(&self, key: crate::RankKey) -> Vec<&Token> {
        let mut tokens: Vec<&Token> = self.tokens.iter().collect();
        tokens.sort_by_key(|t| t.rank(key).unwrap_or(usize::MAX));
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attribute, RankKey};

    #[test]
    fn test_new_collection_is_unscored() {
        let collection = Collection::new(
            "test",
            vec![Token::new("1", vec![Attribute::text("Eyes", "Blue")])],
        );
        assert!(!collection.is_scored());
        assert_eq!(collection.num_tokens(), 1);
        assert!(collection.trait_frequency("Eyes", "Blue").is_none());
        assert!(collection.get_token("1").is_some());
    }

    #[test]
    fn test_ranked_by_unranked_keeps_all() {
        let collection = Collection::new("test", vec![Token::new("1", vec![]), Token::new("2", vec![])]);
        assert_eq!(collection.ranked_by(RankKey::Score).len(), 2);
    }
}
