//! Rarity rules
//!
//! Rules control how trait rarities are combined into a score:
//! - `additional_weight`: multiply rarities by per-type or per-value weights
//! - `normalize`: scale rarities by how many values a trait type has
//! - `trait_count`: include the synthetic `Trait Count` trait in totals
//! - `custom_traits`: derive extra traits from existing ones
//! - `validation`: drop tokens that do not match required traits/properties

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::{RankKey, Token};

/// Wildcard value in validation trait rules
pub const VALIDATION_ANY: &str = "*";

/// Token validation rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Required trait types and values (`*` matches any value)
    #[serde(default)]
    pub traits: BTreeMap<String, String>,
    /// Required top-level properties and their exact values
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Rules for the rarity engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RarityRules {
    #[serde(default)]
    pub additional_weight: bool,
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub trait_count: bool,
    /// Weights keyed by `Type` or `Type/Value`
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
    /// `Type/Value` -> `NewType/NewValue`
    #[serde(default)]
    pub custom_traits: BTreeMap<String, String>,
    #[serde(default)]
    pub validation: Option<ValidationRules>,
    /// Score key to compute outlier values for
    #[serde(default)]
    pub outliers: Option<RankKey>,
}

impl RarityRules {
    pub fn with_additional_weight(mut self, enabled: bool) -> Self {
        self.additional_weight = enabled;
        self
    }

    pub fn with_normalize(mut self, enabled: bool) -> Self {
        self.normalize = enabled;
        self
    }

    pub fn with_trait_count(mut self, enabled: bool) -> Self {
        self.trait_count = enabled;
        self
    }

    pub fn with_weight(mut self, key: &str, weight: f64) -> Self {
        self.weights
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), weight);
        self
    }

    pub fn with_custom_trait(mut self, from: &str, to: &str) -> Self {
        self.custom_traits.insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_outliers(mut self, key: RankKey) -> Self {
        self.outliers = Some(key);
        self
    }

    /// Weight for a trait value: `Type/Value` overrides `Type`, default 1
    pub fn weight_for(&self, trait_type: &str, value: &str) -> f64 {
        let Some(weights) = &self.weights else {
            return 1.0;
        };
        weights
            .get(&format!("{}/{}", trait_type, value))
            .or_else(|| weights.get(trait_type))
            .copied()
            .unwrap_or(1.0)
    }

    /// Target `(type, value)` of the custom trait rule matching a trait, if any
    pub fn custom_trait_for(&self, trait_type: &str, value: &str) -> Option<(String, String)> {
        let target = self.custom_traits.get(&format!("{}/{}", trait_type, value))?;
        match target.split_once('/') {
            Some((new_type, new_value)) if !new_type.is_empty() => {
                Some((new_type.to_string(), new_value.to_string()))
            }
            _ => {
                debug!("Ignoring malformed custom trait target: {}", target);
                None
            }
        }
    }
}

/// Check a token's raw attributes and properties against the validation rules
pub fn validate_token(token: &Token, rules: &RarityRules) -> bool {
    let Some(validation) = &rules.validation else {
        return true;
    };

    for (trait_type, expected) in &validation.traits {
        let Some(attr) = token.attributes.iter().find(|a| &a.trait_type == trait_type) else {
            debug!("Token {} lacks required trait {}", token.token_id, trait_type);
            return false;
        };
        if expected != VALIDATION_ANY && attr.as_text() != Some(expected.as_str()) {
            debug!(
                "Token {} trait {} does not match {}",
                token.token_id, trait_type, expected
            );
            return false;
        }
    }

    for (key, expected) in &validation.properties {
        if token.property(key).as_ref() != Some(expected) {
            debug!("Token {} property {} does not match", token.token_id, key);
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attribute;

    #[test]
    fn test_weight_precedence() {
        let rules = RarityRules::default()
            .with_weight("Shield", 0.0)
            .with_weight("Clothes", 2.0)
            .with_weight("Clothes/Robot", 3.0);

        assert_eq!(rules.weight_for("Clothes", "Robot"), 3.0);
        assert_eq!(rules.weight_for("Clothes", "Suit"), 2.0);
        assert_eq!(rules.weight_for("Shield", "Gold"), 0.0);
        assert_eq!(rules.weight_for("Eyes", "Blue"), 1.0);
        assert_eq!(RarityRules::default().weight_for("Clothes", "Robot"), 1.0);
    }

    #[test]
    fn test_custom_trait_for() {
        let rules = RarityRules::default()
            .with_custom_trait("Clothes/Robot", "Animated/Yes")
            .with_custom_trait("Clothes/Suit", "broken");

        assert_eq!(
            rules.custom_trait_for("Clothes", "Robot"),
            Some(("Animated".to_string(), "Yes".to_string()))
        );
        assert_eq!(rules.custom_trait_for("Clothes", "Suit"), None);
        assert_eq!(rules.custom_trait_for("Clothes", "Hat"), None);
    }

    #[test]
    fn test_validate_token() {
        let mut rules = RarityRules::default();
        let mut validation = ValidationRules::default();
        validation.traits.insert("Character".into(), VALIDATION_ANY.into());
        validation.traits.insert("Artist".into(), "XCOPY".into());
        rules.validation = Some(validation);

        let ok = Token::new(
            "1",
            vec![Attribute::text("Character", "Zeus"), Attribute::text("Artist", "XCOPY")],
        );
        let wrong_artist = Token::new(
            "2",
            vec![Attribute::text("Character", "Zeus"), Attribute::text("Artist", "Other")],
        );
        let missing = Token::new("3", vec![Attribute::text("Artist", "XCOPY")]);

        assert!(validate_token(&ok, &rules));
        assert!(!validate_token(&wrong_artist, &rules));
        assert!(!validate_token(&missing, &rules));
        assert!(validate_token(&missing, &RarityRules::default()));
    }

    #[test]
    fn test_validate_properties() {
        let mut rules = RarityRules::default();
        let mut validation = ValidationRules::default();
        validation
            .properties
            .insert("edition_name".into(), Value::String("Grifters".into()));
        rules.validation = Some(validation);

        let mut token = Token::new("1", vec![]);
        assert!(!validate_token(&token, &rules));
        token
            .extra
            .insert("edition_name".into(), Value::String("Grifters".into()));
        assert!(validate_token(&token, &rules));
    }

    #[test]
    fn test_rules_from_json() {
        let rules: RarityRules = serde_json::from_str(
            r#"{"additional_weight": true, "weights": {"Shield": 0}, "custom_traits": {"Clothes/Robot": "Animated/Yes"}, "outliers": "score"}"#,
        )
        .unwrap();
        assert!(rules.additional_weight);
        assert!(!rules.normalize);
        assert_eq!(rules.outliers, Some(RankKey::Score));
        assert_eq!(rules.weight_for("Shield", "x"), 0.0);
    }
}
