//! Raw token attributes
//!
//! Token metadata carries an `attributes` array of `{trait_type, value}` objects.
//! Values are either text (scored as traits), numbers (summed as levels) or
//! anything else (carried through unscored).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{NONE_ALIASES, TRAIT_NONE_VALUE};

/// Value of a raw attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// String-valued attribute, becomes a trait
    Text(String),
    /// Numeric attribute, becomes a level
    Number(f64),
    /// Anything else (booleans, objects, null)
    Other(Value),
}

impl Default for AttributeValue {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

/// A raw attribute as found in token metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub trait_type: String,
    #[serde(default)]
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
}

impl Attribute {
    /// Create a text attribute
    pub fn text(trait_type: &str, value: &str) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: AttributeValue::Text(value.to_string()),
            display_type: None,
        }
    }

    /// Create a numeric attribute
    pub fn number(trait_type: &str, value: f64) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: AttributeValue::Number(value),
            display_type: None,
        }
    }

    pub fn with_display_type(mut self, display_type: &str) -> Self {
        self.display_type = Some(display_type.to_string());
        self
    }

    /// Text value, if this attribute is a trait
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, if this attribute is a level
    pub fn as_number(&self) -> Option<f64> {
        match self.value {
            AttributeValue::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Parse an `attributes` JSON array, dropping entries that are not objects
    pub fn parse_list(value: &Value) -> Vec<Attribute> {
        value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Normalize a trait value: empty, "none" and "nothing" all become "None"
pub fn normalize_trait_value(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    if NONE_ALIASES.contains(&lowered.as_str()) {
        TRAIT_NONE_VALUE.to_string()
    } else {
        value.to_string()
    }
}
