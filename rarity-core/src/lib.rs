//! nft-rarity Core - Collection data model and rarity engine
//!
//! This crate provides the foundational primitives:
//! - Raw token attributes and their text/level/other split
//! - Tokens, trait aggregates and the collection container
//! - Rarity rules (weights, custom traits, validation)
//! - The rarity engine: aggregation, None-filling, scoring, dense ranking
//! - Quartile-based outlier values

pub mod attribute;
pub mod token;
pub mod collection;
pub mod rules;
pub mod rank;
pub mod rarity;
pub mod outlier;

pub use attribute::*;
pub use token::*;
pub use collection::*;
pub use rules::*;
pub use rank::*;
pub use rarity::*;
pub use outlier::*;

/// Sentinel value for a trait a token does not carry
pub const TRAIT_NONE_VALUE: &str = "None";

/// Synthetic trait type holding the number of text traits on a token
pub const TRAIT_COUNT_TYPE: &str = "Trait Count";

/// Raw trait values that normalize to [`TRAIT_NONE_VALUE`] (compared case-insensitively)
pub const NONE_ALIASES: &[&str] = &["", "none", "nothing"];
