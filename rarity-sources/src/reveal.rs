//! Reveal detection
//!
//! Collections often serve placeholder metadata until they are revealed: no
//! attributes, a shared placeholder image, or the same traits on every token.
//! Only the placeholder image can be judged from one token; the rest needs a
//! sample of the collection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use rarity_core::{Attribute, AttributeValue, Token};

/// Reveal state of one token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealStatus {
    Revealed,
    /// A single trait; compare images across tokens to decide
    MaybeRevealed,
    NotRevealed,
}

/// Reveal status from raw attributes and image
pub fn reveal_status(
    attributes: &[Attribute],
    image: Option<&str>,
    unrevealed_image: Option<&str>,
) -> RevealStatus {
    if attributes.is_empty() {
        return RevealStatus::NotRevealed;
    }
    if let (Some(placeholder), Some(image)) = (unrevealed_image, image) {
        if placeholder == image {
            return RevealStatus::NotRevealed;
        }
    }

    match text_traits(attributes).len() {
        0 => RevealStatus::NotRevealed,
        1 => RevealStatus::MaybeRevealed,
        _ => RevealStatus::Revealed,
    }
}

/// Plain text traits as `(type, value)` pairs, sorted.
///
/// Attributes with a display type are levels or stats and do not count.
fn text_traits(attributes: &[Attribute]) -> Vec<(&str, &str)> {
    let mut texts: Vec<(&str, &str)> = attributes
        .iter()
        .filter(|a| !a.trait_type.is_empty() && a.display_type.is_none())
        .filter_map(|a| match &a.value {
            AttributeValue::Text(s) => Some((a.trait_type.as_str(), s.as_str())),
            _ => None,
        })
        .collect();
    texts.sort_unstable();
    texts
}

/// Placeholder metadata of a single token: it shows the configured unrevealed image
pub fn is_placeholder(image: Option<&str>, unrevealed_image: Option<&str>) -> bool {
    unrevealed_image.is_some() && image == unrevealed_image
}

/// Reveal status of a fetched token
pub fn token_reveal_status(token: &Token, unrevealed_image: Option<&str>) -> RevealStatus {
    reveal_status(&token.attributes, token.image.as_deref(), unrevealed_image)
}

/// First revealed token among samples, if the collection looks revealed.
///
/// Several samples carrying identical traits are placeholders. Single-trait
/// tokens only count as revealed when their values or images differ.
pub fn find_revealed<'a>(samples: &'a [Token], unrevealed_image: Option<&str>) -> Option<&'a Token> {
    let mut revealed = Vec::new();
    let mut maybe = Vec::new();
    for token in samples {
        match token_reveal_status(token, unrevealed_image) {
            RevealStatus::Revealed => revealed.push(token),
            RevealStatus::MaybeRevealed => maybe.push(token),
            RevealStatus::NotRevealed => {}
        }
    }

    if let Some(&first) = revealed.first() {
        if revealed.len() == 1 || !all_same_traits(&revealed) {
            return Some(first);
        }
        debug!("{} samples share identical traits", revealed.len());
    }

    if maybe.len() > 1 {
        let images: HashSet<Option<&str>> = maybe.iter().map(|t| t.image.as_deref()).collect();
        debug!("{} single-trait samples, {} distinct images", maybe.len(), images.len());
        if images.len() > 1 || !all_same_traits(&maybe) {
            return maybe.first().copied();
        }
    }
    None
}

fn all_same_traits(tokens: &[&Token]) -> bool {
    let traits: HashSet<Vec<(&str, &str)>> =
        tokens.iter().map(|t| text_traits(&t.attributes)).collect();
    traits.len() == 1
}

/// Whether the collection looks revealed from a handful of samples
pub fn is_collection_revealed(samples: &[Token], unrevealed_image: Option<&str>) -> bool {
    find_revealed(samples, unrevealed_image).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: &str, attrs: Vec<Attribute>, image: &str) -> Token {
        Token::new(id, attrs).with_image(image)
    }

    #[test]
    fn test_reveal_status() {
        let revealed = vec![Attribute::text("Eyes", "Laser"), Attribute::text("Hat", "Cap")];
        assert_eq!(reveal_status(&revealed, Some("a.png"), None), RevealStatus::Revealed);

        let matching = vec![Attribute::text("Left Eye", "Blue"), Attribute::text("Right Eye", "Blue")];
        assert_eq!(reveal_status(&matching, Some("a.png"), None), RevealStatus::Revealed);

        let single = vec![Attribute::text("Status", "Egg")];
        assert_eq!(reveal_status(&single, Some("a.png"), None), RevealStatus::MaybeRevealed);

        assert_eq!(reveal_status(&[], Some("a.png"), None), RevealStatus::NotRevealed);
        assert_eq!(
            reveal_status(&revealed, Some("hidden.png"), Some("hidden.png")),
            RevealStatus::NotRevealed
        );

        let levels_only = vec![Attribute::number("Power", 3.0).with_display_type("number")];
        assert_eq!(reveal_status(&levels_only, None, None), RevealStatus::NotRevealed);
    }

    #[test]
    fn test_is_placeholder() {
        assert!(!is_placeholder(Some("a.png"), None));
        assert!(!is_placeholder(Some("a.png"), Some("egg.png")));
        assert!(is_placeholder(Some("egg.png"), Some("egg.png")));
        assert!(!is_placeholder(None, Some("egg.png")));
    }

    #[test]
    fn test_identical_samples_are_not_revealed() {
        let unknown = || vec![Attribute::text("Eyes", "?"), Attribute::text("Hat", "?")];
        let samples = vec![token("1", unknown(), "1.png"), token("2", unknown(), "2.png")];
        assert!(!is_collection_revealed(&samples, None));

        let matching = vec![Attribute::text("Left Eye", "Blue"), Attribute::text("Right Eye", "Blue")];
        let other = vec![Attribute::text("Left Eye", "Red"), Attribute::text("Right Eye", "Red")];
        let samples = vec![token("1", matching.clone(), "1.png"), token("2", other, "2.png")];
        assert_eq!(find_revealed(&samples, None).map(|t| t.token_id.as_str()), Some("1"));

        // One sample cannot be compared against anything
        assert!(is_collection_revealed(&[token("1", matching, "1.png")], None));
    }

    #[test]
    fn test_collection_revealed_by_images() {
        let single = || vec![Attribute::text("Status", "Egg")];

        let same_image = vec![token("1", single(), "egg.png"), token("2", single(), "egg.png")];
        assert!(!is_collection_revealed(&same_image, None));

        let distinct = vec![token("1", single(), "1.png"), token("2", single(), "2.png")];
        assert_eq!(find_revealed(&distinct, None).map(|t| t.token_id.as_str()), Some("1"));

        let hatched = vec![Attribute::text("Status", "Hatched")];
        let values = vec![token("1", single(), "egg.png"), token("2", hatched, "egg.png")];
        assert!(is_collection_revealed(&values, None));

        let mixed = vec![
            token("1", vec![], "egg.png"),
            token("2", vec![Attribute::text("Eyes", "Laser"), Attribute::text("Hat", "Cap")], "2.png"),
        ];
        assert_eq!(find_revealed(&mixed, None).map(|t| t.token_id.as_str()), Some("2"));
    }
}
