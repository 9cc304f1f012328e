//! Floor prices
//!
//! The collection floor is the cheapest listed token. Trait floors give the
//! cheapest listed token per value of selected trait types. Floor history is
//! rebuilt per day from public listing events.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use rarity_core::{Collection, Token, TRAIT_NONE_VALUE};
use rarity_sources::Event;

/// A daily listing below this share of the previous floor is treated as bogus
pub const MIN_FLOOR_RATIO: f64 = 0.3;

/// Cheapest token of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorEntry {
    /// Trait type, `None` for the collection floor
    pub trait_type: Option<String>,
    pub value: Option<String>,
    /// Cheapest listing, `None` when nothing in the group is listed
    pub price: Option<f64>,
    pub token_id: Option<String>,
    /// Tokens in the group
    pub qty: usize,
    /// Share of the collection carrying the trait value
    #[serde(default)]
    pub frequency: Option<f64>,
}

/// Floor of one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorPoint {
    /// `YYYY-MM-DD`
    pub date: String,
    pub price: f64,
}

fn listing_price(token: &Token) -> Option<f64> {
    token
        .market
        .as_ref()
        .and_then(|m| m.price)
        .filter(|p| *p > 0.0)
}

fn cheapest<'a>(tokens: impl Iterator<Item = &'a Token>) -> Option<(&'a Token, f64)> {
    tokens
        .filter_map(|t| listing_price(t).map(|p| (t, p)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

fn compare_prices(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Collection floor followed by per-value floors of `trait_types`, cheapest first.
///
/// Returns nothing when no token is listed. `None` trait values get no floor.
pub fn calc_floors(collection: &Collection, trait_types: &[String]) -> Vec<FloorEntry> {
    let Some((floor_token, floor_price)) = cheapest(collection.tokens.iter()) else {
        debug!("No listed tokens in {}", collection.name);
        return Vec::new();
    };

    let mut floors = vec![FloorEntry {
        trait_type: None,
        value: None,
        price: Some(floor_price),
        token_id: Some(floor_token.token_id.clone()),
        qty: collection.num_tokens(),
        frequency: None,
    }];

    for trait_type in trait_types {
        let mut groups: BTreeMap<&str, Vec<&Token>> = BTreeMap::new();
        for token in &collection.tokens {
            if let Some(value) = token.trait_value(trait_type) {
                groups.entry(value).or_default().push(token);
            }
        }
        if groups.is_empty() {
            warn!("Floor trait type {} not found in {}", trait_type, collection.name);
        }

        for (value, tokens) in groups {
            if value == TRAIT_NONE_VALUE {
                continue;
            }
            let floor = cheapest(tokens.iter().copied());
            floors.push(FloorEntry {
                trait_type: Some(trait_type.clone()),
                value: Some(value.to_string()),
                price: floor.map(|(_, p)| p),
                token_id: floor.map(|(t, _)| t.token_id.clone()),
                qty: tokens.len(),
                frequency: collection.trait_frequency(trait_type, value),
            });
        }
    }

    floors.sort_by(|a, b| compare_prices(a.price, b.price));
    floors
}

/// Daily floor prices from listing events, oldest day first.
///
/// Only public, non-bundle listings count. Within a day the cheapest price at
/// or above [`MIN_FLOOR_RATIO`] of the previous floor wins; days without such
/// a price are left out.
pub fn floor_history(events: &[Event]) -> Vec<FloorPoint> {
    let mut days: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for event in events {
        if !event.is_public {
            continue;
        }
        if !event.is_listing || event.is_bundle {
            debug!("Ignoring {} event for floor history", event.event_type);
            continue;
        }
        let (Some(date), Some(price)) = (event.listing_short_date.as_deref(), event.listing_price)
        else {
            continue;
        };
        if price > 0.0 {
            days.entry(date).or_default().push(price);
        }
    }

    let mut history = Vec::new();
    let mut last_floor: Option<f64> = None;
    for (date, mut prices) in days {
        prices.sort_by(|a, b| a.total_cmp(b));
        let min_price = last_floor.map_or(0.0, |floor| floor * MIN_FLOOR_RATIO);
        let Some(price) = prices.into_iter().find(|p| *p >= min_price) else {
            debug!("No valid floor price on {}", date);
            continue;
        };
        last_floor = Some(price);
        history.push(FloorPoint {
            date: date.to_string(),
            price,
        });
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use rarity_core::{calc_rarity, Attribute, MarketInfo, RarityRules};

    fn listed(id: &str, hat: Option<&str>, price: Option<f64>) -> Token {
        let attributes = hat
            .map(|h| vec![Attribute::text("Hat", h)])
            .unwrap_or_default();
        let mut token = Token::new(id, [vec![Attribute::text("Eyes", "Blue")], attributes].concat());
        token.market = Some(MarketInfo {
            price,
            is_listed: price.is_some(),
            ..Default::default()
        });
        token
    }

    fn scored(tokens: Vec<Token>) -> Collection {
        let mut collection = Collection::new("Test", tokens);
        calc_rarity(&mut collection, &RarityRules::default()).unwrap();
        collection
    }

    fn listing(date: &str, price: f64) -> Event {
        Event {
            event_type: "created".into(),
            listing_price: Some(price),
            is_listing: true,
            is_public: true,
            listing_short_date: Some(date.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_calc_floors() {
        let collection = scored(vec![
            listed("1", Some("Cap"), Some(0.8)),
            listed("2", Some("Cap"), Some(0.5)),
            listed("3", Some("Crown"), None),
            listed("4", None, Some(0.3)),
        ]);
        let floors = calc_floors(&collection, &["Hat".to_string()]);

        assert_eq!(floors.len(), 3);
        assert_eq!(floors[0].trait_type, None);
        assert_eq!(floors[0].price, Some(0.3));
        assert_eq!(floors[0].token_id.as_deref(), Some("4"));
        assert_eq!(floors[0].qty, 4);

        assert_eq!(floors[1].value.as_deref(), Some("Cap"));
        assert_eq!(floors[1].price, Some(0.5));
        assert_eq!(floors[1].token_id.as_deref(), Some("2"));
        assert_eq!(floors[1].qty, 2);
        assert_eq!(floors[1].frequency, Some(0.5));

        assert_eq!(floors[2].value.as_deref(), Some("Crown"));
        assert_eq!(floors[2].price, None);
        assert_eq!(floors[2].qty, 1);
        assert_eq!(floors[2].frequency, Some(0.25));
        assert_eq!(floors[0].frequency, None);
    }

    #[test]
    fn test_no_listings_no_floors() {
        let collection = scored(vec![listed("1", Some("Cap"), None)]);
        assert!(calc_floors(&collection, &["Hat".to_string()]).is_empty());
    }

    #[test]
    fn test_floor_history() {
        let mut private = listing("2022-01-01", 0.01);
        private.is_public = false;
        let mut bundle = listing("2022-01-01", 0.02);
        bundle.is_bundle = true;

        let events = vec![
            listing("2022-01-02", 1.5),
            listing("2022-01-01", 1.0),
            listing("2022-01-01", 1.2),
            private,
            bundle,
            // Fat-finger listing, below 30% of the previous floor
            listing("2022-01-02", 0.1),
            listing("2022-01-03", 0.05),
        ];

        let history = floor_history(&events);
        assert_eq!(
            history,
            vec![
                FloorPoint { date: "2022-01-01".into(), price: 1.0 },
                FloorPoint { date: "2022-01-02".into(), price: 1.5 },
            ]
        );
    }
}
