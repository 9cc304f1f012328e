//! Rarity engine
//!
//! Turns raw attribute bags into per-trait-value frequencies, token scores and
//! dense ranks. The steps run in a fixed order:
//!
//! 1. Split attributes into traits, levels and others; add `Trait Count`
//! 2. Derive custom traits
//! 3. Count trait values
//! 4. Fill missing trait types with `None`
//! 5. Per-value frequency and rarity, weighting, normalization, score
//! 6. Token totals and ranks
//! 7. Optional outlier values

use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    calc_outliers, normalize_trait_value, rank_tokens, AttributeValue, Collection, Level,
    RarityRules, Token, TokenTrait, TraitKind, TraitSummary, TraitTypeAgg, TraitValueAgg,
    TRAIT_COUNT_TYPE, TRAIT_NONE_VALUE,
};

/// Rarity engine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RarityError {
    #[error("Collection {0} has already been scored; assemble a fresh collection")]
    AlreadyScored(String),
}

/// Compute rarity metrics, totals and ranks for every token of a collection.
///
/// A collection can only be scored once. Scoring an empty collection is a no-op
/// that leaves zeroed totals.
pub fn calc_rarity(collection: &mut Collection, rules: &RarityRules) -> Result<(), RarityError> {
    if collection.scored {
        return Err(RarityError::AlreadyScored(collection.name.clone()));
    }
    collection.scored = true;

    let num_tokens = collection.tokens.len();
    info!("Calculating rarity for {} ({} tokens)", collection.name, num_tokens);
    if num_tokens == 0 {
        collection.traits = TraitSummary::default();
        return Ok(());
    }

    for token in collection.tokens.iter_mut() {
        classify_attributes(token);
        derive_custom_traits(token, rules);
    }

    let mut summary = aggregate_traits(&collection.tokens);
    fill_none_traits(&mut collection.tokens, &mut summary);
    calc_trait_metrics(&mut summary, num_tokens, rules);

    for token in collection.tokens.iter_mut() {
        calc_token(token, &summary, rules);
    }
    rank_tokens(&mut collection.tokens);

    collection.outliers = rules
        .outliers
        .and_then(|key| calc_outliers(&mut collection.tokens, key));
    collection.traits = summary;

    info!(
        "Rarity done: {} trait types, {} values",
        collection.traits.num_traits, collection.traits.num_values
    );
    Ok(())
}

/// Pick the score for a trait value from the two rule toggles
pub fn select_score(metrics: &TraitValueAgg, rules: &RarityRules) -> f64 {
    match (rules.additional_weight, rules.normalize) {
        (false, false) => metrics.rarity,
        (false, true) => metrics.rarity_norm,
        (true, false) => metrics.rarity_additional,
        (true, true) => metrics.rarity_additional_norm,
    }
}

/// Split raw attributes into traits, levels and others, then append `Trait Count`.
///
/// A repeated trait type keeps its first value.
pub fn classify_attributes(token: &mut Token) {
    token.traits.clear();
    token.levels.clear();
    token.others.clear();

    let mut seen = HashSet::new();
    for attr in &token.attributes {
        match &attr.value {
            AttributeValue::Text(value) if !attr.trait_type.is_empty() => {
                if !seen.insert(attr.trait_type.clone()) {
                    debug!(
                        "Token {} repeats trait type {}",
                        token.token_id, attr.trait_type
                    );
                    continue;
                }
                token.traits.push(TokenTrait::new(
                    &attr.trait_type,
                    &normalize_trait_value(value),
                    TraitKind::Normal,
                ));
            }
            AttributeValue::Number(value) => token.levels.push(Level {
                trait_type: attr.trait_type.clone(),
                value: *value,
            }),
            _ => token.others.push(attr.clone()),
        }
    }

    token.trait_count = token.traits.len();
    if !seen.contains(TRAIT_COUNT_TYPE) {
        token.traits.push(TokenTrait::new(
            TRAIT_COUNT_TYPE,
            &token.trait_count.to_string(),
            TraitKind::TraitCount,
        ));
    }
}

/// Apply custom trait rules once over the token's current traits.
///
/// Derived traits are not matched against the rules again, and a type the token
/// already carries is never added twice.
pub fn derive_custom_traits(token: &mut Token, rules: &RarityRules) {
    if rules.custom_traits.is_empty() {
        return;
    }

    let derived: Vec<(String, String)> = token
        .traits
        .iter()
        .filter_map(|t| rules.custom_trait_for(&t.trait_type, &t.value))
        .collect();

    for (trait_type, value) in derived {
        if token.has_trait_type(&trait_type) {
            debug!(
                "Token {} already has {}, skipping custom trait",
                token.token_id, trait_type
            );
            continue;
        }
        token
            .traits
            .push(TokenTrait::new(&trait_type, &value, TraitKind::Custom));
    }
}

/// First pass: count every trait value
pub fn aggregate_traits(tokens: &[Token]) -> TraitSummary {
    let mut summary = TraitSummary::default();
    for token in tokens {
        for t in &token.traits {
            let type_agg = summary.items.entry(t.trait_type.clone()).or_default();
            type_agg.count += 1;
            type_agg.items.entry(t.value.clone()).or_default().count += 1;
        }
    }
    summary
}

/// Second pass: give every token an explicit `None` for each trait type it lacks
pub fn fill_none_traits(tokens: &mut [Token], summary: &mut TraitSummary) {
    let trait_types: Vec<String> = summary.items.keys().cloned().collect();
    let mut filled: BTreeMap<String, usize> = BTreeMap::new();

    for token in tokens.iter_mut() {
        let missing: Vec<TokenTrait> = trait_types
            .iter()
            .filter(|trait_type| !token.has_trait_type(trait_type))
            .map(|trait_type| TokenTrait::new(trait_type, TRAIT_NONE_VALUE, TraitKind::Filled))
            .collect();
        if missing.is_empty() {
            continue;
        }
        for t in &missing {
            *filled.entry(t.trait_type.clone()).or_default() += 1;
        }
        token.traits = token.traits.iter().cloned().chain(missing).collect();
    }

    for (trait_type, count) in filled {
        if let Some(type_agg) = summary.items.get_mut(&trait_type) {
            type_agg.count += count;
            type_agg.items.entry(TRAIT_NONE_VALUE.to_string()).or_default().count += count;
        }
    }
}

/// Frequencies, weights, normalization and scores for every trait value
pub fn calc_trait_metrics(summary: &mut TraitSummary, num_tokens: usize, rules: &RarityRules) {
    let mut num_values = 0;
    let mut num_traits = 0;
    for (trait_type, type_agg) in summary.items.iter_mut() {
        type_agg.num_values = type_agg.items.len();
        if trait_type != TRAIT_COUNT_TYPE || rules.trait_count {
            num_values += type_agg.num_values;
            num_traits += 1;
        }
    }
    summary.num_values = num_values;
    summary.num_traits = num_traits;
    summary.avg_num_values_per_trait = if num_traits > 0 {
        num_values as f64 / num_traits as f64
    } else {
        0.0
    };

    let avg = summary.avg_num_values_per_trait;
    for (trait_type, type_agg) in summary.items.iter_mut() {
        if type_agg.count != num_tokens {
            warn!(
                "Trait type {} counts {} of {} tokens",
                trait_type, type_agg.count, num_tokens
            );
        }
        type_agg.norm_factor = calc_norm_factor(avg, type_agg);
        let is_trait_count = trait_type == TRAIT_COUNT_TYPE;
        for (value, metrics) in type_agg.items.iter_mut() {
            metrics.freq = metrics.count as f64 / num_tokens as f64;
            metrics.rarity = 1.0 / metrics.freq;
            metrics.rarity_additional = metrics.rarity * rules.weight_for(trait_type, value);
            metrics.rarity_norm = metrics.rarity * type_agg.norm_factor;
            metrics.rarity_additional_norm = metrics.rarity_additional * type_agg.norm_factor;
            metrics.score = if is_trait_count && !rules.trait_count {
                0.0
            } else {
                select_score(metrics, rules)
            };
        }
    }
}

fn calc_norm_factor(avg: f64, type_agg: &TraitTypeAgg) -> f64 {
    if type_agg.num_values == 0 {
        0.0
    } else {
        avg / type_agg.num_values as f64
    }
}

/// Copy metrics onto a token's traits and sum them into token totals
pub fn calc_token(token: &mut Token, summary: &TraitSummary, rules: &RarityRules) {
    token.rarity = 0.0;
    token.rarity_additional = 0.0;
    token.rarity_norm = 0.0;
    token.rarity_additional_norm = 0.0;
    token.score = 0.0;

    for t in token.traits.iter_mut() {
        let Some(metrics) = summary
            .items
            .get(&t.trait_type)
            .and_then(|type_agg| type_agg.items.get(&t.value))
        else {
            continue;
        };
        t.metrics = *metrics;

        token.score += metrics.score;
        if t.is_trait_count() && !rules.trait_count {
            continue;
        }
        token.rarity += metrics.rarity;
        token.rarity_additional += metrics.rarity_additional;
        token.rarity_norm += metrics.rarity_norm;
        token.rarity_additional_norm += metrics.rarity_additional_norm;
    }

    token.level = token.levels.iter().fold(0.0, |acc, l| acc + l.value);
    token.has_rarity = token.rarity > 0.0;
}
