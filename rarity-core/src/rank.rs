//! Ranking keys and dense ranking

use serde::{Deserialize, Serialize};

use crate::{RankEntry, Token};

/// Token fields that get ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankKey {
    Score,
    Level,
    Rarity,
    RarityAdditional,
    RarityNorm,
    RarityAdditionalNorm,
}

impl RankKey {
    pub const ALL: [RankKey; 6] = [
        RankKey::Score,
        RankKey::Level,
        RankKey::Rarity,
        RankKey::RarityAdditional,
        RankKey::RarityNorm,
        RankKey::RarityAdditionalNorm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankKey::Score => "score",
            RankKey::Level => "level",
            RankKey::Rarity => "rarity",
            RankKey::RarityAdditional => "rarity_additional",
            RankKey::RarityNorm => "rarity_norm",
            RankKey::RarityAdditionalNorm => "rarity_additional_norm",
        }
    }

    /// Read this key's value off a token
    pub fn value(&self, token: &Token) -> f64 {
        match self {
            RankKey::Score => token.score,
            RankKey::Level => token.level,
            RankKey::Rarity => token.rarity,
            RankKey::RarityAdditional => token.rarity_additional,
            RankKey::RarityNorm => token.rarity_norm,
            RankKey::RarityAdditionalNorm => token.rarity_additional_norm,
        }
    }
}

impl std::fmt::Display for RankKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RankKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RankKey::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown rank key: {}", s))
    }
}

/// Round to three decimals
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Dense ranks (1, 1, 2, ...) of `values`, highest value first.
///
/// Returned entries are in the same order as `values`.
pub fn dense_rank(values: &[f64]) -> Vec<RankEntry> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    // Stable sort keeps input order among ties
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut entries = vec![RankEntry { rank: 0, top: 0.0 }; n];
    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for idx in order {
        let value = values[idx];
        // Compare by value so -0.0 and 0.0 tie
        if previous != Some(value) {
            rank += 1;
            previous = Some(value);
        }
        entries[idx] = RankEntry {
            rank,
            top: round3(rank as f64 / n as f64),
        };
    }
    entries
}

/// Rank every token under every [`RankKey`]
pub fn rank_tokens(tokens: &mut [Token]) {
    for key in RankKey::ALL {
        let values: Vec<f64> = tokens.iter().map(|t| key.value(t)).collect();
        for (token, entry) in tokens.iter_mut().zip(dense_rank(&values)) {
            token.ranks.insert(key, entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_rank_ties() {
        let entries = dense_rank(&[5.0, 9.0, 5.0, 1.0]);
        let ranks: Vec<usize> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![2, 1, 2, 3]);
        assert_eq!(entries[1].top, 0.25);
        assert_eq!(entries[0].top, 0.5);
        assert_eq!(entries[3].top, 0.75);
    }

    #[test]
    fn test_dense_rank_properties() {
        let values = [3.2, 1.0, 3.2, 7.5, 0.0, 1.0, 7.5, 2.2];
        let entries = dense_rank(&values);
        let max_rank = entries.iter().map(|e| e.rank).max().unwrap();

        // Ranks are contiguous from 1
        for r in 1..=max_rank {
            assert!(entries.iter().any(|e| e.rank == r));
        }
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                if a > b {
                    assert!(entries[i].rank < entries[j].rank);
                }
                if a == b {
                    assert_eq!(entries[i].rank, entries[j].rank);
                }
            }
        }
        for e in &entries {
            assert!(e.top > 0.0 && e.top <= 1.0);
        }
    }

    #[test]
    fn test_dense_rank_signed_zero_ties() {
        let ranks: Vec<usize> = dense_rank(&[-0.0, 2.0, 0.0])
            .iter()
            .map(|e| e.rank)
            .collect();
        assert_eq!(ranks, vec![2, 1, 2]);
    }

    #[test]
    fn test_dense_rank_empty() {
        assert!(dense_rank(&[]).is_empty());
    }

    #[test]
    fn test_rank_key_parse() {
        assert_eq!("rarity_norm".parse::<RankKey>(), Ok(RankKey::RarityNorm));
        assert!("bogus".parse::<RankKey>().is_err());
        assert_eq!(RankKey::RarityAdditionalNorm.to_string(), "rarity_additional_norm");
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(1.0 / 3.0), 0.333);
        assert_eq!(round3(2.0 / 3.0), 0.667);
    }
}
