//! Outlier values
//!
//! The outlier value of a token is how far its score sits above the third
//! quartile, measured in interquartile ranges: `OV = (x - Q3) / IQR`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{RankKey, Token};

/// Quartiles used for the last outlier pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierStats {
    pub key: RankKey,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

/// Percentile `p` (0..=100) of sorted values, linear interpolation between ranks
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Compute outlier values for `key` and store them on the tokens.
///
/// Returns `None` (and leaves tokens untouched) when the spread is degenerate.
pub fn calc_outliers(tokens: &mut [Token], key: RankKey) -> Option<OutlierStats> {
    let mut values: Vec<f64> = tokens
        .iter()
        .map(|t| key.value(t))
        .filter(|v| v.is_finite())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let q1 = percentile(&values, 25.0)?;
    let q3 = percentile(&values, 75.0)?;
    let iqr = q3 - q1;
    if iqr <= 0.0 {
        warn!("Skipping outliers for {}: interquartile range is {}", key, iqr);
        return None;
    }
    debug!("Outliers for {}: q1={} q3={} iqr={}", key, q1, q3, iqr);

    for token in tokens.iter_mut() {
        let ov = (key.value(token) - q3) / iqr;
        token.ovs.insert(key, ov);
        if key == RankKey::Score {
            token.ov = Some(ov);
        }
    }

    Some(OutlierStats { key, q1, q3, iqr })
}
