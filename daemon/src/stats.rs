//! High/average/low/median reduction over CPU samples

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsResult {
    pub high: f64,
    pub average: f64,
    pub low: f64,
    pub median: f64,
}

impl StatsResult {
    /// Stats of a single observation.
    pub fn single(value: f64) -> Self {
        Self {
            high: value,
            average: value,
            low: value,
            median: value,
        }
    }
}

/// Reduce `values` to their summary statistics. `None` for an empty slice.
///
/// The median of an even-length input is the mean of the two middle values.
pub fn reduce(values: &[f64]) -> Option<StatsResult> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let low = sorted[0];
    let high = sorted[n - 1];
    // Summing in sorted order keeps the result independent of input order.
    // Rounding can push the mean a hair outside [low, high].
    let average = (sorted.iter().sum::<f64>() / n as f64).clamp(low, high);
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    Some(StatsResult {
        high,
        average,
        low,
        median,
    })
}
