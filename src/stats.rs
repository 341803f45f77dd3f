// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Wealth Vector Statistics
//
// Pure functions over wealth vectors, shared by population views and the
// history cache so both produce identical numbers for the same input.

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};

/// Fraction of the population that determines the history bucket count.
pub const HISTORY_BUCKET_FRACTION: f64 = 0.1;

// ─── Rounding ───────────────────────────────────────────────────────────────

/// Index of the percentile cut `round(len * percent / 100)`.
///
/// Ties round half to even, so 2.5 → 2 and 3.5 → 4.
pub fn percent_cut(len: usize, percent: f64) -> usize {
    let raw = (len as f64 * percent / 100.0).round_ties_even();
    (raw.max(0.0) as usize).min(len)
}

/// Bucket count used by the history cache: `round(len * 0.1)`, at least one.
pub fn history_bucket_count(len: usize) -> usize {
    let raw = (len as f64 * HISTORY_BUCKET_FRACTION).round_ties_even() as usize;
    raw.max(1)
}

pub fn check_percent(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(FlipError::InvalidPercentile { value })
    }
}

// ─── Summary ────────────────────────────────────────────────────────────────

/// Total, extremes and central tendency of a wealth vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WealthSummary {
    pub total: i64,
    pub max: i64,
    pub min: i64,
    pub mean: f64,
    pub median: f64,
}

impl WealthSummary {
    /// Summarize an unordered wealth vector. Empty input is rejected.
    pub fn from_wealth(wealth: &[i64]) -> Result<Self> {
        let mut sorted = wealth.to_vec();
        sorted.sort_unstable();
        Self::from_sorted(&sorted)
    }

    /// Summarize a vector already sorted in either direction.
    pub fn from_sorted(sorted: &[i64]) -> Result<Self> {
        let (first, last) = match (sorted.first(), sorted.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(FlipError::EmptyPopulation),
        };
        let n = sorted.len();
        let total = sum_wealth(sorted.iter().copied());
        let median = if n % 2 == 1 {
            sorted[n / 2] as f64
        } else {
            (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
        };
        Ok(Self {
            total,
            max: first.max(last),
            min: first.min(last),
            mean: total as f64 / n as f64,
            median,
        })
    }
}

// ─── Percentile Ladder ──────────────────────────────────────────────────────

/// One contiguous slice of a descending-by-wealth ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LadderBucket {
    pub index: usize,
    pub members: usize,
    pub wealth: i64,
    /// `wealth / total * 100`; zero when the total is zero.
    pub share_percent: f64,
}

/// Split a descending wealth vector into `bucket_count` contiguous buckets.
///
/// Every bucket holds `len / bucket_count` members and the last bucket also
/// takes the remainder. The count is clamped to `[1, len]` so small groups
/// never produce empty buckets. Empty input yields no buckets.
pub fn ladder(sorted_desc: &[i64], bucket_count: usize) -> Vec<LadderBucket> {
    let len = sorted_desc.len();
    if len == 0 {
        return Vec::new();
    }
    let count = bucket_count.clamp(1, len);
    let per_bucket = len / count;
    let total = sum_wealth(sorted_desc.iter().copied());

    (0..count)
        .map(|index| {
            let start = index * per_bucket;
            let end = if index + 1 == count { len } else { start + per_bucket };
            let slice = &sorted_desc[start..end];
            let wealth = sum_wealth(slice.iter().copied());
            LadderBucket {
                index,
                members: slice.len(),
                wealth,
                share_percent: share_of(wealth, total),
            }
        })
        .collect()
}

/// Sum of wealth values, saturating at the `i64` bounds instead of panicking.
///
/// Exact whenever the true sum fits, even if a running prefix would not.
pub fn sum_wealth(values: impl IntoIterator<Item = i64>) -> i64 {
    let total: i128 = values.into_iter().map(i128::from).sum();
    i64::try_from(total).unwrap_or(if total > 0 { i64::MAX } else { i64::MIN })
}

/// `part / total * 100`, defined as zero for a zero total.
pub fn share_of(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_cut_rounds_half_to_even() {
        // 10 * 25% = 2.5 → 2, 10 * 35% = 3.5 → 4
        assert_eq!(percent_cut(10, 25.0), 2);
        assert_eq!(percent_cut(10, 35.0), 4);
        assert_eq!(percent_cut(10, 100.0), 10);
        assert_eq!(percent_cut(10, 0.0), 0);
    }

    #[test]
    fn test_history_bucket_count_minimum() {
        assert_eq!(history_bucket_count(4), 1);
        assert_eq!(history_bucket_count(0), 1);
        assert_eq!(history_bucket_count(100), 10);
        assert_eq!(history_bucket_count(1000), 100);
        // 25 * 0.1 = 2.5 → 2
        assert_eq!(history_bucket_count(25), 2);
    }

    #[test]
    fn test_summary_even_and_odd() {
        let s = WealthSummary::from_wealth(&[5, 1, 3]).unwrap();
        assert_eq!(s.total, 9);
        assert_eq!(s.max, 5);
        assert_eq!(s.min, 1);
        assert!((s.median - 3.0).abs() < f64::EPSILON);
        assert!((s.mean - 3.0).abs() < f64::EPSILON);

        let s = WealthSummary::from_wealth(&[4, -2, 10, 0]).unwrap();
        assert!((s.median - 2.0).abs() < f64::EPSILON);
        assert_eq!(s.min, -2);
    }

    #[test]
    fn test_summary_empty_rejected() {
        assert!(matches!(WealthSummary::from_wealth(&[]), Err(FlipError::EmptyPopulation)));
    }

    #[test]
    fn test_ladder_remainder_goes_to_last_bucket() {
        let desc = [50, 40, 30, 20, 10, 5, 1];
        let buckets = ladder(&desc, 3);
        let sizes: Vec<usize> = buckets.iter().map(|b| b.members).collect();
        assert_eq!(sizes, vec![2, 2, 3]);
        assert_eq!(buckets[0].wealth, 90);
        assert_eq!(buckets[2].wealth, 16);
        let sum: f64 = buckets.iter().map(|b| b.share_percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_ladder_clamps_bucket_count() {
        let desc = [3, 2, 1];
        assert_eq!(ladder(&desc, 100).len(), 3);
        assert_eq!(ladder(&desc, 0).len(), 1);
        assert!(ladder(&[], 10).is_empty());
    }

    #[test]
    fn test_ladder_zero_total() {
        let buckets = ladder(&[0, 0], 2);
        assert!(buckets.iter().all(|b| b.share_percent == 0.0));
    }

    #[test]
    fn test_sum_wealth_survives_large_prefixes() {
        assert_eq!(sum_wealth([i64::MAX, i64::MAX, -i64::MAX, -i64::MAX, 7]), 7);
        assert_eq!(sum_wealth([i64::MAX, 1]), i64::MAX);
        assert_eq!(sum_wealth([i64::MIN, -1]), i64::MIN);
        assert_eq!(sum_wealth(Vec::<i64>::new()), 0);
    }
}
