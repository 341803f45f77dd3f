// Coin Flip Run Report Types
// Structured output of single runs and multi-seed aggregation

use coinflip_engine::population::{RangeStats, TopPercentStats};
use coinflip_engine::runner::RunStatus;
use coinflip_engine::stats::WealthSummary;
use coinflip_engine::SimulationConfig;
use serde::Serialize;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let half_width = 1.96 * std_dev / (n as f64).sqrt();
        Self {
            mean,
            std_dev,
            ci_lower: mean - half_width,
            ci_upper: mean + half_width,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

// ─── Single Run ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub version: &'static str,
    pub identifier: String,
    pub config: SimulationConfig,
    pub status: RunStatus,
    pub exchanges: u64,
    pub settled: u64,
    pub summary: WealthSummary,
    pub top_percent: Vec<TopPercentStats>,
    pub ranges: Vec<RangeStats>,
}

// ─── Monte Carlo ────────────────────────────────────────────────────────────

/// Outcome of one foreground seed.
#[derive(Debug, Clone, Serialize)]
pub struct SeedResult {
    pub seed: u64,
    pub exchanges: u64,
    pub settled: u64,
    pub top_decile_share: f64,
    pub top_percentile_share: f64,
    pub max_wealth: i64,
    pub broke_fraction: f64,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct MonteCarloReport {
    pub timestamp: String,
    pub version: &'static str,
    pub config: SimulationConfig,
    pub n_runs: usize,
    pub exchanges_per_run: u64,
    pub top_decile_share: Stats,
    pub top_percentile_share: Stats,
    pub max_wealth: Stats,
    pub broke_fraction: Stats,
    pub settlement_rate: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<SeedResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_samples() {
        let stats = Stats::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.n, 4);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!(stats.ci_lower < stats.mean && stats.mean < stats.ci_upper);
    }

    #[test]
    fn test_stats_single_sample_has_zero_width() {
        let stats = Stats::from_samples(&[7.0]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.half_width(), 0.0);
        assert_eq!(Stats::from_samples(&[]).n, 0);
    }
}
