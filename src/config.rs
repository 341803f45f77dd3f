// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Configuration
//
// Typed configuration mirroring the YAML layout:
//
//   population: { size: 1000, start_wealth: 100 }
//   exchange:   { bet: 1, allow_debt: false, selection: random, broke_is_out: false }
//   history:    { record_every: 1, buckets: all }
//   run:        { checkpoint_every: 1000, progress_every: 100, poll_interval_ms: 500 }
//   seed: 42
//   logging:    { level: info }
//
// Every section and field is optional and falls back to the defaults below.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::{FlipError, Result};
use crate::types::{BucketSelection, SelectionStrategy};

/// Top-level configuration for one simulation session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub population: PopulationConfig,
    pub exchange: ExchangeConfig,
    pub history: HistoryConfig,
    pub run: RunConfig,
    /// Seed of the exchange PRNG.
    pub seed: u64,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub size: i64,
    pub start_wealth: i64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self { size: 1000, start_wealth: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Wealth moved by each settled exchange.
    pub bet: i64,
    pub allow_debt: bool,
    pub selection: SelectionStrategy,
    /// Only members with positive wealth may be drawn (random selection only).
    pub broke_is_out: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            bet: 1,
            allow_debt: false,
            selection: SelectionStrategy::Random,
            broke_is_out: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Capture a history row every N exchanges.
    pub record_every: u64,
    /// Bucket share columns to keep when materializing.
    pub buckets: BucketSelection,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { record_every: 1, buckets: BucketSelection::all() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Exchanges between checkpoints; `max(total / 10, 1)` when unset.
    pub checkpoint_every: Option<u64>,
    /// Exchanges per progress update; `max(total / 100, 1)` when unset.
    pub progress_every: Option<u64>,
    pub poll_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { checkpoint_every: None, progress_every: None, poll_interval_ms: 500 }
    }
}

impl RunConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

// ─── Loading ────────────────────────────────────────────────────────────────

impl SimulationConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FlipError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.population.size < 2 {
            return Err(invalid("population.size", format!("{} (need at least 2 people)", self.population.size)));
        }
        if self.population.start_wealth < 0 {
            return Err(invalid("population.start_wealth", format!("{} (must not be negative)", self.population.start_wealth)));
        }
        if self.population.size.checked_mul(self.population.start_wealth).is_none() {
            return Err(invalid(
                "population.start_wealth",
                format!(
                    "{} people at {} exceeds the representable total wealth",
                    self.population.size, self.population.start_wealth
                ),
            ));
        }
        if self.exchange.bet <= 0 {
            return Err(invalid("exchange.bet", format!("{} (must be positive)", self.exchange.bet)));
        }
        if self.exchange.broke_is_out && self.exchange.selection == SelectionStrategy::Sequential {
            return Err(invalid(
                "exchange.broke_is_out",
                "cannot be combined with sequential selection".to_string(),
            ));
        }
        if self.history.record_every == 0 {
            return Err(invalid("history.record_every", "must be at least 1".to_string()));
        }
        if self.run.checkpoint_every == Some(0) {
            return Err(invalid("run.checkpoint_every", "must be at least 1".to_string()));
        }
        if self.run.progress_every == Some(0) {
            return Err(invalid("run.progress_every", "must be at least 1".to_string()));
        }
        if self.run.poll_interval_ms == 0 {
            return Err(invalid("run.poll_interval_ms", "must be at least 1".to_string()));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.logging.level)
            .map_err(|_| invalid("logging.level", format!("unknown level '{}'", self.logging.level)))
    }
}

fn invalid(key: &'static str, reason: String) -> FlipError {
    FlipError::InvalidConfig { key, reason }
}
