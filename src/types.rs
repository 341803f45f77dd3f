// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Type Definitions

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlipError;

/// Stable person identifier: the person's index in the root population.
pub type PersonId = usize;

// ─── Selection Strategy ─────────────────────────────────────────────────────

/// Rule used to pick the two participants of an exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum SelectionStrategy {
    /// Two distinct members drawn uniformly per exchange.
    #[default]
    Random,
    /// Round-robin cursor advanced twice per exchange.
    Sequential,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Sequential => "sequential",
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = FlipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "sequential" => Ok(Self::Sequential),
            _ => Err(FlipError::UnknownSelectionStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for SelectionStrategy {
    type Error = FlipError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SelectionStrategy> for String {
    fn from(s: SelectionStrategy) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Bucket Selection ───────────────────────────────────────────────────────

/// Which percentile-bucket share columns a history row should carry.
///
/// Deserializes from `"all"`, `"none"` or a list of bucket indices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BucketSelection {
    Named(BucketPreset),
    Indices(BTreeSet<usize>),
}

impl Default for BucketSelection {
    fn default() -> Self {
        Self::Named(BucketPreset::All)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BucketPreset {
    All,
    None,
}

impl BucketSelection {
    pub fn all() -> Self {
        Self::Named(BucketPreset::All)
    }

    pub fn none() -> Self {
        Self::Named(BucketPreset::None)
    }

    /// Only the given bucket indices, e.g. top and bottom for a chart.
    pub fn only(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::Indices(indices.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Named(BucketPreset::None) => true,
            Self::Indices(set) => set.is_empty(),
            Self::Named(BucketPreset::All) => false,
        }
    }

    pub fn includes(&self, index: usize) -> bool {
        match self {
            Self::Named(BucketPreset::All) => true,
            Self::Named(BucketPreset::None) => false,
            Self::Indices(set) => set.contains(&index),
        }
    }
}

// ─── Advance Summary ────────────────────────────────────────────────────────

/// Outcome of one `Simulation::advance` call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AdvanceSummary {
    /// Exchanges attempted (always the requested count on success).
    pub performed: u64,
    /// Exchanges whose loser could pay (or debt was allowed).
    pub settled: u64,
}

impl AdvanceSummary {
    pub fn unsettled(&self) -> u64 {
        self.performed - self.settled
    }
}
