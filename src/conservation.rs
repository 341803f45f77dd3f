// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Conservation Logic
//
// Every exchange is zero-sum, so the population's total wealth must equal
// the sum of starting wealth at all times. Wealth is integral, which makes
// the check exact: there is no tolerance band.

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};

// ---------------------------------------------------------------------------
// Conservation result
// ---------------------------------------------------------------------------

/// Outcome of a single conservation check.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConservationResult {
    pub balanced: bool,
    /// Signed difference `actual - expected`.
    pub error: i64,
}

// ---------------------------------------------------------------------------
// Conservation law
// ---------------------------------------------------------------------------

/// Tracks the conserved wealth total and how many audits have run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConservationLaw {
    /// Sum of every person's starting wealth.
    pub expected_total: i64,
    /// Audits performed so far.
    pub checks: u64,
    /// Audits that found an imbalance.
    pub violations: u64,
}

impl ConservationLaw {
    pub fn new(expected_total: i64) -> Self {
        Self { expected_total, checks: 0, violations: 0 }
    }

    /// Compare the population total against the conserved amount.
    pub fn verify_total(&mut self, actual: i64) -> ConservationResult {
        self.checks += 1;
        let error = actual.saturating_sub(self.expected_total);
        let balanced = actual == self.expected_total;
        if !balanced {
            self.violations += 1;
        }
        ConservationResult { balanced, error }
    }

    /// Like [`verify_total`](Self::verify_total) but as an error.
    pub fn enforce_total(&mut self, actual: i64) -> Result<()> {
        if self.verify_total(actual).balanced {
            Ok(())
        } else {
            Err(FlipError::ConservationViolated { expected: self.expected_total, actual })
        }
    }

    /// Verify one settled pair: `winner + loser` must be unchanged.
    pub fn verify_transfer(before: (i64, i64), after: (i64, i64)) -> ConservationResult {
        let error = (i128::from(after.0) - i128::from(before.0)) + (i128::from(after.1) - i128::from(before.1));
        let clamped = i64::try_from(error).unwrap_or(if error > 0 { i64::MAX } else { i64::MIN });
        ConservationResult { balanced: error == 0, error: clamped }
    }

    /// Raise the conserved total when people are added mid-run.
    pub fn admit(&mut self, start_wealth: i64) {
        self.expected_total = self.expected_total.saturating_add(start_wealth);
    }
}

impl Default for ConservationLaw {
    fn default() -> Self {
        Self::new(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
