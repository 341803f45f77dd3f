// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Exchanges and the Exchange Ledger

use serde::{Deserialize, Serialize};

use crate::conservation::ConservationLaw;
use crate::error::{FlipError, Result};
use crate::population::Population;
use crate::types::PersonId;

// ─── Exchange ───────────────────────────────────────────────────────────────

/// One pairwise wealth-transfer opportunity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    pub winner: PersonId,
    pub loser: PersonId,
    pub amount: i64,
    settled: bool,
}

impl Exchange {
    pub fn new(winner: PersonId, loser: PersonId, amount: i64) -> Self {
        Self { winner, loser, amount, settled: false }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Whether the loser can cover the bet under the given debt policy.
    pub fn is_payable(&self, population: &Population, allow_debt: bool) -> bool {
        allow_debt || population.get(self.loser).is_some_and(|p| p.has(self.amount))
    }

    /// Move `amount` from loser to winner and bump both counters.
    ///
    /// Settling twice is a programming error and leaves wealth untouched, as
    /// does a transfer that would overflow either balance.
    /// `index` only labels the error.
    pub fn settle(&mut self, index: u64, population: &mut Population) -> Result<()> {
        if self.settled {
            return Err(FlipError::DoubleSettlement { index });
        }
        let available = population.people().len();
        let (winner, loser) = population
            .pair_mut(self.winner, self.loser)
            .ok_or(FlipError::InsufficientMembers { requested: 2, available })?;

        let overflow = FlipError::WealthOverflow { index, amount: self.amount };
        if winner.after_credit(self.amount).is_none() || loser.after_debit(self.amount).is_none() {
            return Err(overflow);
        }
        let before = (winner.wealth(), loser.wealth());
        let after = match (winner.credit(self.amount), loser.debit(self.amount)) {
            (Some(won), Some(lost)) => (won, lost),
            _ => return Err(overflow),
        };
        let audit = ConservationLaw::verify_transfer(before, after);
        if !audit.balanced {
            return Err(FlipError::TransferImbalance { index, error: audit.error });
        }
        self.settled = true;
        Ok(())
    }
}

// ─── ExchangeLedger ─────────────────────────────────────────────────────────

/// Append-only log of every exchange; its length is the simulation clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExchangeLedger {
    exchanges: Vec<Exchange>,
    settled: u64,
}

impl ExchangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of exchanges so far.
    pub fn len(&self) -> u64 {
        self.exchanges.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn settled_count(&self) -> u64 {
        self.settled
    }

    pub fn get(&self, index: u64) -> Option<&Exchange> {
        usize::try_from(index).ok().and_then(|i| self.exchanges.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    /// Append an exchange, settling it first when the loser can pay.
    ///
    /// Returns whether wealth moved. An unpayable exchange is still logged.
    pub fn record(&mut self, mut exchange: Exchange, population: &mut Population, allow_debt: bool) -> Result<bool> {
        let index = self.len();
        let payable = exchange.is_payable(population, allow_debt);
        if payable {
            exchange.settle(index, population)?;
            self.settled += 1;
        }
        self.exchanges.push(exchange);
        Ok(payable)
    }

    /// Recount settled entries; used to validate a loaded snapshot.
    pub(crate) fn recount_settled(&self) -> u64 {
        self.exchanges.iter().filter(|e| e.settled).count() as u64
    }
}
