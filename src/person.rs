// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Person

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::PersonId;

/// A wealth-holding member of the population.
///
/// `wealth` is only ever changed by exchange settlement, which is why the
/// mutators are crate-private.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    id: PersonId,
    start_wealth: i64,
    wealth: i64,
    wins: u64,
    losses: u64,
}

impl Person {
    pub fn new(id: PersonId, start_wealth: i64) -> Self {
        Self { id, start_wealth, wealth: start_wealth, wins: 0, losses: 0 }
    }

    pub fn id(&self) -> PersonId {
        self.id
    }

    pub fn start_wealth(&self) -> i64 {
        self.start_wealth
    }

    pub fn wealth(&self) -> i64 {
        self.wealth
    }

    pub fn wins(&self) -> u64 {
        self.wins
    }

    pub fn losses(&self) -> u64 {
        self.losses
    }

    /// Settled exchanges this person took part in.
    pub fn flips(&self) -> u64 {
        self.wins + self.losses
    }

    pub fn has(&self, amount: i64) -> bool {
        self.wealth >= amount
    }

    /// Wealth after receiving `amount`, or `None` if it would overflow.
    pub fn after_credit(&self, amount: i64) -> Option<i64> {
        self.wealth.checked_add(amount)
    }

    /// Wealth after paying `amount`, or `None` if it would overflow.
    pub fn after_debit(&self, amount: i64) -> Option<i64> {
        self.wealth.checked_sub(amount)
    }

    /// Returns the new wealth; on overflow nothing changes.
    pub(crate) fn credit(&mut self, amount: i64) -> Option<i64> {
        self.wealth = self.after_credit(amount)?;
        self.wins += 1;
        Some(self.wealth)
    }

    /// Returns the new wealth; on overflow nothing changes.
    pub(crate) fn debit(&mut self, amount: i64) -> Option<i64> {
        self.wealth = self.after_debit(amount)?;
        self.losses += 1;
        Some(self.wealth)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Person {} | ${} | flips: {} ({} - {})",
            self.id, self.wealth, self.flips(), self.wins, self.losses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_person_starts_at_start_wealth() {
        let p = Person::new(7, 100);
        assert_eq!(p.wealth(), 100);
        assert_eq!(p.start_wealth(), 100);
        assert_eq!(p.flips(), 0);
        assert!(p.has(100));
        assert!(!p.has(101));
    }

    #[test]
    fn test_credit_and_debit_track_counts() {
        let mut p = Person::new(0, 10);
        p.debit(15);
        assert_eq!(p.wealth(), -5);
        p.credit(5);
        assert_eq!(p.wealth(), 0);
        assert_eq!((p.wins(), p.losses()), (1, 1));
        assert_eq!(p.start_wealth(), 10);
    }

    #[test]
    fn test_overflowing_credit_leaves_person_unchanged() {
        let mut p = Person::new(0, i64::MAX - 1);
        assert_eq!(p.credit(1), Some(i64::MAX));
        assert_eq!(p.credit(1), None);
        assert_eq!(p.wealth(), i64::MAX);
        assert_eq!(p.wins(), 1);

        let mut q = Person::new(1, i64::MIN + 3);
        assert_eq!(q.after_debit(4), None);
        assert_eq!(q.debit(4), None);
        assert_eq!(q.losses(), 0);
    }
}
