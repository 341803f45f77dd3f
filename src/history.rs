// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Wealth History Cache
//
// Captures are cheap: a copy of the wealth vector. Summary statistics are
// computed lazily by `materialize`, which only ever touches captures that
// arrived since the previous call. Rows already in the table are final.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};
use crate::population::WealthGroup;
use crate::stats::{self, WealthSummary};
use crate::types::BucketSelection;

// ─── Rows ───────────────────────────────────────────────────────────────────

/// Summary statistics of one captured wealth vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowStats {
    pub total: i64,
    pub max: i64,
    pub min: i64,
    pub mean: f64,
    pub median: f64,
    /// Bucket index → percent of total wealth held by that bucket.
    #[serde(default)]
    pub buckets: BTreeMap<usize, f64>,
}

impl RowStats {
    /// Compute stats for one wealth vector, keeping only selected buckets.
    pub fn compute(wealth: &[i64], selection: &BucketSelection) -> Result<Self> {
        let mut desc = wealth.to_vec();
        desc.sort_unstable_by_key(|w| Reverse(*w));
        let summary = WealthSummary::from_sorted(&desc)?;

        let buckets = if selection.is_empty() {
            BTreeMap::new()
        } else {
            stats::ladder(&desc, stats::history_bucket_count(desc.len()))
                .into_iter()
                .filter(|b| selection.includes(b.index))
                .map(|b| (b.index, b.share_percent))
                .collect()
        };

        Ok(Self {
            total: summary.total,
            max: summary.max,
            min: summary.min,
            mean: summary.mean,
            median: summary.median,
            buckets,
        })
    }

    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Total => Some(self.total as f64),
            Column::Max => Some(self.max as f64),
            Column::Min => Some(self.min as f64),
            Column::Mean => Some(self.mean),
            Column::Median => Some(self.median),
            Column::Bucket(i) => self.buckets.get(&i).copied(),
        }
    }
}

/// One materialized history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRow {
    pub exchange_count: u64,
    /// Per-person wealth in population order at this exchange count.
    pub wealth: Vec<i64>,
    pub stats: RowStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Capture {
    exchange_count: u64,
    wealth: Vec<i64>,
}

// ─── Columns ────────────────────────────────────────────────────────────────

/// A named numeric column of the statistics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Total,
    Max,
    Min,
    Mean,
    Median,
    /// Share of wealth held by percentile bucket `i` (0 = richest).
    Bucket(usize),
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Total => f.write_str("total"),
            Self::Max => f.write_str("max"),
            Self::Min => f.write_str("min"),
            Self::Mean => f.write_str("mean"),
            Self::Median => f.write_str("median"),
            Self::Bucket(i) => write!(f, "top_{}_to_{}_percent_wealth", i, i + 1),
        }
    }
}

// ─── History ────────────────────────────────────────────────────────────────

/// Append-only statistics cache keyed by exchange count.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct History {
    rows: Vec<HistoryRow>,
    pending: Vec<Capture>,
    /// Rows ever computed by `materialize`.
    rows_computed: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures recorded so far, materialized or not.
    pub fn len(&self) -> usize {
        self.rows.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn rows_computed(&self) -> u64 {
        self.rows_computed
    }

    /// Exchange count of the most recent capture.
    pub fn last_exchange_count(&self) -> Option<u64> {
        self.pending
            .last()
            .map(|c| c.exchange_count)
            .or_else(|| self.rows.last().map(|r| r.exchange_count))
    }

    /// Capture the group's wealth vector at `exchange_count`.
    ///
    /// Counts must strictly increase across calls.
    pub fn record(&mut self, group: &dyn WealthGroup, exchange_count: u64) -> Result<()> {
        if group.is_empty() {
            return Err(FlipError::EmptyPopulation);
        }
        if let Some(last) = self.last_exchange_count() {
            if exchange_count <= last {
                return Err(FlipError::NonMonotonicHistory { last, got: exchange_count });
            }
        }
        self.pending.push(Capture { exchange_count, wealth: group.wealth_stamp() });
        Ok(())
    }

    /// Compute stats for captures not yet in the table and return the table.
    ///
    /// Work is proportional to the captures recorded since the last call;
    /// earlier rows are returned as they are, even if `selection` changed.
    pub fn materialize(&mut self, selection: &BucketSelection) -> Result<&[HistoryRow]> {
        if !self.pending.is_empty() {
            self.rows.reserve(self.pending.len());
            for capture in std::mem::take(&mut self.pending) {
                let stats = RowStats::compute(&capture.wealth, selection)?;
                self.rows.push(HistoryRow {
                    exchange_count: capture.exchange_count,
                    wealth: capture.wealth,
                    stats,
                });
                self.rows_computed += 1;
            }
        }
        Ok(&self.rows)
    }

    /// Already-materialized rows, without computing anything new.
    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    /// Materialize, then copy the stats (without wealth vectors) into a table.
    pub fn stats_table(&mut self, selection: &BucketSelection) -> Result<StatsTable> {
        let rows = self
            .materialize(selection)?
            .iter()
            .map(|r| StatsRow { exchange_count: r.exchange_count, stats: r.stats.clone() })
            .collect();
        Ok(StatsTable { rows })
    }

    /// Check the strictly increasing exchange-count invariant.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let counts = self
            .rows
            .iter()
            .map(|r| r.exchange_count)
            .chain(self.pending.iter().map(|c| c.exchange_count));
        let mut last: Option<u64> = None;
        for count in counts {
            if last.is_some_and(|l| count <= l) {
                return Err(format!("history exchange count {count} is not increasing"));
            }
            last = Some(count);
        }
        Ok(())
    }
}

// ─── StatsTable ─────────────────────────────────────────────────────────────

/// One row of the statistics table handed to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsRow {
    pub exchange_count: u64,
    pub stats: RowStats,
}

/// The statistics table keyed by exchange count, without raw wealth vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsTable {
    pub rows: Vec<StatsRow>,
}

/// Selected columns of a single row; `None` where a bucket was not stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectedRow {
    pub exchange_count: u64,
    pub values: Vec<Option<f64>>,
}

impl StatsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&StatsRow> {
        self.rows.last()
    }

    pub fn get(&self, exchange_count: u64) -> Option<&StatsRow> {
        self.rows
            .binary_search_by_key(&exchange_count, |r| r.exchange_count)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// `(exchange_count, value)` series for one column, skipping gaps.
    pub fn column(&self, column: Column) -> Vec<(u64, f64)> {
        self.rows
            .iter()
            .filter_map(|r| r.stats.value(column).map(|v| (r.exchange_count, v)))
            .collect()
    }

    /// Keep only the requested columns, in the requested order.
    pub fn project(&self, columns: &[Column]) -> Vec<ProjectedRow> {
        self.rows
            .iter()
            .map(|r| ProjectedRow {
                exchange_count: r.exchange_count,
                values: columns.iter().map(|c| r.stats.value(*c)).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::Population;

    fn population(wealth: &[i64]) -> Population {
        let mut pop = Population::new();
        for w in wealth {
            pop.add(1, *w).unwrap();
        }
        pop
    }

    #[test]
    fn test_record_and_materialize() {
        let pop = Population::with_people(10, 100).unwrap();
        let mut history = History::new();
        history.record(&pop, 0).unwrap();
        history.record(&pop, 1).unwrap();
        assert_eq!(history.pending_len(), 2);

        let rows = history.materialize(&BucketSelection::all()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stats.total, 1000);
        assert!((rows[1].stats.median - 100.0).abs() < f64::EPSILON);
        // 10 people → one bucket holding everything
        assert_eq!(rows[0].stats.buckets.len(), 1);
        assert!((rows[0].stats.buckets[&0] - 100.0).abs() < 1e-9);
        assert_eq!(history.pending_len(), 0);
    }

    #[test]
    fn test_materialize_twice_does_no_work() {
        let pop = Population::with_people(20, 5).unwrap();
        let mut history = History::new();
        for count in 1..=5 {
            history.record(&pop, count).unwrap();
        }
        let first = history.materialize(&BucketSelection::all()).unwrap().to_vec();
        let first_ptr = history.rows().as_ptr();
        assert_eq!(history.rows_computed(), 5);

        let second = history.materialize(&BucketSelection::all()).unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(history.rows_computed(), 5);
        assert_eq!(history.rows().as_ptr(), first_ptr);
    }

    #[test]
    fn test_materialize_only_processes_delta() {
        let pop = Population::with_people(20, 5).unwrap();
        let mut history = History::new();
        history.record(&pop, 1).unwrap();
        history.materialize(&BucketSelection::all()).unwrap();
        history.record(&pop, 2).unwrap();
        history.record(&pop, 3).unwrap();
        let rows = history.materialize(&BucketSelection::all()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(history.rows_computed(), 3);
    }

    #[test]
    fn test_non_monotonic_capture_rejected() {
        let pop = Population::with_people(3, 5).unwrap();
        let mut history = History::new();
        history.record(&pop, 4).unwrap();
        let err = history.record(&pop, 4).unwrap_err();
        assert!(matches!(err, FlipError::NonMonotonicHistory { last: 4, got: 4 }));
        history.materialize(&BucketSelection::none()).unwrap();
        assert!(history.record(&pop, 2).is_err());
        assert!(history.record(&pop, 5).is_ok());
    }

    #[test]
    fn test_bucket_shares_sum_to_hundred() {
        let wealth: Vec<i64> = (1..=137).map(|i| (i * 7919) % 113).collect();
        let pop = population(&wealth);
        let mut history = History::new();
        history.record(&pop, 1).unwrap();
        let rows = history.materialize(&BucketSelection::all()).unwrap();
        let buckets = &rows[0].stats.buckets;
        // 137 * 0.1 = 13.7 → 14 buckets
        assert_eq!(buckets.len(), 14);
        let sum: f64 = buckets.values().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_subset_selection() {
        let pop = Population::with_people(100, 10).unwrap();
        let mut history = History::new();
        history.record(&pop, 1).unwrap();
        let table = history.stats_table(&BucketSelection::only([0, 9])).unwrap();
        let keys: Vec<usize> = table.rows[0].stats.buckets.keys().copied().collect();
        assert_eq!(keys, vec![0, 9]);
        assert!((table.rows[0].stats.buckets[&0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_table_columns() {
        let pop = Population::with_people(10, 10).unwrap();
        let mut history = History::new();
        history.record(&pop, 2).unwrap();
        history.record(&pop, 4).unwrap();
        let table = history.stats_table(&BucketSelection::none()).unwrap();
        assert_eq!(table.column(Column::Total), vec![(2, 100.0), (4, 100.0)]);
        assert!(table.column(Column::Bucket(0)).is_empty());
        assert_eq!(table.get(4).unwrap().exchange_count, 4);
        assert!(table.get(3).is_none());
        let projected = table.project(&[Column::Max, Column::Bucket(0)]);
        assert_eq!(projected[0].values, vec![Some(10.0), None]);
        assert_eq!(Column::Bucket(3).to_string(), "top_3_to_4_percent_wealth");
    }

    #[test]
    fn test_validate_detects_disorder() {
        let pop = Population::with_people(2, 1).unwrap();
        let mut history = History::new();
        history.record(&pop, 1).unwrap();
        history.record(&pop, 2).unwrap();
        assert!(history.validate().is_ok());
        history.pending.swap(0, 1);
        assert!(history.validate().is_err());
    }
}
