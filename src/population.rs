// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Population
//
// The root `Population` owns every `Person`. Rankings and percentile slices
// are `SubPopulation` views that borrow members and keep a read-only link to
// the group they were cut from, so relative shares can be computed without
// copying state. Holding a view freezes the population, which is exactly the
// guarantee analytics need while exchanges are not running.

use std::cmp::Reverse;
use std::fmt;

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};
use crate::person::Person;
use crate::stats::{self, LadderBucket, WealthSummary};
use crate::types::PersonId;

/// Cumulative top-X ladder used by [`WealthGroup::stats_by_top_percent`].
pub const DEFAULT_TOP_PERCENTAGES: [f64; 11] =
    [1.0, 2.0, 3.0, 5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 99.0, 100.0];

/// Default bucket count of [`WealthGroup::percentile_ladder`].
pub const DEFAULT_LADDER_BUCKETS: usize = 100;

// ─── Stats Records ──────────────────────────────────────────────────────────

/// Summary of a view relative to its ultimate parent population.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GroupStats {
    pub members: usize,
    pub total: i64,
    pub mean: f64,
    pub median: f64,
    pub min: i64,
    pub max: i64,
    pub percent_of_parent_population: f64,
    pub percent_of_parent_wealth: f64,
}

/// Stats for the cumulative top `top_percent` of a population.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TopPercentStats {
    pub top_percent: f64,
    /// `None` when the slice rounds down to zero members.
    pub stats: Option<GroupStats>,
}

/// Stats for the ranks between two top-X percentile boundaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RangeStats {
    /// Boundary closer to the top (e.g. 0 for the richest slice).
    pub top_percent_high: f64,
    /// Boundary further from the top (e.g. 1 for the richest 1%).
    pub top_percent_low: f64,
    /// `None` when the range holds no members.
    pub stats: Option<GroupStats>,
}

// ─── WealthGroup ────────────────────────────────────────────────────────────

/// Ranking and aggregation shared by the root population and its views.
pub trait WealthGroup {
    /// Members in stored order.
    fn members(&self) -> Vec<&Person>;

    /// The group this view was cut from; `None` for a root.
    fn parent_group(&self) -> Option<&dyn WealthGroup>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-person wealth in stored order.
    fn wealth_stamp(&self) -> Vec<i64> {
        self.members().iter().map(|p| p.wealth()).collect()
    }

    fn total_wealth(&self) -> i64 {
        stats::sum_wealth(self.members().iter().map(|p| p.wealth()))
    }

    fn summary(&self) -> Result<WealthSummary> {
        WealthSummary::from_wealth(&self.wealth_stamp())
    }

    /// Follows parent links to the population every view descends from.
    fn root_group(&self) -> Option<&dyn WealthGroup> {
        let mut current = self.parent_group()?;
        while let Some(next) = current.parent_group() {
            current = next;
        }
        Some(current)
    }

    /// Totals plus this group's share of the ultimate parent.
    fn stats_snapshot(&self) -> Result<GroupStats> {
        let root = self.root_group().ok_or(FlipError::NoParent { size: self.len() })?;
        let summary = self.summary()?;
        Ok(GroupStats {
            members: self.len(),
            total: summary.total,
            mean: summary.mean,
            median: summary.median,
            min: summary.min,
            max: summary.max,
            percent_of_parent_population: if root.is_empty() {
                0.0
            } else {
                self.len() as f64 / root.len() as f64 * 100.0
            },
            percent_of_parent_wealth: stats::share_of(summary.total, root.total_wealth()),
        })
    }

    /// Shares of total wealth held by `bucket_count` equal slices, richest first.
    fn percentile_ladder(&self, bucket_count: usize) -> Vec<LadderBucket> {
        let mut wealth = self.wealth_stamp();
        wealth.sort_unstable_by_key(|w| Reverse(*w));
        stats::ladder(&wealth, bucket_count)
    }

    /// All members ordered by wealth; ties keep their stored order.
    fn sorted_by_wealth(&self, ascending: bool) -> SubPopulation<'_>
    where
        Self: Sized,
    {
        SubPopulation::new(ranked(self.members(), ascending), None)
    }

    /// The `n` richest members, or the `n` poorest when `least` is set.
    fn wealthiest(&self, n: usize, least: bool) -> Result<SubPopulation<'_>>
    where
        Self: Sized,
    {
        if n > self.len() {
            return Err(FlipError::InsufficientMembers { requested: n, available: self.len() });
        }
        let mut members = ranked(self.members(), least);
        members.truncate(n);
        Ok(SubPopulation::new(members, Some(self as &dyn WealthGroup)))
    }

    /// The richest (or poorest) `round(len * top_x / 100)` members.
    fn wealthiest_percent(&self, top_x: f64, least: bool) -> Result<SubPopulation<'_>>
    where
        Self: Sized,
    {
        let top_x = stats::check_percent(top_x)?;
        self.wealthiest(stats::percent_cut(self.len(), top_x), least)
    }

    /// Members whose descending-wealth rank falls between two percentile cuts.
    ///
    /// The cuts are `round(len * p / 100)` (ties to even) for both percents;
    /// the view spans `[smaller cut, larger cut)`, so `(1, 0)` is the top 1%.
    fn wealth_range_by_percentile(&self, low_percent: f64, high_percent: f64) -> Result<SubPopulation<'_>>
    where
        Self: Sized,
    {
        let low = stats::percent_cut(self.len(), stats::check_percent(low_percent)?);
        let high = stats::percent_cut(self.len(), stats::check_percent(high_percent)?);
        let (start, end) = (low.min(high), low.max(high));
        let members = ranked(self.members(), false)
            .into_iter()
            .skip(start)
            .take(end - start)
            .collect();
        Ok(SubPopulation::new(members, Some(self as &dyn WealthGroup)))
    }

    /// Members holding strictly more than `value`, stored order preserved.
    fn with_more_than(&self, value: i64) -> SubPopulation<'_>
    where
        Self: Sized,
    {
        let members = self.members().into_iter().filter(|p| p.wealth() > value).collect();
        SubPopulation::new(members, Some(self as &dyn WealthGroup))
    }

    /// Stats for each cumulative top-X slice (defaults to [`DEFAULT_TOP_PERCENTAGES`]).
    fn stats_by_top_percent(&self, percentages: Option<&[f64]>) -> Result<Vec<TopPercentStats>>
    where
        Self: Sized,
    {
        percentages
            .unwrap_or(&DEFAULT_TOP_PERCENTAGES[..])
            .iter()
            .map(|&top_percent| -> Result<TopPercentStats> {
                let view = self.wealthiest_percent(top_percent, false)?;
                let stats = if view.is_empty() { None } else { Some(view.stats_snapshot()?) };
                Ok(TopPercentStats { top_percent, stats })
            })
            .collect()
    }

    /// Stats for each consecutive pair of boundaries (defaults to `0..=100`).
    fn stats_by_percentile_ranges(&self, boundaries: Option<&[f64]>) -> Result<Vec<RangeStats>>
    where
        Self: Sized,
    {
        let default: Vec<f64> = (0..=100).map(f64::from).collect();
        let boundaries = boundaries.unwrap_or(&default[..]);
        boundaries
            .windows(2)
            .map(|pair| -> Result<RangeStats> {
                let (high, low) = (pair[0], pair[1]);
                let view = self.wealth_range_by_percentile(low, high)?;
                let stats = if view.is_empty() { None } else { Some(view.stats_snapshot()?) };
                Ok(RangeStats { top_percent_high: high, top_percent_low: low, stats })
            })
            .collect()
    }
}

/// Stable sort by wealth, descending unless `ascending`.
fn ranked(mut members: Vec<&Person>, ascending: bool) -> Vec<&Person> {
    if ascending {
        members.sort_by_key(|p| p.wealth());
    } else {
        members.sort_by_key(|p| Reverse(p.wealth()));
    }
    members
}

// ─── Population (root) ──────────────────────────────────────────────────────

/// The owning collection of every person in a simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Population {
    people: Vec<Person>,
    /// Round-robin position for sequential selection.
    #[serde(default)]
    cursor: usize,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// A population of `n` people who all start with `start_wealth`.
    pub fn with_people(n: i64, start_wealth: i64) -> Result<Self> {
        let mut pop = Self::new();
        pop.add(n, start_wealth)?;
        Ok(pop)
    }

    /// Append `n` people with identical starting wealth.
    pub fn add(&mut self, n: i64, start_wealth: i64) -> Result<&mut Self> {
        let n = usize::try_from(n)
            .map_err(|_| FlipError::InvalidCount { what: "people to add", value: n, min: 0 })?;
        let first = self.people.len();
        self.people.extend((first..first + n).map(|id| Person::new(id, start_wealth)));
        Ok(self)
    }

    /// Append a single person and return its id.
    pub fn add_one(&mut self, start_wealth: i64) -> PersonId {
        let id = self.people.len();
        self.people.push(Person::new(id, start_wealth));
        id
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn get(&self, id: PersonId) -> Option<&Person> {
        self.people.get(id)
    }

    /// Sum of every member's starting wealth; the conserved quantity.
    pub fn start_total(&self) -> i64 {
        stats::sum_wealth(self.people.iter().map(|p| p.start_wealth()))
    }

    /// `n` distinct members, uniformly without replacement.
    pub fn pick_random<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<PersonId>> {
        if n > self.people.len() {
            return Err(FlipError::InsufficientMembers { requested: n, available: self.people.len() });
        }
        Ok(index::sample(rng, self.people.len(), n).into_vec())
    }

    /// `n` distinct members drawn only from those holding more than `floor`.
    pub fn pick_random_above<R: Rng + ?Sized>(
        &self,
        n: usize,
        floor: i64,
        rng: &mut R,
    ) -> Result<Vec<PersonId>> {
        let eligible: Vec<PersonId> =
            self.people.iter().filter(|p| p.wealth() > floor).map(|p| p.id()).collect();
        if n > eligible.len() {
            return Err(FlipError::InsufficientMembers { requested: n, available: eligible.len() });
        }
        Ok(index::sample(rng, eligible.len(), n).into_iter().map(|i| eligible[i]).collect())
    }

    /// Next member in stored order.
    ///
    /// Once every member has been returned, yields `None` unless `looping`,
    /// in which case the cycle restarts from the first member. Wealth plays
    /// no part in the order.
    pub fn next(&mut self, looping: bool) -> Option<PersonId> {
        if self.cursor >= self.people.len() {
            if !looping || self.people.is_empty() {
                return None;
            }
            self.cursor = 0;
        }
        let id = self.cursor;
        self.cursor += 1;
        Some(id)
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Mutable access to two distinct people at once.
    pub(crate) fn pair_mut(&mut self, a: PersonId, b: PersonId) -> Option<(&mut Person, &mut Person)> {
        if a == b || a >= self.people.len() || b >= self.people.len() {
            return None;
        }
        if a < b {
            let (left, right) = self.people.split_at_mut(b);
            Some((&mut left[a], &mut right[0]))
        } else {
            let (left, right) = self.people.split_at_mut(a);
            Some((&mut right[0], &mut left[b]))
        }
    }
}

impl WealthGroup for Population {
    fn members(&self) -> Vec<&Person> {
        self.people.iter().collect()
    }

    fn parent_group(&self) -> Option<&dyn WealthGroup> {
        None
    }

    fn len(&self) -> usize {
        self.people.len()
    }

    fn wealth_stamp(&self) -> Vec<i64> {
        self.people.iter().map(|p| p.wealth()).collect()
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Population of {}", self.people.len())
    }
}

// ─── SubPopulation (view) ───────────────────────────────────────────────────

/// A read-only ordered subset of another group.
pub struct SubPopulation<'a> {
    members: Vec<&'a Person>,
    parent: Option<&'a dyn WealthGroup>,
}

impl<'a> SubPopulation<'a> {
    fn new(members: Vec<&'a Person>, parent: Option<&'a dyn WealthGroup>) -> Self {
        Self { members, parent }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Person> + '_ {
        self.members.iter().copied()
    }

    pub fn ids(&self) -> Vec<PersonId> {
        self.members.iter().map(|p| p.id()).collect()
    }
}

impl WealthGroup for SubPopulation<'_> {
    fn members(&self) -> Vec<&Person> {
        self.members.clone()
    }

    fn parent_group(&self) -> Option<&dyn WealthGroup> {
        self.parent
    }

    fn len(&self) -> usize {
        self.members.len()
    }
}

impl fmt::Debug for SubPopulation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubPopulation")
            .field("members", &self.ids())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Ten people holding 10, 20, ..., 100.
    fn ladder_population() -> Population {
        let mut pop = Population::with_people(10, 0).unwrap();
        for (i, person) in pop.people.iter_mut().enumerate() {
            person.credit((i as i64 + 1) * 10);
        }
        pop
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut pop = Population::new();
        pop.add(3, 100).unwrap();
        pop.add(2, 50).unwrap();
        let ids: Vec<_> = pop.people().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(pop.total_wealth(), 400);
        assert_eq!(pop.add_one(7), 5);
    }

    #[test]
    fn test_add_negative_count_rejected() {
        let mut pop = Population::new();
        let err = pop.add(-1, 100).unwrap_err();
        assert!(matches!(err, FlipError::InvalidCount { value: -1, .. }));
        assert!(pop.is_empty());
    }

    #[test]
    fn test_pick_random_distinct() {
        let pop = Population::with_people(5, 10).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let picked = pop.pick_random(5, &mut rng).unwrap();
            let mut sorted = picked.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
        }
        assert!(matches!(
            pop.pick_random(6, &mut rng),
            Err(FlipError::InsufficientMembers { requested: 6, available: 5 })
        ));
    }

    #[test]
    fn test_pick_random_above_skips_broke() {
        let mut pop = Population::with_people(4, 0).unwrap();
        pop.people[1].credit(5);
        pop.people[3].credit(5);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut picked = pop.pick_random_above(2, 0, &mut rng).unwrap();
        picked.sort_unstable();
        assert_eq!(picked, vec![1, 3]);
        assert!(pop.pick_random_above(3, 0, &mut rng).is_err());
    }

    #[test]
    fn test_next_without_loop_exhausts() {
        let mut pop = Population::with_people(3, 1).unwrap();
        assert_eq!(pop.next(false), Some(0));
        assert_eq!(pop.next(false), Some(1));
        assert_eq!(pop.next(false), Some(2));
        assert_eq!(pop.next(false), None);
        assert_eq!(pop.next(false), None);
        assert_eq!(pop.next(true), Some(0));
    }

    #[test]
    fn test_next_loop_visits_each_once_per_cycle() {
        let mut pop = Population::with_people(4, 1).unwrap();
        let mut seen = vec![0u32; 4];
        for _ in 0..12 {
            seen[pop.next(true).unwrap()] += 1;
        }
        assert_eq!(seen, vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_next_ignores_wealth_changes() {
        let mut pop = Population::with_people(3, 10).unwrap();
        assert_eq!(pop.next(true), Some(0));
        pop.people[2].credit(1000);
        assert_eq!(pop.next(true), Some(1));
        assert_eq!(pop.next(true), Some(2));
        assert_eq!(pop.next(true), Some(0));
    }

    #[test]
    fn test_sorted_by_wealth_is_stable() {
        let mut pop = Population::with_people(4, 10).unwrap();
        pop.people[2].credit(5);
        let desc = pop.sorted_by_wealth(false);
        assert_eq!(desc.ids(), vec![2, 0, 1, 3]);
        let asc = pop.sorted_by_wealth(true);
        assert_eq!(asc.ids(), vec![0, 1, 3, 2]);
    }

    #[test]
    fn test_wealthiest_and_least() {
        let pop = ladder_population();
        assert_eq!(pop.wealthiest(3, false).unwrap().ids(), vec![9, 8, 7]);
        assert_eq!(pop.wealthiest(2, true).unwrap().ids(), vec![0, 1]);
        assert!(matches!(
            pop.wealthiest(11, false),
            Err(FlipError::InsufficientMembers { requested: 11, available: 10 })
        ));
    }

    #[test]
    fn test_stats_snapshot_relative_to_root() {
        let pop = ladder_population();
        let top = pop.wealthiest(2, false).unwrap();
        let stats = top.stats_snapshot().unwrap();
        assert_eq!(stats.total, 190);
        assert_eq!(stats.max, 100);
        assert!((stats.percent_of_parent_population - 20.0).abs() < 1e-9);
        assert!((stats.percent_of_parent_wealth - 190.0 / 550.0 * 100.0).abs() < 1e-9);

        // A view of a view still measures against the root.
        let top_one = top.wealthiest(1, false).unwrap();
        let stats = top_one.stats_snapshot().unwrap();
        assert!((stats.percent_of_parent_population - 10.0).abs() < 1e-9);
        assert!((stats.percent_of_parent_wealth - 100.0 / 550.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_snapshot_on_root_fails() {
        let pop = ladder_population();
        assert!(matches!(pop.stats_snapshot(), Err(FlipError::NoParent { size: 10 })));
    }

    #[test]
    fn test_wealth_range_by_percentile() {
        let pop = ladder_population();
        // top 0%..20% → the two richest
        let range = pop.wealth_range_by_percentile(20.0, 0.0).unwrap();
        assert_eq!(range.ids(), vec![9, 8]);
        // argument order does not matter
        let same = pop.wealth_range_by_percentile(0.0, 20.0).unwrap();
        assert_eq!(same.ids(), range.ids());
        // 10 * 25% = 2.5 → 2, 10 * 35% = 3.5 → 4
        let mid = pop.wealth_range_by_percentile(35.0, 25.0).unwrap();
        assert_eq!(mid.ids(), vec![7, 6]);
        assert!(matches!(
            pop.wealth_range_by_percentile(120.0, 0.0),
            Err(FlipError::InvalidPercentile { .. })
        ));
    }

    #[test]
    fn test_percentile_ladder_scenario() {
        let pop = ladder_population();
        assert_eq!(pop.total_wealth(), 550);
        let buckets = pop.percentile_ladder(10);
        assert_eq!(buckets.len(), 10);
        let sum: f64 = buckets.iter().map(|b| b.share_percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!((buckets[0].share_percent - 100.0 / 550.0 * 100.0).abs() < 1e-9);
        assert!((buckets[0].share_percent - 18.18).abs() < 0.01);
        // reproducible for the same wealth vector
        assert_eq!(buckets, pop.percentile_ladder(10));
    }

    #[test]
    fn test_percentile_ladder_sum_for_uneven_sizes() {
        let mut pop = Population::with_people(37, 3).unwrap();
        pop.people[5].credit(40);
        pop.people[30].debit(20);
        for count in [1, 3, 7, 10, 36, 100] {
            let sum: f64 = pop.percentile_ladder(count).iter().map(|b| b.share_percent).sum();
            assert!((sum - 100.0).abs() < 1e-9, "bucket count {count} summed to {sum}");
        }
    }

    #[test]
    fn test_with_more_than() {
        let pop = ladder_population();
        let rich = pop.with_more_than(70);
        assert_eq!(rich.ids(), vec![7, 8, 9]);
    }

    #[test]
    fn test_stats_by_top_percent_defaults() {
        let pop = ladder_population();
        let rows = pop.stats_by_top_percent(None).unwrap();
        assert_eq!(rows.len(), DEFAULT_TOP_PERCENTAGES.len());
        // 1% of 10 people rounds to zero members
        assert!(rows[0].stats.is_none());
        let everyone = rows.last().unwrap().stats.unwrap();
        assert!((everyone.percent_of_parent_wealth - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_by_percentile_ranges_cover_everyone() {
        let pop = ladder_population();
        let rows = pop.stats_by_percentile_ranges(None).unwrap();
        assert_eq!(rows.len(), 100);
        let members: usize = rows.iter().filter_map(|r| r.stats).map(|s| s.members).sum();
        assert_eq!(members, 10);
        let wealth: f64 = rows.iter().filter_map(|r| r.stats).map(|s| s.percent_of_parent_wealth).sum();
        assert!((wealth - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_pair_mut_rejects_same_person() {
        let mut pop = Population::with_people(2, 1).unwrap();
        assert!(pop.pair_mut(0, 0).is_none());
        let (a, b) = pop.pair_mut(1, 0).unwrap();
        assert_eq!((a.id(), b.id()), (1, 0));
    }
}
