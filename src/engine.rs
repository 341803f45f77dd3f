// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Simulation Engine
//
// One `advance` step: draw two participants, flip for the winner, settle
// against the population, append to the ledger, capture history. The total
// wealth is audited once per `advance` call.

use std::fs;
use std::io;
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::conservation::ConservationLaw;
use crate::error::{FlipError, Result};
use crate::history::{History, StatsTable};
use crate::ledger::{Exchange, ExchangeLedger};
use crate::persist;
use crate::stats;
use crate::population::{Population, WealthGroup};
use crate::types::{AdvanceSummary, BucketSelection, PersonId, SelectionStrategy};

// ─── Parameters ─────────────────────────────────────────────────────────────

/// The fixed rules of one simulation, persisted with its state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationParams {
    pub start_wealth: i64,
    pub bet: i64,
    pub allow_debt: bool,
    pub selection: SelectionStrategy,
    pub broke_is_out: bool,
    pub record_every: u64,
    pub buckets: BucketSelection,
    pub seed: u64,
}

impl SimulationParams {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            start_wealth: config.population.start_wealth,
            bet: config.exchange.bet,
            allow_debt: config.exchange.allow_debt,
            selection: config.exchange.selection,
            broke_is_out: config.exchange.broke_is_out,
            record_every: config.history.record_every,
            buckets: config.history.buckets.clone(),
            seed: config.seed,
        }
    }
}

impl SimulationParams {
    /// Reject rule combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.bet <= 0 {
            return Err(FlipError::InvalidCount { what: "bet", value: self.bet, min: 1 });
        }
        if self.record_every == 0 {
            return Err(FlipError::InvalidCount { what: "record interval", value: 0, min: 1 });
        }
        if self.broke_is_out && self.selection == SelectionStrategy::Sequential {
            return Err(FlipError::InvalidConfig {
                key: "exchange.broke_is_out",
                reason: "cannot be combined with sequential selection".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

// ─── Simulation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    params: SimulationParams,
    population: Population,
    ledger: ExchangeLedger,
    history: History,
    rng: ChaCha8Rng,
    conservation: ConservationLaw,
}

impl Simulation {
    /// Fresh simulation: `population.size` people at `population.start_wealth`.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let population = Population::with_people(config.population.size, config.population.start_wealth)?;
        Self::with_population(SimulationParams::from_config(config), population)
    }

    /// Simulation over an existing population; its current wealth becomes the
    /// first history row.
    pub fn with_population(params: SimulationParams, population: Population) -> Result<Self> {
        params.validate()?;
        let mut history = History::new();
        history.record(&population, 0)?;

        info!(
            people = population.len(),
            bet = params.bet,
            allow_debt = params.allow_debt,
            selection = %params.selection,
            seed = params.seed,
            "simulation created"
        );

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            conservation: ConservationLaw::new(population.total_wealth()),
            params,
            population,
            ledger: ExchangeLedger::new(),
            history,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn ledger(&self) -> &ExchangeLedger {
        &self.ledger
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn conservation(&self) -> &ConservationLaw {
        &self.conservation
    }

    /// Exchanges performed so far; the simulation clock.
    pub fn exchange_count(&self) -> u64 {
        self.ledger.len()
    }

    pub fn settled_count(&self) -> u64 {
        self.ledger.settled_count()
    }

    /// Deterministic label of this run, usable as a cache key.
    pub fn descriptive_identifier(&self) -> String {
        format!(
            "people_{}_start_{}_bet_{}_debt_{}_flips_{}",
            self.population.len(),
            self.params.start_wealth,
            self.params.bet,
            self.params.allow_debt,
            self.exchange_count()
        )
    }

    /// Materialize pending history and return the stats table.
    pub fn stats_table(&mut self) -> Result<StatsTable> {
        self.history.stats_table(&self.params.buckets)
    }

    /// Grow the population mid-run; the conserved total grows with it.
    pub fn add_people(&mut self, n: i64, start_wealth: i64) -> Result<()> {
        let before = self.population.len();
        self.population.add(n, start_wealth)?;
        let added = stats::sum_wealth(self.population.people()[before..].iter().map(|p| p.start_wealth()));
        self.conservation.admit(added);
        Ok(())
    }

    // ─── Advancing ──────────────────────────────────────────────────────────

    /// Perform `n` exchanges in order.
    pub fn advance(&mut self, n: u64) -> Result<AdvanceSummary> {
        if n == 0 {
            return Ok(AdvanceSummary::default());
        }
        if self.population.len() < 2 {
            return Err(FlipError::InsufficientMembers { requested: 2, available: self.population.len() });
        }

        let mut settled = 0;
        for _ in 0..n {
            if self.flip_once()? {
                settled += 1;
            }
        }

        self.conservation.enforce_total(self.population.total_wealth())?;
        debug!(
            performed = n,
            settled,
            exchange_count = self.exchange_count(),
            "advanced"
        );
        Ok(AdvanceSummary { performed: n, settled })
    }

    fn flip_once(&mut self) -> Result<bool> {
        let (a, b) = self.draw_pair()?;
        let (winner, loser) = if self.rng.gen_bool(0.5) { (a, b) } else { (b, a) };
        let exchange = Exchange::new(winner, loser, self.params.bet);
        let moved = self.ledger.record(exchange, &mut self.population, self.params.allow_debt)?;

        let count = self.ledger.len();
        if count % self.params.record_every == 0 {
            self.history.record(&self.population, count)?;
        }
        Ok(moved)
    }

    fn draw_pair(&mut self) -> Result<(PersonId, PersonId)> {
        let ids = match self.params.selection {
            SelectionStrategy::Random if self.params.broke_is_out => {
                self.population.pick_random_above(2, 0, &mut self.rng)?
            }
            SelectionStrategy::Random => self.population.pick_random(2, &mut self.rng)?,
            SelectionStrategy::Sequential => {
                let available = self.population.len();
                match (self.population.next(true), self.population.next(true)) {
                    (Some(a), Some(b)) => vec![a, b],
                    _ => return Err(FlipError::InsufficientMembers { requested: 2, available }),
                }
            }
        };
        match ids[..] {
            [a, b] => Ok((a, b)),
            _ => Err(FlipError::InsufficientMembers { requested: 2, available: ids.len() }),
        }
    }

    // ─── Persistence ────────────────────────────────────────────────────────

    /// Write the full snapshot to `path` and the stats table beside it.
    ///
    /// Both files are replaced atomically.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let table = self.stats_table()?;
        persist::write_json_atomic(path, self)?;
        persist::write_json_atomic(&persist::history_path_for(path), &table)?;
        info!(
            path = %path.display(),
            exchanges = self.exchange_count(),
            rows = table.len(),
            "simulation saved"
        );
        Ok(())
    }

    /// Load a snapshot written by [`save`](Self::save).
    ///
    /// A file that cannot be decoded or fails validation is deleted.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FlipError::NotFound { path: path.to_path_buf() })
            }
            Err(e) => return Err(FlipError::io(path, e)),
        };

        let decoded = serde_json::from_slice::<Self>(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|sim| sim.validate().map(|()| sim));

        match decoded {
            Ok(sim) => {
                info!(path = %path.display(), exchanges = sim.exchange_count(), "simulation loaded");
                Ok(sim)
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "deleting corrupt state file");
                persist::remove_if_exists(path)?;
                Err(FlipError::CorruptState { path: path.to_path_buf(), reason })
            }
        }
    }

    /// Structural checks on a decoded snapshot.
    fn validate(&self) -> std::result::Result<(), String> {
        for (index, person) in self.population.people().iter().enumerate() {
            if person.id() != index {
                return Err(format!("person at position {index} has id {}", person.id()));
            }
        }
        if self.population.cursor() > self.population.len() {
            return Err(format!(
                "selection cursor {} beyond population of {}",
                self.population.cursor(),
                self.population.len()
            ));
        }
        if self.ledger.recount_settled() != self.ledger.settled_count() {
            return Err(format!(
                "ledger claims {} settled exchanges but holds {}",
                self.ledger.settled_count(),
                self.ledger.recount_settled()
            ));
        }
        if let Some(bad) = self.ledger.iter().find(|e| {
            e.winner == e.loser || self.population.get(e.winner).is_none() || self.population.get(e.loser).is_none()
        }) {
            return Err(format!("exchange between {} and {} names unknown people", bad.winner, bad.loser));
        }
        let flips: u64 = self.population.people().iter().map(|p| p.flips()).sum();
        if flips != 2 * self.ledger.settled_count() {
            return Err(format!(
                "people record {flips} flips for {} settled exchanges",
                self.ledger.settled_count()
            ));
        }
        let total = self.population.total_wealth();
        if total != self.conservation.expected_total {
            return Err(format!(
                "total wealth {total} differs from conserved total {}",
                self.conservation.expected_total
            ));
        }
        self.history.validate()?;
        if self.history.last_exchange_count().is_some_and(|c| c > self.exchange_count()) {
            return Err(format!(
                "history runs past the ledger's {} exchanges",
                self.exchange_count()
            ));
        }
        self.params.validate().map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
