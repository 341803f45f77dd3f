// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Session
//
// A session owns one state directory: the canonical snapshot, its stats
// table, a cached in-memory simulation and at most one background run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::engine::Simulation;
use crate::error::{FlipError, Result};
use crate::persist;
use crate::runner::{BackgroundRunner, RunHandle, RunOutcome, RunPlan, RunStatus, RunSummary};

const STATE_FILE: &str = "current.json";

/// Files a session reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub dir: PathBuf,
    /// Full snapshot.
    pub state: PathBuf,
    /// Stats table alone.
    pub history: PathBuf,
}

impl SessionPaths {
    pub fn in_dir(dir: &Path) -> Self {
        let state = dir.join(STATE_FILE);
        Self { dir: dir.to_path_buf(), history: persist::history_path_for(&state), state }
    }
}

pub struct Session {
    config: SimulationConfig,
    paths: SessionPaths,
    cached: Option<Simulation>,
    active: Option<RunHandle>,
}

impl Session {
    /// Open (creating if needed) the state directory `dir`.
    pub fn open(dir: &Path, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(dir).map_err(|e| FlipError::io(dir, e))?;
        Ok(Self { config, paths: SessionPaths::in_dir(dir), cached: None, active: None })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// Whether a saved simulation exists on disk.
    pub fn in_progress(&self) -> bool {
        self.paths.state.exists()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// The active run, if any, for progress polling and cancellation.
    pub fn run(&self) -> Option<&RunHandle> {
        self.active.as_ref()
    }

    /// Start over with a fresh population and save it immediately.
    pub fn create(&mut self) -> Result<&mut Simulation> {
        self.ensure_idle()?;
        if self.in_progress() {
            warn!(path = %self.paths.state.display(), "overwriting saved simulation");
        }
        let mut sim = Simulation::new(&self.config)?;
        sim.save(&self.paths.state)?;
        info!(
            path = %self.paths.state.display(),
            id = %sim.descriptive_identifier(),
            "session created"
        );
        Ok(self.cached.insert(sim))
    }

    /// The cached simulation, loading the saved one on first use.
    pub fn simulation(&mut self) -> Result<&mut Simulation> {
        self.ensure_idle()?;
        if self.cached.is_none() {
            self.cached = Some(Simulation::load(&self.paths.state)?);
        }
        self.cached
            .as_mut()
            .ok_or_else(|| FlipError::NotFound { path: self.paths.state.clone() })
    }

    /// Save the cached simulation, if any.
    pub fn save(&mut self) -> Result<()> {
        self.ensure_idle()?;
        if let Some(sim) = self.cached.as_mut() {
            sim.save(&self.paths.state)?;
        }
        Ok(())
    }

    /// Cancel any run, forget the cached simulation and delete saved state.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(handle) = self.active.take() {
            handle.cancel();
            if let Err(e) = handle.join() {
                warn!(error = %e, "run ended abnormally during reset");
            }
        }
        self.cached = None;
        persist::remove_state(&self.paths.state)?;
        info!(path = %self.paths.state.display(), "session reset");
        Ok(())
    }

    /// Hand the simulation to a background run of `total` exchanges.
    pub fn start_run(&mut self, total: u64) -> Result<&RunHandle> {
        self.ensure_idle()?;
        let plan = RunPlan::from_config(total, &self.config.run)?;
        let sim = match self.cached.take() {
            Some(sim) => sim,
            None => Simulation::load(&self.paths.state)?,
        };
        let handle = BackgroundRunner::start(sim, plan, &self.paths.state)?;
        Ok(self.active.insert(handle))
    }

    /// Block until the active run stops. `None` when nothing was running.
    pub fn finish_run(&mut self) -> Result<Option<RunSummary>> {
        match self.active.take() {
            Some(handle) => handle.join().map(|outcome| Some(self.absorb(outcome))),
            None => Ok(None),
        }
    }

    /// Like [`finish_run`](Self::finish_run), reporting progress at the
    /// configured poll interval.
    pub fn wait_run<F>(&mut self, on_progress: F) -> Result<Option<RunSummary>>
    where
        F: FnMut(f64, RunStatus),
    {
        let interval: Duration = self.config.run.poll_interval();
        match self.active.take() {
            Some(handle) => handle.wait(interval, on_progress).map(|outcome| Some(self.absorb(outcome))),
            None => Ok(None),
        }
    }

    /// Re-cache a completed simulation. Cancelled and failed runs leave the
    /// last checkpoint on disk as the session's state.
    fn absorb(&mut self, outcome: RunOutcome) -> RunSummary {
        let (sim, summary) = outcome.into_parts();
        self.cached = match summary.status {
            RunStatus::Completed => Some(sim),
            _ => None,
        };
        summary
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.active.is_some() {
            return Err(FlipError::RunnerBusy { path: self.paths.state.clone() });
        }
        Ok(())
    }
}
