// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Background Runner
//
// A run moves the simulation onto one named worker thread. The controller
// only reads the shared progress counter and status, and writes the cancel
// flag. The simulation comes back through a single-slot channel when the
// worker stops.
//
//   Idle -> Running -> { Completed | Cancelled | Failed }

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::engine::Simulation;
use crate::error::{FlipError, Result};
use crate::persist;

const WORKER_NAME: &str = "flip-runner";

// ─── RunStatus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RunStatus {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl RunStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            4 => Self::Failed,
            _ => Self::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ─── CancellationToken ──────────────────────────────────────────────────────

/// Cooperative stop flag shared between controller and worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ─── RunPlan ────────────────────────────────────────────────────────────────

/// How many exchanges to run and how often to report and checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    pub total: u64,
    pub checkpoint_every: u64,
    pub progress_every: u64,
}

impl RunPlan {
    /// Defaults: a checkpoint every tenth and a progress step every
    /// hundredth of the run, each at least one exchange.
    pub fn new(total: u64) -> Result<Self> {
        if total == 0 {
            return Err(FlipError::InvalidCount { what: "exchanges to run", value: 0, min: 1 });
        }
        Ok(Self {
            total,
            checkpoint_every: (total / 10).max(1),
            progress_every: (total / 100).max(1),
        })
    }

    /// Plan with any intervals set in `config` overriding the defaults.
    pub fn from_config(total: u64, config: &RunConfig) -> Result<Self> {
        let mut plan = Self::new(total)?;
        if let Some(every) = config.checkpoint_every {
            plan = plan.with_checkpoint_every(every)?;
        }
        if let Some(every) = config.progress_every {
            plan = plan.with_progress_every(every)?;
        }
        Ok(plan)
    }

    pub fn with_checkpoint_every(mut self, every: u64) -> Result<Self> {
        self.checkpoint_every = positive("checkpoint interval", every)?;
        Ok(self)
    }

    pub fn with_progress_every(mut self, every: u64) -> Result<Self> {
        self.progress_every = positive("progress interval", every)?;
        Ok(self)
    }
}

fn positive(what: &'static str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(FlipError::InvalidCount { what, value: 0, min: 1 });
    }
    Ok(value)
}

// ─── Outcome ────────────────────────────────────────────────────────────────

/// Everything the worker hands back when it stops.
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub simulation: Simulation,
    pub exchanges_done: u64,
    pub error: Option<FlipError>,
}

/// The outcome without the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub exchanges_done: u64,
    pub failure: Option<String>,
}

impl RunOutcome {
    pub fn into_parts(self) -> (Simulation, RunSummary) {
        let summary = RunSummary {
            status: self.status,
            exchanges_done: self.exchanges_done,
            failure: self.error.map(|e| e.to_string()),
        };
        (self.simulation, summary)
    }
}

// ─── Shared state ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct RunShared {
    status: AtomicU8,
    done: AtomicU64,
    total: u64,
    cancel: CancellationToken,
    failure: Mutex<Option<String>>,
}

impl RunShared {
    fn set_status(&self, status: RunStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_failure(&self, message: String) {
        if let Ok(mut slot) = self.failure.lock() {
            *slot = Some(message);
        }
    }
}

// ─── BackgroundRunner ───────────────────────────────────────────────────────

pub struct BackgroundRunner;

impl BackgroundRunner {
    /// Move `simulation` onto a worker thread and run `plan` against it.
    ///
    /// Checkpoints and the final state replace `state_path` atomically.
    pub fn start(simulation: Simulation, plan: RunPlan, state_path: &Path) -> Result<RunHandle> {
        let shared = Arc::new(RunShared {
            status: AtomicU8::new(RunStatus::Idle as u8),
            done: AtomicU64::new(0),
            total: plan.total,
            cancel: CancellationToken::new(),
            failure: Mutex::new(None),
        });
        let (tx, rx) = bounded::<RunOutcome>(1);

        let worker = Worker {
            simulation,
            plan,
            path: state_path.to_path_buf(),
            shared: Arc::clone(&shared),
        };
        shared.set_status(RunStatus::Running);
        let thread = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker.run(tx))
            .map_err(|e| FlipError::io(state_path, e))?;

        Ok(RunHandle {
            shared,
            outcome: rx,
            thread: Some(thread),
            path: state_path.to_path_buf(),
        })
    }
}

struct Worker {
    simulation: Simulation,
    plan: RunPlan,
    path: PathBuf,
    shared: Arc<RunShared>,
}

impl Worker {
    fn run(self, tx: Sender<RunOutcome>) {
        let Worker { mut simulation, plan, path, shared } = self;
        info!(
            path = %path.display(),
            total = plan.total,
            checkpoint_every = plan.checkpoint_every,
            progress_every = plan.progress_every,
            start_exchange = simulation.exchange_count(),
            "run started"
        );

        let mut done = 0u64;
        let mut since_checkpoint = 0u64;
        let mut result: Result<RunStatus> = Ok(RunStatus::Completed);

        while done < plan.total {
            if shared.cancel.is_cancelled() {
                if let Err(e) = persist::remove_temp(&path) {
                    warn!(error = %e, "could not remove in-progress file");
                }
                info!(done, total = plan.total, "run cancelled");
                result = Ok(RunStatus::Cancelled);
                break;
            }

            let step = plan.progress_every.min(plan.total - done);
            if let Err(e) = simulation.advance(step) {
                result = Err(e);
                break;
            }
            done += step;
            since_checkpoint += step;
            shared.done.store(done, Ordering::Release);

            if since_checkpoint >= plan.checkpoint_every && done < plan.total {
                if let Err(e) = simulation.save(&path) {
                    result = Err(e);
                    break;
                }
                since_checkpoint = 0;
                info!(done, total = plan.total, "checkpoint written");
            }
        }

        if matches!(result, Ok(RunStatus::Completed)) {
            result = simulation.save(&path).map(|()| RunStatus::Completed);
        }

        let (status, error) = match result {
            Ok(status) => (status, None),
            Err(e) => {
                warn!(done, error = %e, "run failed");
                shared.set_failure(e.to_string());
                (RunStatus::Failed, Some(e))
            }
        };
        if status == RunStatus::Completed {
            info!(
                exchanges = simulation.exchange_count(),
                settled = simulation.settled_count(),
                "run completed"
            );
        }

        shared.set_status(status);
        let _ = tx.send(RunOutcome { status, simulation, exchanges_done: done, error });
    }
}

// ─── RunHandle ──────────────────────────────────────────────────────────────

/// Controller side of an active run.
pub struct RunHandle {
    shared: Arc<RunShared>,
    outcome: Receiver<RunOutcome>,
    thread: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl RunHandle {
    /// Fraction of the planned exchanges done, in `[0, 1]`. Never decreases.
    pub fn poll_progress(&self) -> f64 {
        if self.shared.total == 0 {
            return 1.0;
        }
        (self.exchanges_done() as f64 / self.shared.total as f64).min(1.0)
    }

    pub fn exchanges_done(&self) -> u64 {
        self.shared.done.load(Ordering::Acquire)
    }

    pub fn status(&self) -> RunStatus {
        self.shared.status()
    }

    /// Error text once the run has failed.
    pub fn failure(&self) -> Option<String> {
        self.shared.failure.lock().ok().and_then(|slot| slot.clone())
    }

    /// Ask the worker to stop before its next advance.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub fn state_path(&self) -> &Path {
        &self.path
    }

    /// Poll every `poll_interval`, reporting progress until the worker stops.
    pub fn wait<F>(mut self, poll_interval: Duration, mut on_progress: F) -> Result<RunOutcome>
    where
        F: FnMut(f64, RunStatus),
    {
        loop {
            match self.outcome.recv_timeout(poll_interval) {
                Ok(outcome) => {
                    on_progress(self.poll_progress(), outcome.status);
                    self.reap();
                    return Ok(outcome);
                }
                Err(RecvTimeoutError::Timeout) => on_progress(self.poll_progress(), self.status()),
                Err(RecvTimeoutError::Disconnected) => {
                    self.reap();
                    return Err(FlipError::WorkerLost);
                }
            }
        }
    }

    /// Block until the worker stops and take back the simulation.
    pub fn join(mut self) -> Result<RunOutcome> {
        let outcome = self.outcome.recv().map_err(|_| FlipError::WorkerLost);
        self.reap();
        outcome
    }

    fn reap(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                self.shared.set_status(RunStatus::Failed);
                self.shared.set_failure("worker thread panicked".to_string());
            }
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("path", &self.path)
            .field("status", &self.status())
            .field("done", &self.exchanges_done())
            .field("total", &self.shared.total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let plan = RunPlan::new(1000).unwrap();
        assert_eq!(plan.checkpoint_every, 100);
        assert_eq!(plan.progress_every, 10);

        let small = RunPlan::new(5).unwrap();
        assert_eq!(small.checkpoint_every, 1);
        assert_eq!(small.progress_every, 1);
    }

    #[test]
    fn test_plan_rejects_zero() {
        assert!(matches!(RunPlan::new(0), Err(FlipError::InvalidCount { .. })));
        let plan = RunPlan::new(10).unwrap();
        assert!(plan.with_checkpoint_every(0).is_err());
        assert!(plan.with_progress_every(0).is_err());
    }

    #[test]
    fn test_plan_from_config_overrides() {
        let config = RunConfig { checkpoint_every: Some(7), progress_every: None, poll_interval_ms: 10 };
        let plan = RunPlan::from_config(1000, &config).unwrap();
        assert_eq!(plan.checkpoint_every, 7);
        assert_eq!(plan.progress_every, 10);
    }

    #[test]
    fn test_status_round_trips_through_atomic() {
        for status in [
            RunStatus::Idle,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Cancelled,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::from_u8(status as u8), status);
        }
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
