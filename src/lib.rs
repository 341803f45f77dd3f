// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite
//
// Repeated pairwise coin-flip exchanges inside a fixed population, with an
// incremental wealth-distribution history and a cancellable background
// runner that checkpoints to disk.

pub mod types;
pub mod error;
pub mod stats;
pub mod person;
pub mod population;
pub mod ledger;
pub mod conservation;
pub mod history;
pub mod persist;
pub mod config;
pub mod engine;
pub mod runner;
pub mod session;

pub use config::SimulationConfig;
pub use engine::{Simulation, SimulationParams};
pub use error::{FlipError, Result};
pub use history::{Column, History, StatsTable};
pub use population::{Population, SubPopulation, WealthGroup};
pub use runner::{BackgroundRunner, CancellationToken, RunHandle, RunOutcome, RunPlan, RunStatus};
pub use session::{Session, SessionPaths};
pub use types::*;
