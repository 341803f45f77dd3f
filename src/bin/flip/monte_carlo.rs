// Monte Carlo Infrastructure - N foreground runs with statistical aggregation
// Run i uses seed base_seed + i; every metric is reported as mean ± 95% CI

use std::time::Instant;

use coinflip_engine::*;
use tracing::debug;

use crate::report::*;

/// Run one seed to completion in the foreground.
pub fn run_single(config: &SimulationConfig, seed: u64, exchanges: u64) -> Result<SeedResult> {
    let start = Instant::now();
    let mut config = config.clone();
    config.seed = seed;

    let mut sim = Simulation::new(&config)?;
    sim.advance(exchanges)?;

    let population = sim.population();
    let top_decile_share = top_share(population, 10.0)?;
    let top_percentile_share = top_share(population, 1.0)?;
    let summary = population.summary()?;
    let broke = population.people().iter().filter(|p| p.wealth() <= 0).count();

    let result = SeedResult {
        seed,
        exchanges: sim.exchange_count(),
        settled: sim.settled_count(),
        top_decile_share,
        top_percentile_share,
        max_wealth: summary.max,
        broke_fraction: broke as f64 / population.len() as f64,
        elapsed_ms: start.elapsed().as_millis(),
    };
    debug!(seed, top_decile_share, "seed finished");
    Ok(result)
}

/// Share of total wealth held by the richest `top_x` percent.
fn top_share(population: &Population, top_x: f64) -> Result<f64> {
    let view = population.wealthiest_percent(top_x, false)?;
    if view.is_empty() {
        return Ok(0.0);
    }
    Ok(view.stats_snapshot()?.percent_of_parent_wealth)
}

/// Run `runs` seeds starting at `base_seed` and aggregate.
pub fn run_monte_carlo(
    config: &SimulationConfig,
    exchanges: u64,
    runs: usize,
    base_seed: u64,
    timestamp: &str,
) -> Result<MonteCarloReport> {
    let mut results = Vec::with_capacity(runs);
    for i in 0..runs {
        results.push(run_single(config, base_seed + i as u64, exchanges)?);
    }

    let collect = |f: fn(&SeedResult) -> f64| -> Vec<f64> { results.iter().map(f).collect() };

    Ok(MonteCarloReport {
        timestamp: timestamp.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        config: config.clone(),
        n_runs: runs,
        exchanges_per_run: exchanges,
        top_decile_share: Stats::from_samples(&collect(|r| r.top_decile_share)),
        top_percentile_share: Stats::from_samples(&collect(|r| r.top_percentile_share)),
        max_wealth: Stats::from_samples(&collect(|r| r.max_wealth as f64)),
        broke_fraction: Stats::from_samples(&collect(|r| r.broke_fraction)),
        settlement_rate: Stats::from_samples(&collect(|r| {
            if r.exchanges == 0 { 0.0 } else { r.settled as f64 / r.exchanges as f64 }
        })),
        elapsed_ms: Stats::from_samples(&collect(|r| r.elapsed_ms as f64)),
        individual_runs: results,
    })
}
