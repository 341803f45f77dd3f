// Coin Flip Runner - background run with progress, wealth report, Monte Carlo
// Seedable ChaCha8Rng, checkpointed state directory, optional JSONL stats
//
// Usage:
//   cargo run --release --bin flip                                  # 1000 people, 10k flips
//   cargo run --release --bin flip -- --config flip.yaml --flips 1000000
//   cargo run --release --bin flip -- --people 500 --bet 5 --debt   # Allow debt
//   cargo run --release --bin flip -- --selection sequential
//   cargo run --release --bin flip -- --resume                      # Continue saved run
//   cargo run --release --bin flip -- --runs 30 --seed 42           # Monte Carlo
//   cargo run --release --bin flip -- --time-series                 # Enable JSONL output

mod monte_carlo;
mod report;
mod time_series;

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use coinflip_engine::{persist, population, RunStatus, SelectionStrategy, Session, SimulationConfig, WealthGroup};
use report::*;
use time_series::TimeSeriesRecorder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Percentile boundaries of the printed wealth table.
const REPORT_BOUNDARIES: [f64; 9] = [0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 100.0];

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    config: Option<PathBuf>,
    people: Option<i64>,
    start: Option<i64>,
    bet: Option<i64>,
    debt: bool,
    selection: Option<String>,
    flips: u64,
    seed: Option<u64>,
    dir: PathBuf,
    resume: bool,
    runs: usize,
    time_series: bool,
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        config: None,
        people: None,
        start: None,
        bet: None,
        debt: false,
        selection: None,
        flips: 10_000,
        seed: None,
        dir: PathBuf::from("flip-state"),
        resume: false,
        runs: 1,
        time_series: false,
    };

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String, String> {
            i += 1;
            args.get(i).cloned().ok_or_else(|| format!("{flag} needs a value"))
        };
        match flag {
            "--config" => cli.config = Some(PathBuf::from(value()?)),
            "--people" => cli.people = Some(parse(flag, &value()?)?),
            "--start" => cli.start = Some(parse(flag, &value()?)?),
            "--bet" => cli.bet = Some(parse(flag, &value()?)?),
            "--debt" => cli.debt = true,
            "--selection" => cli.selection = Some(value()?),
            "--flips" => cli.flips = parse(flag, &value()?)?,
            "--seed" => cli.seed = Some(parse(flag, &value()?)?),
            "--dir" => cli.dir = PathBuf::from(value()?),
            "--resume" => cli.resume = true,
            "--runs" => cli.runs = parse(flag, &value()?)?,
            "--time-series" => cli.time_series = true,
            _ => eprintln!("Unknown argument: {}", flag),
        }
        i += 1;
    }

    Ok(cli)
}

fn parse<T: FromStr>(flag: &str, raw: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("invalid value for {flag}: {raw}"))
}

fn build_config(cli: &CliArgs) -> coinflip_engine::Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(people) = cli.people {
        config.population.size = people;
    }
    if let Some(start) = cli.start {
        config.population.start_wealth = start;
    }
    if let Some(bet) = cli.bet {
        config.exchange.bet = bet;
    }
    if cli.debt {
        config.exchange.allow_debt = true;
    }
    if let Some(selection) = &cli.selection {
        config.exchange.selection = SelectionStrategy::from_str(selection)?;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string()
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn Error>> {
    let cli = parse_args()?;
    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) if e.is_validation() => {
            eprintln!("  Invalid configuration: {e}");
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str())),
        )
        .with_target(true)
        .init();

    std::fs::create_dir_all(&cli.dir)?;

    if cli.runs > 1 {
        run_seeds(&cli, &config)
    } else {
        run_session(&cli, config)
    }
}

/// Single run through a session and background worker.
fn run_session(cli: &CliArgs, config: SimulationConfig) -> Result<(), Box<dyn Error>> {
    let mut session = Session::open(&cli.dir, config)?;
    if cli.resume && session.in_progress() {
        let sim = session.simulation()?;
        info!(id = %sim.descriptive_identifier(), "resuming saved simulation");
    } else {
        if cli.resume {
            warn!(dir = %cli.dir.display(), "nothing to resume, starting fresh");
        }
        session.create()?;
    }

    let sim = session.simulation()?;
    let params = sim.params();
    println!("\n  Coin Flip Runner v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  PRNG: ChaCha8Rng | People: {} | Bet: {} | Debt: {} | Selection: {} | Flips: {}\n",
        sim.population().len(),
        params.bet,
        params.allow_debt,
        params.selection,
        cli.flips,
    );

    let started = Instant::now();
    session.start_run(cli.flips)?;
    let summary = session
        .wait_run(|progress, status| {
            print!("\r  {:<10} {:>6.1}%", status.to_string(), progress * 100.0);
            let _ = std::io::stdout().flush();
        })?
        .ok_or("run handle missing")?;
    println!("\n  Finished in {:.1}s\n", started.elapsed().as_secs_f64());

    if summary.status != RunStatus::Completed {
        eprintln!(
            "  Run {}: {}",
            summary.status,
            summary.failure.as_deref().unwrap_or("no error reported")
        );
        std::process::exit(1);
    }

    let time_series = cli.time_series;
    let dir = cli.dir.clone();
    let config = session.config().clone();
    let sim = session.simulation()?;
    let identifier = sim.descriptive_identifier();

    let population = sim.population();
    let ranges = population.stats_by_percentile_ranges(Some(&REPORT_BOUNDARIES[..]))?;
    print_ranges(&ranges);

    let report = RunReport {
        timestamp: timestamp(),
        version: env!("CARGO_PKG_VERSION"),
        identifier: identifier.clone(),
        config,
        status: summary.status,
        exchanges: sim.exchange_count(),
        settled: sim.settled_count(),
        summary: population.summary()?,
        top_percent: population.stats_by_top_percent(None)?,
        ranges,
    };
    let path = dir.join(format!("{}.json", identifier));
    persist::write_json_atomic(&path, &report)?;
    println!("  Results saved to: {}", path.display());

    if time_series {
        let table = sim.stats_table()?;
        let path = dir.join("time-series").join(format!("{}.jsonl", identifier));
        let recorder = TimeSeriesRecorder::from_table(&table);
        recorder.write_jsonl(&path)?;
        println!("  Time series ({} rows) saved to: {}", recorder.len(), path.display());
    }
    println!();
    Ok(())
}

fn print_ranges(ranges: &[population::RangeStats]) {
    println!(
        "  {:<14} {:>8} {:>12} {:>10} {:>10} {:>9}",
        "Top %", "People", "Wealth", "Mean", "Max", "Share%"
    );
    println!("  {}", "-".repeat(68));
    for range in ranges {
        let label = format!("{}-{}", range.top_percent_high, range.top_percent_low);
        match &range.stats {
            Some(s) => println!(
                "  {:<14} {:>8} {:>12} {:>10.1} {:>10} {:>8.2}%",
                label, s.members, s.total, s.mean, s.max, s.percent_of_parent_wealth
            ),
            None => println!("  {:<14} {:>8}", label, 0),
        }
    }
    println!();
}

/// `--runs N`: N foreground seeds aggregated as mean ± 95% CI.
fn run_seeds(cli: &CliArgs, config: &SimulationConfig) -> Result<(), Box<dyn Error>> {
    let ts = timestamp();
    println!("\n  Coin Flip Monte Carlo v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  PRNG: ChaCha8Rng | Runs: {} | Base seed: {} | Flips/run: {}\n",
        cli.runs, config.seed, cli.flips
    );

    let report = monte_carlo::run_monte_carlo(config, cli.flips, cli.runs, config.seed, &ts)?;

    println!("  {:<24} {:>10} {:>10} {:>10} {:>10}", "Metric", "Mean", "±95%", "Min", "Max");
    println!("  {}", "-".repeat(68));
    for (name, stats) in [
        ("Top 10% wealth share", &report.top_decile_share),
        ("Top 1% wealth share", &report.top_percentile_share),
        ("Max wealth", &report.max_wealth),
        ("Broke fraction", &report.broke_fraction),
        ("Settlement rate", &report.settlement_rate),
    ] {
        println!(
            "  {:<24} {:>10.3} {:>10.3} {:>10.3} {:>10.3}",
            name, stats.mean, stats.half_width(), stats.min, stats.max
        );
    }

    let path = output_path(&cli.dir, &ts);
    persist::write_json_atomic(&path, &report)?;
    println!("\n  Results saved to: {}\n", path.display());
    Ok(())
}

fn output_path(dir: &Path, ts: &str) -> PathBuf {
    dir.join(format!("monte-carlo-{}.json", ts))
}
