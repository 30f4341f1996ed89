//! Headless scenario runner for the strata position engine

mod config;
mod executor;
mod physics;
mod scenario;

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;

use config::RunnerConfig;
use executor::ScenarioExecutor;
use scenario::ScenarioDefinition;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario files (RON) to run
    #[arg(required = true)]
    scenarios: Vec<PathBuf>,

    /// Configuration file name, extension optional
    #[arg(long, default_value = "strata")]
    config: String,

    /// Override the number of ticks for every scenario
    #[arg(long)]
    ticks: Option<u64>,

    /// Log every position event
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut config = RunnerConfig::load(&args.config)?;
    if let Some(ticks) = args.ticks {
        config.runner.ticks = ticks;
    }
    log::debug!("Configuration: {:?}", config);

    let executor = ScenarioExecutor::new(config.engine.clone(), config.runner.clone());
    let mut failed = 0;
    for path in &args.scenarios {
        let mut scenario = ScenarioDefinition::from_file(path)?;
        if args.ticks.is_some() {
            scenario.ticks = args.ticks;
        }
        let report = executor
            .execute(&scenario)
            .with_context(|| format!("Scenario {} aborted", path.display()))?;

        println!("{}", report.summary());
        for failure in &report.failures {
            println!("  - {}", failure);
        }
        if !report.passed() {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, args.scenarios.len());
    }
    Ok(())
}
