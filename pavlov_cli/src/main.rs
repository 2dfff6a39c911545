//! pavlov-sim: command-line runner for group-line experiment files.
//!
//! Examples:
//!   pavlov-sim blocking.txt --adaptive-type lepelley --output blocking.json
//!   pavlov-sim --alpha-A=0.4 --plot-stimuli A AB --plot-phase 2 < blocking.txt
//!   RUST_LOG=pavlov=debug pavlov-sim --config run.json blocking.txt
//!
//! The result is JSON: the phase table used for titling plus, per phase, a map
//! from `"<group> - <stimulus>"` to that stimulus's trajectories.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::process;

use pavlov::experiment::{parse_experiment, phase_table, run_experiment, SimConfig};
use pavlov::prng::Prng;
use pavlov::strengths::HistorySeries;
use pavlov::Phase;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod args;
mod error;

use args::{CliArgs, Command};
use error::CliError;

#[derive(Debug, Serialize)]
struct Output {
    title: String,
    config: SimConfig,
    phases: Vec<BTreeMap<String, HistorySeries>>,
}

fn main() {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = match args::parse(std::env::args().skip(1)) {
        Ok(Command::Help) => {
            println!("{}", args::usage());
            return;
        }
        Ok(Command::Run(args)) => args,
        Err(e) => {
            eprintln!("{e}\n");
            eprintln!("{}", args::usage());
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = run(&args) {
        error!("simulation failed: {e}");
        eprintln!("error: {e}");
        process::exit(e.exit_code());
    }
}

fn run(args: &CliArgs) -> Result<(), CliError> {
    let base = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            SimConfig::from_json(&fs::read_to_string(path)?)?
        }
        None => SimConfig::default(),
    };
    let cfg = args.sim_config(base);

    let text = match &args.experiment_file {
        Some(path) if !args.reads_stdin() => fs::read_to_string(path)?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let lines = parse_experiment(&text)?;
    if lines.is_empty() {
        return Err(CliError::usage("experiment has no groups"));
    }

    let mut table: Vec<(String, Vec<Phase>)> = Vec::new();
    for line in &lines {
        if !args.filter.includes_group(&line.name) {
            info!("Skipping group {}", line.name);
            continue;
        }
        let phases = line
            .phases
            .iter()
            .map(|p| Phase::parse(p))
            .collect::<pavlov::Result<Vec<_>>>()?;
        table.push((line.name.clone(), phases));
    }
    if table.is_empty() {
        warn!("--plot-experiments matched no group");
    }

    let mut rng = match cfg.seed {
        Some(seed) => Prng::new(seed),
        None => Prng::from_entropy(),
    };

    info!(
        "Simulating {} group(s) with {} ({} trials per randomized phase)",
        table.len(),
        cfg.params.adaptive_type,
        cfg.num_trials
    );
    let histories = run_experiment(&lines, &cfg, &args.filter, &mut rng)?;
    if histories.iter().all(|phase| phase.is_empty()) {
        warn!("Filters left nothing to report");
    }

    let output = Output {
        title: phase_table(&table, args.filter.phase),
        phases: histories
            .iter()
            .map(|phase| phase.iter().map(|(k, h)| (k.clone(), h.series())).collect())
            .collect(),
        config: cfg,
    };

    let json = serde_json::to_string_pretty(&output)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Wrote {:?}", path);
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
