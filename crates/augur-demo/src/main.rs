//! Headless anticipation demo.
//!
//! A predictor and an authority run in lockstep over simulated links with
//! configurable latency. Scripted input edits four sample values and drives a
//! player around; the authority also advances a fifth value on its own. The
//! run ends with a comparison of what the predictor shows against ground truth.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p augur-demo -- --latency-ms 300 --log-level debug`.

mod authority;
mod error;
mod player;
mod predictor;
mod protocol;
mod script;
mod session;

use std::process::ExitCode;

use augur_anticipation::FixedStepper;
use augur_config::{CliArgs, Config, default_config_dir};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use tracing::{error, info};

use crate::error::DemoError;
use crate::protocol::ValueId;
use crate::session::Session;

/// Idle time after the script ends, so the last confirmations land.
const SETTLE_SECONDS: u64 = 1;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Resolve config directory
    let Some(config_dir) = args.config.clone().or_else(default_config_dir) else {
        eprintln!("Failed to resolve config directory, pass --config");
        return ExitCode::FAILURE;
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    augur_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), DemoError> {
    let mut session = Session::init(config)?;
    let step = 1.0 / f64::from(config.simulation.tick_rate);
    let mut stepper = FixedStepper::new(step, config.simulation.max_frame_time)?;
    // Uneven frame times, reproducible per seed.
    let mut frames = Xoshiro256StarStar::seed_from_u64(config.network.seed.rotate_left(32));
    let total = config.demo.ticks + SETTLE_SECONDS * u64::from(config.simulation.tick_rate);

    info!(
        ticks = config.demo.ticks,
        latency_ms = config.network.latency_ms,
        jitter_ms = config.network.jitter_ms,
        stale_policy = ?config.anticipation.stale_policy,
        "starting anticipation demo"
    );

    while session.ticks() < total {
        let frame_time = frames.gen_range(0.008..0.030);
        for _ in 0..stepper.advance(frame_time) {
            if session.ticks() >= total {
                break;
            }
            session.step()?;
        }
    }

    let summary = session.summary();
    for (id, (displayed, authoritative)) in ValueId::ALL.iter().zip(summary.values) {
        info!(value = ?id, displayed, authoritative, "final value");
    }
    info!(
        ticks = summary.ticks,
        value_e_error = summary.value_e_error,
        player_error = summary.player_error,
        ledger_len = summary.ledger_len,
        requests = summary.requests_sent,
        updates = summary.updates_sent,
        ignored = summary.stats.ignored,
        followed = summary.stats.followed,
        reanticipated = summary.stats.reanticipated,
        snapped = summary.stats.snapped,
        rejected = summary.stats.rejected,
        "demo finished"
    );

    session.teardown();
    info!(
        requests_applied = session.authority().requests(),
        ledger_consumers = session.predictor().inputs().consumer_count(),
        "session closed"
    );
    Ok(())
}
