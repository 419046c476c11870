//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Command-line arguments for the headless anticipation demo.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "augur", about = "Client-side anticipation and reconciliation demo")]
pub struct CliArgs {
    /// Simulation steps per second.
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Number of simulation steps to run.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// One-way latency in milliseconds.
    #[arg(long)]
    pub latency_ms: Option<u32>,

    /// Latency jitter in milliseconds.
    #[arg(long)]
    pub jitter_ms: Option<u32>,

    /// RNG seed for the simulated network and the authority.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Smoothing duration for scalar corrections, in seconds.
    #[arg(long)]
    pub smooth_time: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(rate) = args.tick_rate {
            self.simulation.tick_rate = rate;
        }
        if let Some(ticks) = args.ticks {
            self.demo.ticks = ticks;
        }
        if let Some(latency) = args.latency_ms {
            self.network.latency_ms = latency;
        }
        if let Some(jitter) = args.jitter_ms {
            self.network.jitter_ms = jitter;
        }
        if let Some(seed) = args.seed {
            self.network.seed = seed;
        }
        if let Some(smooth) = args.smooth_time {
            self.anticipation.smooth_time = smooth;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            latency_ms: Some(80),
            seed: Some(9),
            log_level: Some("trace".to_string()),
            ..CliArgs::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.latency_ms, 80);
        assert_eq!(config.network.seed, 9);
        assert_eq!(config.debug.log_level, "trace");
        // Non-overridden fields retain defaults
        assert_eq!(config.network.jitter_ms, 25);
        assert_eq!(config.simulation.tick_rate, 60);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from(["augur", "--ticks", "120", "--smooth-time", "0.5"]);
        assert_eq!(args.ticks, Some(120));
        assert_eq!(args.smooth_time, Some(0.5));
        assert!(args.config.is_none());
    }
}
