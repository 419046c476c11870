//! Configuration for the anticipation runtime.
//!
//! Settings persist to disk as RON, can be overridden from the command line
//! via clap, and can be re-read at runtime to pick up edits.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AnticipationConfig, Config, DebugConfig, DemoConfig, NetworkConfig, SimulationConfig,
    default_config_dir,
};
pub use error::ConfigError;
