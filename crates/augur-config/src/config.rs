//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use augur_anticipation::{OutOfOrderPolicy, StalePolicy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Fixed-step simulation settings.
    pub simulation: SimulationConfig,
    /// Prediction and reconciliation settings.
    pub anticipation: AnticipationConfig,
    /// Simulated network conditions.
    pub network: NetworkConfig,
    /// Headless demo run settings.
    pub demo: DemoConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Fixed-step simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation steps per second, shared by every participant.
    pub tick_rate: u32,
    /// Longest frame time fed to the stepper before clamping, in seconds.
    pub max_frame_time: f64,
}

/// Prediction and reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnticipationConfig {
    /// Default staleness policy for values that do not pick their own.
    pub stale_policy: StalePolicy,
    /// What to do with authoritative updates that arrive out of order.
    pub out_of_order: OutOfOrderPolicy,
    /// Maximum input ledger length (0 = unbounded).
    pub history_capacity: usize,
    /// Smoothing duration for scalar corrections, in seconds.
    pub smooth_time: f64,
    /// Smoothing duration for transform corrections, in seconds.
    pub transform_smooth_time: f64,
    /// Transform corrections farther than this snap instead of smoothing.
    pub smooth_distance: f64,
}

/// Simulated network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// One-way latency in milliseconds.
    pub latency_ms: u32,
    /// Maximum latency deviation in milliseconds.
    pub jitter_ms: u32,
    /// Seed for link jitter and authority-side randomness.
    pub seed: u64,
}

/// Headless demo configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of simulation steps to run.
    pub ticks: u64,
    /// Rate at which the server-driven value advances, per second.
    pub value_e_rate: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_frame_time: 0.25,
        }
    }
}

impl Default for AnticipationConfig {
    fn default() -> Self {
        Self {
            stale_policy: StalePolicy::Ignore,
            out_of_order: OutOfOrderPolicy::Reject,
            history_capacity: 256,
            smooth_time: 0.25,
            transform_smooth_time: 0.1,
            smooth_distance: 2.0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            latency_ms: 200,
            jitter_ms: 25,
            seed: 42,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            ticks: 600,
            value_e_rate: 2.5,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for this application, if one can be resolved.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("augur"))
}

// --- Validation ---

impl Config {
    /// Checks that every setting is within its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.into(),
            })
        }

        if self.simulation.tick_rate == 0 {
            return invalid("simulation.tick_rate", "must be at least 1");
        }
        if !self.simulation.max_frame_time.is_finite() || self.simulation.max_frame_time <= 0.0 {
            return invalid("simulation.max_frame_time", "must be a positive finite number");
        }
        for (field, value) in [
            ("anticipation.smooth_time", self.anticipation.smooth_time),
            ("anticipation.transform_smooth_time", self.anticipation.transform_smooth_time),
            ("anticipation.smooth_distance", self.anticipation.smooth_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(field, format!("must be a non-negative number, got {value}"));
            }
        }
        if !self.demo.value_e_rate.is_finite() {
            return invalid("demo.value_e_rate", "must be finite");
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
