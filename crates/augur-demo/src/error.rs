//! Demo error type.

use augur_anticipation::AnticipationError;
use augur_config::ConfigError;
use augur_net::NetError;

/// Anything that stops a demo session.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A simulation clock could not be created.
    #[error("simulation clock: {0}")]
    Clock(#[from] AnticipationError),

    /// A message could not be encoded or decoded.
    #[error("network: {0}")]
    Net(#[from] NetError),
}
