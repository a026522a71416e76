//! # Orchestrator Error Types

use swarm_compute::ComputeError;
use thiserror::Error;

/// Errors surfaced by configuration loading and the orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwarmError {
    /// The config document did not parse.
    #[error("config parse error: {0}")]
    Config(String),

    /// The config parsed but holds inconsistent values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading the config file failed.
    #[error("io error: {0}")]
    Io(String),

    /// A compute backend call failed.
    #[error(transparent)]
    Compute(#[from] ComputeError),

    /// The GPU path is disabled.
    #[error("gpu path disabled")]
    Disabled,
}

/// Result type for orchestrator operations.
pub type SwarmResult<T> = Result<T, SwarmError>;
