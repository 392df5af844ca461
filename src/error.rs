use thiserror::Error;

use crate::session::SessionState;

/// Activity engine error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Cannot {action} while session is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error("Sampler already open in {0:?} mode")]
    SamplerBusy(crate::sampler::SamplerMode),

    #[error("Session driver has shut down")]
    DriverClosed,

    #[error("Location permission denied")]
    LocationDenied,

    #[error("Location source failed: {0}")]
    Source(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session store failed: {0}")]
    Store(String),

    #[error("Reward service failed: {0}")]
    Reward(String),
}

/// Result type for engine operations
pub type TrackerResult<T> = Result<T, TrackerError>;
