//! [`BridgeError`] – the single error taxonomy shared by adapters and the
//! manager.
//!
//! Validation variants (`LimitViolation`, `InvalidCommand`) are raised before
//! any byte reaches a transport.  I/O variants (`Connection`, `Transport`)
//! carry the underlying cause verbatim in `details`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Unsupported robot type: {requested}. Available: {available}")]
    UnknownRobotType { requested: String, available: String },

    #[error("A robot is already connected ({robot_type}). Disconnect first.")]
    AlreadyConnected { robot_type: String },

    #[error("No robot connected")]
    NotConnected,

    #[error("A program is already executing")]
    AlreadyExecuting,

    #[error("Limit violation on {axis}: {value} outside [{min}, {max}]")]
    LimitViolation {
        axis: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Failed to connect to {endpoint}: {details}")]
    Connection { endpoint: String, details: String },

    #[error("Transport error on {component}: {details}")]
    Transport { component: String, details: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Program failed at step {step}: {source}")]
    ProgramStep {
        /// 1-based position of the failing step.
        step: usize,
        source: Box<BridgeError>,
    },

    #[error("Program aborted by emergency stop at step {step}")]
    Aborted { step: usize },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn transport(component: impl Into<String>, details: impl ToString) -> Self {
        BridgeError::Transport {
            component: component.into(),
            details: details.to_string(),
        }
    }

    pub fn connection(endpoint: impl Into<String>, details: impl ToString) -> Self {
        BridgeError::Connection {
            endpoint: endpoint.into(),
            details: details.to_string(),
        }
    }
}
