//! `armbridge-types` – shared vocabulary for the armbridge workspace.
//!
//! Every other crate speaks in these types: the HAL adapters update a
//! [`Position`], the kernel reports a [`RobotStatus`], programs arrive as a
//! [`Program`] and every failure is a [`BridgeError`].

pub mod error;
pub mod position;
pub mod program;

use serde::{Deserialize, Serialize};

pub use error::BridgeError;
pub use position::{CartesianTarget, JointTarget, Position, PositionUpdate};
pub use program::{
    DEFAULT_SPEED, DEFAULT_WAIT_MS, GripperParams, Program, ProgramCommand, ProgramReport,
    WaitParams,
};

/// Static, human-facing description of one registered robot type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    /// Registry key, e.g. `"arduino"`.
    pub id: String,
    /// Display name, e.g. `"Arduino Robot Arm"`.
    pub name: String,
    pub description: String,
}

impl AdapterDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Merged status snapshot returned by the manager on every status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotStatus {
    pub connected: bool,
    pub executing: bool,
    pub robot_type: Option<String>,
    pub position: Position,
}

impl RobotStatus {
    /// The snapshot reported while no adapter is active.
    pub fn idle() -> Self {
        Self {
            connected: false,
            executing: false,
            robot_type: None,
            position: Position::ZERO,
        }
    }
}

/// Result of an ad-hoc command such as `tool_activate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl CommandOutcome {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            result: None,
        }
    }
}
