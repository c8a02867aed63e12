//! Program model: an ordered list of vendor-neutral commands.
//!
//! Programs are transient – they exist only for the duration of one run and
//! are never persisted.  The JSON shape matches what the web front-end
//! posts:
//!
//! ```json
//! { "name": "pick", "commands": [
//!     { "type": "home" },
//!     { "type": "move", "params": { "x": 100, "y": 50, "z": 150, "r": 0 }, "speed": 40 },
//!     { "type": "wait", "params": { "duration": 500 } },
//!     { "type": "gripper", "params": { "state": true } }
//! ] }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::position::{CartesianTarget, JointTarget};

/// Speed (0–100 scale) used when a motion step does not carry one.
pub const DEFAULT_SPEED: f64 = 50.0;

/// Wait duration used when a `wait` step does not carry one.
pub const DEFAULT_WAIT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub name: String,
    pub commands: Vec<ProgramCommand>,
}

/// One step of a [`Program`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgramCommand {
    Move {
        params: CartesianTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },
    MoveJoint {
        params: JointTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
    },
    Wait {
        #[serde(default)]
        params: WaitParams,
    },
    Gripper {
        params: GripperParams,
    },
    Home {},
}

impl ProgramCommand {
    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgramCommand::Move { .. } => "move",
            ProgramCommand::MoveJoint { .. } => "moveJoint",
            ProgramCommand::Wait { .. } => "wait",
            ProgramCommand::Gripper { .. } => "gripper",
            ProgramCommand::Home {} => "home",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitParams {
    #[serde(rename = "duration", default = "default_wait_ms")]
    pub duration_ms: u64,
}

impl Default for WaitParams {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_WAIT_MS,
        }
    }
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GripperParams {
    /// `true` = closed / engaged.
    pub state: bool,
}

/// Summary of a completed program run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramReport {
    pub run_id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub steps_completed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_front_end_program() {
        let raw = r#"{
            "name": "pick",
            "commands": [
                { "type": "home" },
                { "type": "move", "params": { "x": 100, "y": 50, "z": 150, "r": 0 }, "speed": 40 },
                { "type": "moveJoint", "params": { "j1": 10, "j2": 20, "j3": 30, "j4": 0 } },
                { "type": "wait", "params": { "duration": 250 } },
                { "type": "gripper", "params": { "state": true } }
            ]
        }"#;
        let program: Program = serde_json::from_str(raw).unwrap();
        assert_eq!(program.name, "pick");
        assert_eq!(program.commands.len(), 5);
        assert_eq!(program.commands[0], ProgramCommand::Home {});
        assert_eq!(
            program.commands[1],
            ProgramCommand::Move {
                params: CartesianTarget::new(100.0, 50.0, 150.0, 0.0),
                speed: Some(40.0),
            }
        );
        assert!(matches!(
            program.commands[2],
            ProgramCommand::MoveJoint { speed: None, .. }
        ));
        assert_eq!(
            program.commands[3],
            ProgramCommand::Wait {
                params: WaitParams { duration_ms: 250 }
            }
        );
        assert_eq!(program.commands[4].kind(), "gripper");
    }

    #[test]
    fn wait_without_params_uses_default_duration() {
        let cmd: ProgramCommand = serde_json::from_str(r#"{ "type": "wait" }"#).unwrap();
        assert_eq!(
            cmd,
            ProgramCommand::Wait {
                params: WaitParams {
                    duration_ms: DEFAULT_WAIT_MS
                }
            }
        );
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let result: Result<ProgramCommand, _> = serde_json::from_str(r#"{ "type": "dance" }"#);
        assert!(result.is_err());
    }
}
