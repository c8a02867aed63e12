//! Hobby arms running Arduino firmware on a USB serial port.
//!
//! The firmware understands one of three line dialects, picked with
//! `command_format` in the adapter config.  It reboots when the port is
//! opened, so `INIT` is only sent after the boot delay.  Firmware that
//! reports its pose prints `POS:x,y,z,r` lines, which are merged into the
//! tracked position as they arrive.

use armbridge_types::{AdapterDescriptor, BridgeError, CartesianTarget, JointTarget, PositionUpdate};
use serde_json::{Map, Value, json};

use super::line_arm::{Dialect, LineArm};
use crate::adapter::RobotAdapter;
use crate::config::{AdapterConfig, CommandFormat, Pacing};
use crate::limits::{AxisRange, WorkspaceLimits};
use crate::transport::{Dialer, SerialDialer};

pub const ID: &str = "arduino";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

pub fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor::new(
        ID,
        "Arduino Robot Arm",
        "Custom Arduino-based robotic arms with serial communication",
    )
}

/// `endpoint` is the serial device, e.g. `COM7` or `/dev/ttyACM0`.
pub fn create(endpoint: &str, config: &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> {
    let path = endpoint.trim();
    if path.is_empty() {
        return Err(BridgeError::InvalidCommand(
            "arduino needs a serial port, e.g. COM7 or /dev/ttyACM0".to_string(),
        ));
    }
    let dialer = SerialDialer::new(path, config.baud_rate.unwrap_or(DEFAULT_BAUD_RATE));
    Ok(Box::new(with_dialer(Box::new(dialer), config)))
}

pub fn with_dialer(dialer: Box<dyn Dialer>, config: &AdapterConfig) -> LineArm<ArduinoLine> {
    LineArm::new(
        ID,
        ArduinoLine {
            format: config.command_format,
        },
        dialer,
        config,
    )
}

pub struct ArduinoLine {
    pub format: CommandFormat,
}

impl Dialect for ArduinoLine {
    fn default_limits(&self) -> WorkspaceLimits {
        WorkspaceLimits::reach(300.0, AxisRange::new(0.0, 400.0), 180.0)
    }

    fn default_pacing(&self) -> Pacing {
        Pacing::from_millis(100, 500, 3000, 2000)
    }

    fn home_line(&self) -> String {
        "HOME".to_string()
    }

    fn home_pose(&self) -> PositionUpdate {
        PositionUpdate::from(CartesianTarget::new(0.0, 0.0, 150.0, 0.0))
            .and(JointTarget::new(0.0, 0.0, 0.0, 0.0).into())
    }

    fn linear_line(&self, t: &CartesianTarget, speed: f64) -> String {
        match self.format {
            CommandFormat::Simple => format!("MOVE {} {} {} {} {}", t.x, t.y, t.z, t.r, speed),
            CommandFormat::Gcode => {
                format!("G1 X{} Y{} Z{} F{}", t.x, t.y, t.z, speed * 10.0)
            }
            CommandFormat::Json => json!({
                "cmd": "move",
                "x": t.x,
                "y": t.y,
                "z": t.z,
                "r": t.r,
                "speed": speed,
            })
            .to_string(),
        }
    }

    fn joint_line(&self, j: &[f64; 6], speed: f64) -> String {
        match self.format {
            CommandFormat::Json => json!({
                "cmd": "joint",
                "joints": j,
                "speed": speed,
            })
            .to_string(),
            // G-code has no joint-space move; the firmware also accepts JOINT.
            CommandFormat::Simple | CommandFormat::Gcode => {
                format!("JOINT {} {} {} {} {}", j[0], j[1], j[2], j[3], speed)
            }
        }
    }

    fn joint_pose(&self, target: &JointTarget, _joints: &[f64; 6]) -> PositionUpdate {
        PositionUpdate::from(*target)
    }

    fn end_effector_line(&self, engaged: bool) -> String {
        if engaged {
            "GRIPPER CLOSE".to_string()
        } else {
            "GRIPPER OPEN".to_string()
        }
    }

    fn stop_line(&self) -> String {
        "STOP".to_string()
    }

    fn init_line(&self) -> Option<String> {
        Some("INIT".to_string())
    }

    fn parse_telemetry(&self, line: &str) -> Option<PositionUpdate> {
        parse_pos(line)
    }

    fn supports_raw(&self) -> bool {
        true
    }

    /// Text dialects send the command verbatim.  The JSON dialect wraps it
    /// as `{"cmd": command, ...params}`.
    fn raw_line(&self, command: &str, params: &Value) -> String {
        match self.format {
            CommandFormat::Json => {
                let mut object = Map::new();
                object.insert("cmd".to_string(), Value::from(command));
                if let Value::Object(extra) = params {
                    for (k, v) in extra {
                        if k != "cmd" {
                            object.insert(k.clone(), v.clone());
                        }
                    }
                }
                Value::Object(object).to_string()
            }
            CommandFormat::Simple | CommandFormat::Gcode => command.trim().to_string(),
        }
    }
}

/// `POS:x,y,z,r` with at least four numeric fields.
fn parse_pos(line: &str) -> Option<PositionUpdate> {
    let fields = line.trim().strip_prefix("POS:")?;
    let coords: Vec<f64> = fields
        .split(',')
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match coords.as_slice() {
        [x, y, z, r, ..] => Some(CartesianTarget::new(*x, *y, *z, *r).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RawCommand;
    use crate::sim::{DuplexDialer, unpaced};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn dialect(format: CommandFormat) -> ArduinoLine {
        ArduinoLine { format }
    }

    #[test]
    fn encodes_moves_in_each_dialect() {
        let t = CartesianTarget::new(100.0, 50.0, 150.0, 0.0);
        assert_eq!(
            dialect(CommandFormat::Simple).linear_line(&t, 50.0),
            "MOVE 100 50 150 0 50"
        );
        assert_eq!(
            dialect(CommandFormat::Gcode).linear_line(&t, 50.0),
            "G1 X100 Y50 Z150 F500"
        );
        let json: Value =
            serde_json::from_str(&dialect(CommandFormat::Json).linear_line(&t, 50.0)).unwrap();
        assert_eq!(json["cmd"], "move");
        assert_eq!(json["z"], 150.0);
        assert_eq!(json["speed"], 50.0);
    }

    #[test]
    fn json_joint_move_carries_six_joints() {
        let line = dialect(CommandFormat::Json).joint_line(&[1.0, 2.0, 3.0, 4.0, 0.0, 0.0], 30.0);
        let json: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["joints"].as_array().unwrap().len(), 6);
        assert_eq!(
            dialect(CommandFormat::Gcode).joint_line(&[1.0, 2.0, 3.0, 4.0, 0.0, 0.0], 30.0),
            "JOINT 1 2 3 4 30"
        );
    }

    #[test]
    fn parses_position_reports() {
        let update = parse_pos("POS:100,200,150,0").unwrap();
        assert_eq!(update.x, Some(100.0));
        assert_eq!(update.r, Some(0.0));
        assert!(update.j1.is_none());
        assert!(parse_pos("POS:1,2,3").is_none());
        assert!(parse_pos("POS:1,2,x,4").is_none());
        assert!(parse_pos("OK").is_none());
    }

    #[test]
    fn raw_json_merges_params() {
        let line = dialect(CommandFormat::Json).raw_line("servo", &json!({ "id": 3, "angle": 90 }));
        let json: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json, json!({ "cmd": "servo", "id": 3, "angle": 90 }));
        assert_eq!(
            dialect(CommandFormat::Simple).raw_line(" LED ON ", &Value::Null),
            "LED ON"
        );
    }

    #[test]
    fn serial_port_is_required() {
        let err = create("  ", &AdapterConfig::default()).err().unwrap();
        assert!(matches!(err, BridgeError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn connect_sends_init_and_tracks_telemetry() {
        let (dialer, peer) = DuplexDialer::pair();
        let mut arm = with_dialer(Box::new(dialer), &unpaced());
        arm.connect().await.unwrap();

        let (read, mut write) = tokio::io::split(peer);
        let mut lines = BufReader::new(read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "INIT");

        write.write_all(b"POS:10,20,30,5\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let pos = arm.position();
        assert_eq!((pos.x, pos.y, pos.z, pos.r), (10.0, 20.0, 30.0, 5.0));

        let sent = arm.send_raw("LED ON", &Value::Null).await.unwrap();
        assert_eq!(sent, json!({ "sent": "LED ON" }));
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "LED ON");
    }

    #[tokio::test]
    async fn joint_move_keeps_unspecified_wrist() {
        let (dialer, _peer) = DuplexDialer::pair();
        let mut arm = with_dialer(Box::new(dialer), &unpaced());
        arm.connect().await.unwrap();
        arm.move_joint(JointTarget::new(10.0, 20.0, 30.0, 40.0), 50.0)
            .await
            .unwrap();
        let pos = arm.position();
        assert_eq!((pos.j1, pos.j4, pos.j5), (10.0, 40.0, 0.0));
    }
}
