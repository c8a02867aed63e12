//! Dobot Magician through the vendor SDK bridge.
//!
//! Every operation is one [`SdkRequest`] answered by one [`SdkReply`].  The
//! bridge blocks until the SDK has queued the motion, so no pacing delay is
//! applied on this side.
//!
//! # Bridge protocol
//!
//! The script gets the request as one JSON argument and must print a reply
//! `{"success": bool, "msg": "..."}` as its last stdout line.  Every request
//! carries `command` and `port`; the other keys depend on the command:
//!
//! | `command`    | extra keys                            |
//! |--------------|---------------------------------------|
//! | `init`       | –                                     |
//! | `home`       | –                                     |
//! | `move`       | `x`, `y`, `z`, `r`, `speed`           |
//! | `move_joint` | `j1`, `j2`, `j3`, `j4`, `speed`       |
//! | `tool`       | `tool` (`"pen"`), `state` (bool)      |
//! | `stop`       | –                                     |
//!
//! A bridge that only knows `init`, `home`, `move` and `stop` answers the
//! other two with `success: false`; joint moves and pen control then fail
//! with [`BridgeError::Transport`] and nothing else is affected.
//!
//! Unless `sdk_script` is configured, the script is looked up as
//! `python/python_robot_control.py` beside the armbridge executable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use armbridge_types::{AdapterDescriptor, BridgeError, CartesianTarget, JointTarget, PositionUpdate};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapter::{EmergencyStop, PenControl, RobotAdapter, require_connected};
use crate::bridge::{ProcessBridge, SdkChannel, SdkReply, SdkRequest};
use crate::config::AdapterConfig;
use crate::limits::{AxisRange, WorkspaceLimits, clamp_speed};
use crate::link::LinkState;

pub const ID: &str = "dobot";
pub const DEFAULT_SDK_PROGRAM: &str = "python";
/// Bridge script path, relative to the install directory.
pub const SDK_SCRIPT_RELATIVE: &str = "python/python_robot_control.py";

/// Upper bound for one bridge round trip, motion included.
const SDK_CALL_TIMEOUT: Duration = Duration::from_secs(30);

const MAGICIAN_LIMITS: WorkspaceLimits = WorkspaceLimits {
    x: AxisRange::new(-320.0, 320.0),
    y: AxisRange::new(-320.0, 320.0),
    z: AxisRange::new(-100.0, 200.0),
    r: AxisRange::symmetric(150.0),
    joints: [
        AxisRange::symmetric(135.0),
        AxisRange::new(-5.0, 85.0),
        AxisRange::new(-10.0, 90.0),
        AxisRange::symmetric(150.0),
        AxisRange::symmetric(0.0),
        AxisRange::symmetric(0.0),
    ],
};

pub fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor::new(
        ID,
        "Dobot Magician",
        "Dobot Magician robotic arm adapter (Python-SDK bridge)",
    )
}

/// [`SDK_SCRIPT_RELATIVE`] resolved against the directory of the running
/// executable, or the working directory when that cannot be determined.
pub fn default_sdk_script() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(SDK_SCRIPT_RELATIVE)))
        .unwrap_or_else(|| PathBuf::from(SDK_SCRIPT_RELATIVE))
}

/// `endpoint` is the serial port the bridge opens, e.g. `COM3`.
pub fn create(endpoint: &str, config: &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> {
    let port = endpoint.trim();
    if port.is_empty() {
        return Err(BridgeError::InvalidCommand(
            "dobot needs the serial port of the arm, e.g. COM3".to_string(),
        ));
    }
    let script = match &config.sdk_script {
        Some(script) => script.clone(),
        None => default_sdk_script().to_string_lossy().into_owned(),
    };
    let bridge = ProcessBridge::new(
        config.sdk_program.as_deref().unwrap_or(DEFAULT_SDK_PROGRAM),
        script,
        SDK_CALL_TIMEOUT,
    );
    Ok(Box::new(Dobot::new(port, Arc::new(bridge), config)))
}

pub struct Dobot {
    port: String,
    channel: Arc<dyn SdkChannel>,
    connect_timeout: Duration,
    limits: WorkspaceLimits,
    link: LinkState,
}

impl Dobot {
    pub fn new(port: &str, channel: Arc<dyn SdkChannel>, config: &AdapterConfig) -> Self {
        Self {
            port: port.to_string(),
            channel,
            connect_timeout: config.connect_timeout(),
            limits: config.limits.unwrap_or(MAGICIAN_LIMITS),
            link: LinkState::new(),
        }
    }

    fn request(&self, command: &str) -> SdkRequest {
        SdkRequest::new(command, self.port.as_str())
    }

    /// Send a request on a live link and turn `success = false` into an
    /// error.
    async fn call(&self, request: SdkRequest) -> Result<SdkReply, BridgeError> {
        require_connected(&self.link)?;
        let reply = self.channel.call(&request).await?;
        self.link.record_send();
        if reply.success {
            Ok(reply)
        } else {
            Err(BridgeError::transport(ID, format!("{}: {}", request.command, reply.msg)))
        }
    }
}

#[async_trait]
impl RobotAdapter for Dobot {
    fn robot_type(&self) -> &str {
        ID
    }

    fn link(&self) -> &LinkState {
        &self.link
    }

    async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.link.is_connected() {
            return Ok(());
        }
        let init = self.request("init");
        let reply = match tokio::time::timeout(self.connect_timeout, self.channel.call(&init)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(BridgeError::connection(&self.port, e)),
            Err(_) => {
                return Err(BridgeError::connection(
                    &self.port,
                    format!("init timed out after {} ms", self.connect_timeout.as_millis()),
                ));
            }
        };
        self.link.record_send();
        if !reply.success {
            return Err(BridgeError::connection(&self.port, reply.msg));
        }
        self.link.set_connected(true);
        info!(port = %self.port, msg = %reply.msg, "dobot initialized");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.link.is_connected() {
            info!(port = %self.port, "dobot disconnected");
        }
        self.link.set_connected(false);
    }

    async fn home(&mut self) -> Result<(), BridgeError> {
        self.call(self.request("home")).await?;
        self.link
            .merge(&CartesianTarget::new(200.0, 0.0, 150.0, 0.0).into());
        Ok(())
    }

    async fn move_cartesian(
        &mut self,
        target: CartesianTarget,
        speed: f64,
    ) -> Result<(), BridgeError> {
        self.limits.check_cartesian(&target)?;
        let request = self
            .request("move")
            .param("x", target.x)
            .param("y", target.y)
            .param("z", target.z)
            .param("r", target.r)
            .param("speed", clamp_speed(speed));
        self.call(request).await?;
        self.link.merge(&target.into());
        Ok(())
    }

    async fn move_joint(&mut self, target: JointTarget, speed: f64) -> Result<(), BridgeError> {
        self.limits
            .check_joints(&[target.j1, target.j2, target.j3, target.j4])?;
        let request = self
            .request("move_joint")
            .param("j1", target.j1)
            .param("j2", target.j2)
            .param("j3", target.j3)
            .param("j4", target.j4)
            .param("speed", clamp_speed(speed));
        self.call(request).await?;
        self.link.merge(&PositionUpdate::from(JointTarget {
            j5: None,
            j6: None,
            ..target
        }));
        Ok(())
    }

    async fn set_end_effector(&mut self, engaged: bool) -> Result<(), BridgeError> {
        self.set_pen(engaged).await
    }

    fn stop_handle(&self) -> Option<Arc<dyn EmergencyStop>> {
        Some(Arc::new(DobotStop {
            port: self.port.clone(),
            channel: Arc::clone(&self.channel),
        }))
    }

    fn pen(&mut self) -> Option<&mut dyn PenControl> {
        Some(self)
    }
}

#[async_trait]
impl PenControl for Dobot {
    async fn set_pen(&mut self, down: bool) -> Result<(), BridgeError> {
        let request = self
            .request("tool")
            .param("tool", "pen")
            .param("state", down);
        self.call(request).await.map(drop)
    }
}

/// Stops the SDK command queue.
struct DobotStop {
    port: String,
    channel: Arc<dyn SdkChannel>,
}

#[async_trait]
impl EmergencyStop for DobotStop {
    async fn send_stop(&self) -> Result<(), BridgeError> {
        warn!(port = %self.port, "EMERGENCY STOP");
        let reply = self
            .channel
            .call(&SdkRequest::new("stop", self.port.as_str()))
            .await?;
        if reply.success {
            Ok(())
        } else {
            Err(BridgeError::transport(ID, format!("stop: {}", reply.msg)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedSdk;
    use serde_json::json;

    fn dobot(sdk: &ScriptedSdk) -> Dobot {
        Dobot::new("COM3", Arc::new(sdk.clone()), &AdapterConfig::default())
    }

    #[tokio::test]
    async fn failed_init_leaves_adapter_disconnected() {
        let sdk = ScriptedSdk::new();
        sdk.fail_command("init", "Init failure: port busy");
        let mut arm = dobot(&sdk);

        let err = arm.connect().await.unwrap_err();
        match err {
            BridgeError::Connection { endpoint, details } => {
                assert_eq!(endpoint, "COM3");
                assert!(details.contains("port busy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!arm.is_connected());
    }

    #[tokio::test]
    async fn home_and_move_go_through_bridge() {
        let sdk = ScriptedSdk::new();
        let mut arm = dobot(&sdk);
        arm.connect().await.unwrap();

        arm.home().await.unwrap();
        assert_eq!(arm.position().x, 200.0);

        arm.move_cartesian(CartesianTarget::new(220.0, 10.0, 40.0, 0.0), 120.0)
            .await
            .unwrap();
        let requests = sdk.requests();
        assert_eq!(sdk.commands(), vec!["init", "home", "move"]);
        assert_eq!(requests[2].port, "COM3");
        assert_eq!(requests[2].params["speed"], json!(100.0));
        assert_eq!(arm.position().z, 40.0);
    }

    #[tokio::test]
    async fn unsuccessful_reply_is_an_error() {
        let sdk = ScriptedSdk::new();
        sdk.fail_command("move", "Runtime error: alarm");
        let mut arm = dobot(&sdk);
        arm.connect().await.unwrap();

        let err = arm
            .move_cartesian(CartesianTarget::new(200.0, 0.0, 100.0, 0.0), 50.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("alarm"));
        assert_eq!(arm.position().x, 0.0);
    }

    #[tokio::test]
    async fn pen_maps_to_tool_request() {
        let sdk = ScriptedSdk::new();
        let mut arm = dobot(&sdk);
        arm.connect().await.unwrap();

        arm.pen().unwrap().set_pen(true).await.unwrap();
        let last = sdk.requests().pop().unwrap();
        assert_eq!(last.command, "tool");
        assert_eq!(last.params["tool"], json!("pen"));
        assert_eq!(last.params["state"], json!(true));
    }

    #[tokio::test]
    async fn emergency_stop_sends_stop() {
        let sdk = ScriptedSdk::new();
        let mut arm = dobot(&sdk);
        arm.connect().await.unwrap();
        arm.emergency_stop().await;
        assert_eq!(sdk.commands().last().map(String::as_str), Some("stop"));
    }

    #[tokio::test]
    async fn commands_before_connect_send_nothing() {
        let sdk = ScriptedSdk::new();
        let mut arm = dobot(&sdk);
        assert_eq!(arm.home().await.unwrap_err(), BridgeError::NotConnected);
        assert!(sdk.requests().is_empty());
    }

    #[test]
    fn default_script_sits_beside_the_executable() {
        let script = default_sdk_script();
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert!(script.starts_with(&exe_dir));
        assert!(script.ends_with("python/python_robot_control.py"));
    }

    #[tokio::test]
    async fn bridge_without_joint_or_pen_support_fails_only_those() {
        let sdk = ScriptedSdk::new();
        sdk.fail_command("move_joint", "Unknown command");
        sdk.fail_command("tool", "Unknown command");
        let mut arm = dobot(&sdk);
        arm.connect().await.unwrap();

        let err = arm
            .move_joint(JointTarget::new(10.0, 20.0, 30.0, 0.0), 50.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Transport { ref details, .. } if details.contains("Unknown command")
        ));
        assert!(arm.set_end_effector(true).await.is_err());

        assert!(arm.is_connected());
        arm.move_cartesian(CartesianTarget::new(200.0, 0.0, 50.0, 0.0), 50.0)
            .await
            .unwrap();
        assert_eq!(arm.position().j1, 0.0);
    }
}
