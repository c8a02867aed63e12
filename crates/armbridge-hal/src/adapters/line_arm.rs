//! [`LineArm`] – an adapter for controllers that take one text command per
//! line over a byte stream.
//!
//! ABB, KUKA, Universal Robots and the Arduino firmware all follow the same
//! cycle: validate, encode, write, pause, update the tracked pose.  They
//! differ only in how commands are spelled, which is the job of a
//! [`Dialect`].

use std::sync::Arc;
use std::time::Duration;

use armbridge_types::{BridgeError, CartesianTarget, JointTarget, PositionUpdate};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::adapter::{
    EmergencyStop, GripperControl, RawCommand, RobotAdapter, require_connected,
};
use crate::config::{AdapterConfig, Pacing, pause};
use crate::limits::{WorkspaceLimits, clamp_speed};
use crate::link::LinkState;
use crate::transport::{Dialer, LineHandler, LineLink, LineSender};

/// How one controller family spells its commands.
///
/// Speeds passed to the encoders are already clamped to 0–100.
pub trait Dialect: Send + Sync + 'static {
    fn default_limits(&self) -> WorkspaceLimits;

    fn default_pacing(&self) -> Pacing;

    fn home_line(&self) -> String;

    /// Pose recorded after homing.
    fn home_pose(&self) -> PositionUpdate;

    fn linear_line(&self, target: &CartesianTarget, speed: f64) -> String;

    /// `joints` has the wrist already resolved against the current pose.
    fn joint_line(&self, joints: &[f64; 6], speed: f64) -> String;

    /// Pose recorded after a joint move.
    fn joint_pose(&self, target: &JointTarget, joints: &[f64; 6]) -> PositionUpdate {
        let _ = target;
        PositionUpdate::joints(*joints)
    }

    /// `engaged = true` closes the gripper.
    fn end_effector_line(&self, engaged: bool) -> String;

    fn stop_line(&self) -> String;

    /// Line sent once after the boot delay, if the firmware expects one.
    fn init_line(&self) -> Option<String> {
        None
    }

    /// Parse a telemetry line into a pose update.
    fn parse_telemetry(&self, line: &str) -> Option<PositionUpdate> {
        let _ = line;
        None
    }

    fn supports_raw(&self) -> bool {
        false
    }

    /// Encode a passthrough command.  Only consulted when
    /// [`supports_raw`](Self::supports_raw) is `true`.
    fn raw_line(&self, command: &str, params: &Value) -> String {
        let _ = params;
        command.to_string()
    }
}

pub struct LineArm<D: Dialect> {
    robot_type: String,
    dialect: Arc<D>,
    dialer: Box<dyn Dialer>,
    connect_timeout: Duration,
    limits: WorkspaceLimits,
    pacing: Pacing,
    link: LinkState,
    line: Option<LineLink>,
}

impl<D: Dialect> LineArm<D> {
    pub fn new(
        robot_type: &str,
        dialect: D,
        dialer: Box<dyn Dialer>,
        config: &AdapterConfig,
    ) -> Self {
        let limits = config.limits.unwrap_or_else(|| dialect.default_limits());
        let pacing = dialect.default_pacing().with_overrides(&config.pacing);
        Self {
            robot_type: robot_type.to_string(),
            dialect: Arc::new(dialect),
            dialer,
            connect_timeout: config.connect_timeout(),
            limits,
            pacing,
            link: LinkState::new(),
            line: None,
        }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn limits(&self) -> &WorkspaceLimits {
        &self.limits
    }

    /// Write one line, then wait out the acknowledgement delay.
    async fn send(&self, line: &str) -> Result<(), BridgeError> {
        require_connected(&self.link)?;
        let link = self.line.as_ref().ok_or(BridgeError::NotConnected)?;
        link.send_line(line).await?;
        pause(self.pacing.ack).await;
        Ok(())
    }

    fn telemetry_handler(&self) -> LineHandler {
        let dialect = Arc::clone(&self.dialect);
        let link = self.link.clone();
        let robot = self.robot_type.clone();
        Arc::new(move |line: &str| match dialect.parse_telemetry(line) {
            Some(update) => link.merge(&update),
            None => debug!(%robot, line, "device message"),
        })
    }
}

#[async_trait]
impl<D: Dialect> RobotAdapter for LineArm<D> {
    fn robot_type(&self) -> &str {
        &self.robot_type
    }

    fn link(&self) -> &LinkState {
        &self.link
    }

    async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.line.is_some() && self.link.is_connected() {
            return Ok(());
        }
        if let Some(mut stale) = self.line.take() {
            stale.close().await;
        }

        let line = LineLink::open(
            self.dialer.as_ref(),
            self.connect_timeout,
            &self.robot_type,
            self.link.clone(),
            Some(self.telemetry_handler()),
        )
        .await?;
        self.line = Some(line);

        if let Some(init) = self.dialect.init_line() {
            pause(self.pacing.boot).await;
            if let Err(e) = self.send(&init).await {
                self.disconnect().await;
                return Err(BridgeError::connection(self.dialer.endpoint(), e));
            }
        }

        info!(robot = %self.robot_type, endpoint = %self.dialer.endpoint(), "connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut line) = self.line.take() {
            line.close().await;
            info!(robot = %self.robot_type, "disconnected");
        }
        self.link.set_connected(false);
    }

    async fn home(&mut self) -> Result<(), BridgeError> {
        self.send(&self.dialect.home_line()).await?;
        self.link.merge(&self.dialect.home_pose());
        pause(self.pacing.home).await;
        Ok(())
    }

    async fn move_cartesian(
        &mut self,
        target: CartesianTarget,
        speed: f64,
    ) -> Result<(), BridgeError> {
        self.limits.check_cartesian(&target)?;
        let line = self.dialect.linear_line(&target, clamp_speed(speed));
        self.send(&line).await?;
        self.link.merge(&target.into());
        pause(self.pacing.motion).await;
        Ok(())
    }

    async fn move_joint(&mut self, target: JointTarget, speed: f64) -> Result<(), BridgeError> {
        let joints = target.six_axis(&self.link.position());
        self.limits.check_joints(&joints)?;
        let line = self.dialect.joint_line(&joints, clamp_speed(speed));
        self.send(&line).await?;
        self.link.merge(&self.dialect.joint_pose(&target, &joints));
        pause(self.pacing.motion).await;
        Ok(())
    }

    async fn set_end_effector(&mut self, engaged: bool) -> Result<(), BridgeError> {
        self.send(&self.dialect.end_effector_line(engaged)).await
    }

    fn stop_handle(&self) -> Option<Arc<dyn EmergencyStop>> {
        let sender = self.line.as_ref()?.sender();
        Some(Arc::new(LineStop {
            robot_type: self.robot_type.clone(),
            sender,
            line: self.dialect.stop_line(),
        }))
    }

    fn gripper(&mut self) -> Option<&mut dyn GripperControl> {
        Some(self)
    }

    fn raw(&mut self) -> Option<&mut dyn RawCommand> {
        if self.dialect.supports_raw() {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl<D: Dialect> GripperControl for LineArm<D> {
    async fn set_gripper(&mut self, closed: bool) -> Result<(), BridgeError> {
        self.send(&self.dialect.end_effector_line(closed)).await
    }
}

#[async_trait]
impl<D: Dialect> RawCommand for LineArm<D> {
    async fn send_raw(&mut self, command: &str, params: &Value) -> Result<Value, BridgeError> {
        if !self.dialect.supports_raw() {
            return Err(BridgeError::UnsupportedOperation(format!(
                "{} does not accept raw commands",
                self.robot_type
            )));
        }
        let line = self.dialect.raw_line(command, params);
        self.send(&line).await?;
        Ok(json!({ "sent": line }))
    }
}

/// Writes the dialect's stop line on the shared writer.
struct LineStop {
    robot_type: String,
    sender: LineSender,
    line: String,
}

#[async_trait]
impl EmergencyStop for LineStop {
    async fn send_stop(&self) -> Result<(), BridgeError> {
        warn!(robot = %self.robot_type, line = %self.line, "EMERGENCY STOP");
        self.sender.force_line(&self.line).await
    }
}
