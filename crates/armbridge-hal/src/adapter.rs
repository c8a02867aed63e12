//! The [`RobotAdapter`] contract and its optional capability traits.
//!
//! Every vendor family implements [`RobotAdapter`].  Features that only some
//! controllers have (a pen lift, a gripper, named tools, raw passthrough)
//! are separate traits that an adapter exposes through the probe methods
//! [`RobotAdapter::pen`], [`RobotAdapter::gripper`], [`RobotAdapter::tool`]
//! and [`RobotAdapter::raw`].  Callers never inspect the concrete type.

use std::fmt;
use std::sync::Arc;

use armbridge_types::{BridgeError, CartesianTarget, JointTarget, Position};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use crate::link::LinkState;

/// Optional features an adapter may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Pen,
    Gripper,
    Tool,
    Raw,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Pen => "pen",
            Capability::Gripper => "gripper",
            Capability::Tool => "tool",
            Capability::Raw => "raw",
        };
        f.write_str(name)
    }
}

/// Lift or lower a drawing pen.
#[async_trait]
pub trait PenControl: Send {
    async fn set_pen(&mut self, down: bool) -> Result<(), BridgeError>;
}

/// Open or close a gripper.
#[async_trait]
pub trait GripperControl: Send {
    /// `closed = true` grips.
    async fn set_gripper(&mut self, closed: bool) -> Result<(), BridgeError>;
}

/// Switch a named end-effector tool.
#[async_trait]
pub trait ToolControl: Send {
    async fn set_tool(&mut self, tool: &str, active: bool) -> Result<(), BridgeError>;
}

/// Device-specific passthrough for commands outside the common contract.
#[async_trait]
pub trait RawCommand: Send {
    async fn send_raw(&mut self, command: &str, params: &Value) -> Result<Value, BridgeError>;
}

/// Out-of-band stop path.
///
/// A handle is taken from the adapter at connect time so that an emergency
/// stop never waits behind the adapter's own in-flight motion command.
#[async_trait]
pub trait EmergencyStop: Send + Sync {
    /// Send the controller's halt instruction, bypassing every validation.
    async fn send_stop(&self) -> Result<(), BridgeError>;
}

/// One connection to one robot controller.
///
/// # Contract
///
/// * Motion commands validate their target against the adapter's workspace
///   limits and fail with [`BridgeError::LimitViolation`] before any byte is
///   written.
/// * Every method other than [`connect`](Self::connect) fails with
///   [`BridgeError::NotConnected`] while the link is down.
/// * The tracked position is updated by partial merge after a command is
///   issued; it is a commanded pose, not a measured one, unless the device
///   reports telemetry.
#[async_trait]
pub trait RobotAdapter: Send + Sync {
    /// Registry id of the family this adapter belongs to, e.g. `"abb"`.
    fn robot_type(&self) -> &str;

    /// Shared connection and position state.
    fn link(&self) -> &LinkState;

    /// Open the transport and run the device's init handshake.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Connection`] when the device is unreachable, refuses
    /// the link, or does not answer within the connect timeout.  The adapter
    /// stays disconnected and may be retried.
    async fn connect(&mut self) -> Result<(), BridgeError>;

    /// Close the transport.  Never fails; close errors are logged.
    async fn disconnect(&mut self);

    async fn home(&mut self) -> Result<(), BridgeError>;

    /// Linear move to `target`.  `speed` is on a 0–100 scale.
    async fn move_cartesian(
        &mut self,
        target: CartesianTarget,
        speed: f64,
    ) -> Result<(), BridgeError>;

    /// Joint-space move.  Six-axis controllers take a missing `j5`/`j6`
    /// from the current position.
    async fn move_joint(&mut self, target: JointTarget, speed: f64) -> Result<(), BridgeError>;

    /// Engage or release the primary end effector.
    async fn set_end_effector(&mut self, engaged: bool) -> Result<(), BridgeError>;

    /// Handle for the out-of-band stop path, if the device has one.
    fn stop_handle(&self) -> Option<Arc<dyn EmergencyStop>>;

    fn is_connected(&self) -> bool {
        self.link().is_connected()
    }

    fn position(&self) -> Position {
        self.link().position()
    }

    /// Best-effort halt.  Failures are logged, never returned.
    async fn emergency_stop(&mut self) {
        match self.stop_handle() {
            Some(handle) => {
                if let Err(e) = handle.send_stop().await {
                    error!(robot = self.robot_type(), error = %e, "emergency stop failed to send");
                }
            }
            None => warn!(robot = self.robot_type(), "adapter has no stop path"),
        }
    }

    fn pen(&mut self) -> Option<&mut dyn PenControl> {
        None
    }

    fn gripper(&mut self) -> Option<&mut dyn GripperControl> {
        None
    }

    fn tool(&mut self) -> Option<&mut dyn ToolControl> {
        None
    }

    fn raw(&mut self) -> Option<&mut dyn RawCommand> {
        None
    }

    /// The capabilities this adapter exposes, in probe order.
    fn capabilities(&mut self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.pen().is_some() {
            caps.push(Capability::Pen);
        }
        if self.gripper().is_some() {
            caps.push(Capability::Gripper);
        }
        if self.tool().is_some() {
            caps.push(Capability::Tool);
        }
        if self.raw().is_some() {
            caps.push(Capability::Raw);
        }
        caps
    }
}

/// Fail with [`BridgeError::NotConnected`] unless `link` is up.
pub fn require_connected(link: &LinkState) -> Result<(), BridgeError> {
    if link.is_connected() {
        Ok(())
    } else {
        Err(BridgeError::NotConnected)
    }
}
