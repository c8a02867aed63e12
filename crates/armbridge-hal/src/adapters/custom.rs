//! In-process stand-in for a user-built robot.
//!
//! No device sits behind this adapter.  Every command is appended to a
//! journal and applied to the tracked pose, which makes it the reference
//! adapter for exercising the manager and for dry-running programs.  It is
//! also the only built-in adapter that exposes named tools.

use std::sync::{Arc, Mutex, MutexGuard};

use armbridge_types::{AdapterDescriptor, BridgeError, CartesianTarget, JointTarget};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::adapter::{
    EmergencyStop, RawCommand, RobotAdapter, ToolControl, require_connected,
};
use crate::config::{AdapterConfig, Pacing, pause};
use crate::limits::{AxisRange, WorkspaceLimits, clamp_speed};
use crate::link::LinkState;

pub const ID: &str = "custom";

const DEFAULT_LIMITS: WorkspaceLimits =
    WorkspaceLimits::reach(1000.0, AxisRange::new(-1000.0, 1000.0), 360.0);

pub fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor::new(
        ID,
        "Custom Robot",
        "Simulated robot for custom integrations and dry runs",
    )
}

pub fn create(_endpoint: &str, config: &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> {
    Ok(Box::new(SimulatedArm::new(config)))
}

/// Shared, append-only record of what the adapter was asked to do.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn record(&self, entry: String) {
        debug!(entry = %entry, "custom robot");
        self.lock().push(entry);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct SimulatedArm {
    limits: WorkspaceLimits,
    pacing: Pacing,
    link: LinkState,
    journal: Journal,
    active_tool: Option<String>,
}

impl SimulatedArm {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            limits: config.limits.unwrap_or(DEFAULT_LIMITS),
            pacing: Pacing::immediate().with_overrides(&config.pacing),
            link: LinkState::new(),
            journal: Journal::default(),
            active_tool: None,
        }
    }

    /// A handle onto this adapter's journal that outlives the adapter.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn active_tool(&self) -> Option<&str> {
        self.active_tool.as_deref()
    }

    fn apply(&self, entry: String) -> Result<(), BridgeError> {
        require_connected(&self.link)?;
        self.journal.record(entry);
        self.link.record_send();
        Ok(())
    }
}

#[async_trait]
impl RobotAdapter for SimulatedArm {
    fn robot_type(&self) -> &str {
        ID
    }

    fn link(&self) -> &LinkState {
        &self.link
    }

    async fn connect(&mut self) -> Result<(), BridgeError> {
        self.link.set_connected(true);
        info!("custom robot connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.link.set_connected(false);
    }

    async fn home(&mut self) -> Result<(), BridgeError> {
        self.apply("home".to_string())?;
        self.link.merge(&CartesianTarget::new(0.0, 0.0, 0.0, 0.0).into());
        pause(self.pacing.home).await;
        Ok(())
    }

    async fn move_cartesian(
        &mut self,
        target: CartesianTarget,
        speed: f64,
    ) -> Result<(), BridgeError> {
        self.limits.check_cartesian(&target)?;
        self.apply(format!(
            "move {} {} {} {} @{}",
            target.x,
            target.y,
            target.z,
            target.r,
            clamp_speed(speed)
        ))?;
        self.link.merge(&target.into());
        pause(self.pacing.motion).await;
        Ok(())
    }

    async fn move_joint(&mut self, target: JointTarget, speed: f64) -> Result<(), BridgeError> {
        self.limits
            .check_joints(&target.six_axis(&self.link.position()))?;
        self.apply(format!(
            "joint {} {} {} {} @{}",
            target.j1,
            target.j2,
            target.j3,
            target.j4,
            clamp_speed(speed)
        ))?;
        self.link.merge(&target.into());
        pause(self.pacing.motion).await;
        Ok(())
    }

    async fn set_end_effector(&mut self, engaged: bool) -> Result<(), BridgeError> {
        self.apply(format!(
            "gripper {}",
            if engaged { "closed" } else { "open" }
        ))
    }

    fn stop_handle(&self) -> Option<Arc<dyn EmergencyStop>> {
        Some(Arc::new(SimulatedStop {
            journal: self.journal.clone(),
        }))
    }

    fn tool(&mut self) -> Option<&mut dyn ToolControl> {
        Some(self)
    }

    fn raw(&mut self) -> Option<&mut dyn RawCommand> {
        Some(self)
    }
}

#[async_trait]
impl ToolControl for SimulatedArm {
    async fn set_tool(&mut self, tool: &str, active: bool) -> Result<(), BridgeError> {
        self.apply(format!("tool {tool} {}", if active { "on" } else { "off" }))?;
        self.active_tool = active.then(|| tool.to_string());
        Ok(())
    }
}

#[async_trait]
impl RawCommand for SimulatedArm {
    async fn send_raw(&mut self, command: &str, params: &Value) -> Result<Value, BridgeError> {
        self.apply(format!("raw {command} {params}"))?;
        Ok(json!({ "echo": command, "params": params }))
    }
}

struct SimulatedStop {
    journal: Journal,
}

#[async_trait]
impl EmergencyStop for SimulatedStop {
    async fn send_stop(&self) -> Result<(), BridgeError> {
        warn!("custom robot EMERGENCY STOP");
        self.journal.record("stop".to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Capability;

    #[tokio::test]
    async fn journal_records_commands_in_order() {
        let mut arm = SimulatedArm::new(&AdapterConfig::default());
        let journal = arm.journal();
        arm.connect().await.unwrap();

        arm.move_cartesian(CartesianTarget::new(10.0, 20.0, 30.0, 0.0), 50.0)
            .await
            .unwrap();
        arm.set_end_effector(true).await.unwrap();
        arm.emergency_stop().await;

        assert_eq!(
            journal.entries(),
            vec!["move 10 20 30 0 @50", "gripper closed", "stop"]
        );
        assert_eq!(arm.link().sends(), 2);
    }

    #[tokio::test]
    async fn exposes_tool_and_raw_only() {
        let mut arm = SimulatedArm::new(&AdapterConfig::default());
        assert_eq!(arm.capabilities(), vec![Capability::Tool, Capability::Raw]);

        arm.connect().await.unwrap();
        arm.set_tool("welder", true).await.unwrap();
        assert_eq!(arm.active_tool(), Some("welder"));
        arm.set_tool("welder", false).await.unwrap();
        assert_eq!(arm.active_tool(), None);

        let echoed = arm.send_raw("blink", &json!({ "n": 3 })).await.unwrap();
        assert_eq!(echoed["params"]["n"], 3);
    }

    #[tokio::test]
    async fn joint_move_leaves_cartesian_axes() {
        let mut arm = SimulatedArm::new(&AdapterConfig::default());
        arm.connect().await.unwrap();
        arm.move_cartesian(CartesianTarget::new(5.0, 6.0, 7.0, 0.0), 50.0)
            .await
            .unwrap();
        arm.move_joint(JointTarget::new(1.0, 2.0, 3.0, 4.0), 50.0)
            .await
            .unwrap();
        let pos = arm.position();
        assert_eq!((pos.x, pos.z, pos.j3), (5.0, 7.0, 3.0));
    }
}
