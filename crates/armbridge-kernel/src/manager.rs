//! [`RobotManager`] – the single owner of the active robot.
//!
//! # States
//!
//! ```text
//!   Idle ──connect──► Connected ◄──────────────┐
//!    ▲                  │  execute_program     │ run ends / emergency stop
//!    │ disconnect       ▼                      │
//!    └──────────── Connected+Executing ────────┘
//! ```
//!
//! At most one adapter is active.  Commands that drive the robot serialise
//! on the adapter slot, and a program holds that slot from its first step to
//! its last; other commands are refused while it runs.  Status queries and
//! the emergency stop do not touch the slot, so they answer even while a
//! motion command is in flight.
//!
//! A link the transport reports closed counts as idle: status says so at
//! once, and the next command or connect releases the dead adapter.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use armbridge_hal::{AdapterConfig, AdapterRegistry, EmergencyStop, LinkState, RobotAdapter};
use armbridge_types::{
    AdapterDescriptor, BridgeError, CartesianTarget, CommandOutcome, DEFAULT_SPEED, JointTarget,
    Position, Program, ProgramCommand, ProgramReport, RobotStatus,
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::dispatch;
use crate::jog::JogAxis;
use crate::run::RunTracker;

struct ActiveRobot {
    robot_type: String,
    adapter: Box<dyn RobotAdapter>,
}

/// Lock-free-to-read summary of the active robot.
#[derive(Default)]
struct RobotView {
    robot_type: Option<String>,
    link: Option<LinkState>,
    stop: Option<Arc<dyn EmergencyStop>>,
}

pub struct RobotManager {
    registry: AdapterRegistry,
    // ── Command path ──────────────────────────────────────────────────────────
    /// The active adapter.  Held for each robot command, and for the whole
    /// of a program run.
    slot: AsyncMutex<Option<ActiveRobot>>,
    // ── Query / stop path ─────────────────────────────────────────────────────
    view: Mutex<RobotView>,
    runs: RunTracker,
}

impl RobotManager {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            slot: AsyncMutex::new(None),
            view: Mutex::new(RobotView::default()),
            runs: RunTracker::new(),
        }
    }

    /// Manager over every built-in adapter family.
    pub fn with_builtin_adapters() -> Self {
        Self::new(AdapterRegistry::builtin())
    }

    pub fn list_robot_types(&self) -> Vec<AdapterDescriptor> {
        self.registry.list()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the adapter registered as `robot_type` and connect it.
    ///
    /// An adapter whose link has dropped on its own is released first, so a
    /// reconnect after a cable pull needs no explicit disconnect.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::AlreadyConnected`] while a live adapter is active.
    /// - [`BridgeError::UnknownRobotType`] for an unregistered id.
    /// - Whatever the adapter's factory or `connect` returns; the failed
    ///   adapter is discarded and the manager stays idle.
    pub async fn connect(
        &self,
        robot_type: &str,
        endpoint: &str,
        config: &AdapterConfig,
    ) -> Result<RobotStatus, BridgeError> {
        // A running program holds the slot; answer without waiting for it.
        let current = self.status();
        if current.connected {
            return Err(BridgeError::AlreadyConnected {
                robot_type: current.robot_type.unwrap_or_default(),
            });
        }

        let mut slot = self.slot.lock().await;
        self.release_dropped(&mut slot).await;
        if let Some(active) = slot.as_ref() {
            return Err(BridgeError::AlreadyConnected {
                robot_type: active.robot_type.clone(),
            });
        }

        let factory = self.registry.resolve(robot_type)?;
        let mut adapter = factory(endpoint, config)?;

        info!(robot = robot_type, endpoint, "connecting");
        if let Err(e) = adapter.connect().await {
            warn!(robot = robot_type, error = %e, "connect failed");
            adapter.disconnect().await;
            return Err(e);
        }

        {
            let mut view = self.lock_view();
            view.robot_type = Some(robot_type.to_string());
            view.link = Some(adapter.link().clone());
            view.stop = adapter.stop_handle();
        }
        *slot = Some(ActiveRobot {
            robot_type: robot_type.to_string(),
            adapter,
        });
        drop(slot);

        info!(robot = robot_type, "connected");
        Ok(self.status())
    }

    /// Return to idle.  Aborts a running program, closes the adapter and
    /// zeroes the reported position.  Never fails.
    pub async fn disconnect(&self) {
        if self.runs.abort() {
            info!("program aborted by disconnect");
        }
        let mut slot = self.slot.lock().await;
        if let Some(mut active) = slot.take() {
            active.adapter.disconnect().await;
            info!(robot = %active.robot_type, "disconnected");
        }
        self.clear_view();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot of the active robot.  A link that dropped on its own reads
    /// as idle.
    pub fn status(&self) -> RobotStatus {
        let executing = self.runs.is_running();
        let mut view = self.lock_view();
        if let Some(link) = view.link.as_ref() {
            if link.is_connected() {
                return RobotStatus {
                    connected: true,
                    executing,
                    robot_type: view.robot_type.clone(),
                    position: link.position(),
                };
            }
            debug!(robot = ?view.robot_type, "link dropped; reporting idle");
            *view = RobotView::default();
        }
        RobotStatus {
            executing,
            ..RobotStatus::idle()
        }
    }

    pub fn current_position(&self) -> Position {
        self.status().position
    }

    pub fn is_executing(&self) -> bool {
        self.runs.is_running()
    }

    /// Successful transport writes made by the active adapter.
    pub fn sends(&self) -> usize {
        self.lock_view().link.as_ref().map_or(0, LinkState::sends)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Motion
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn home(&self) -> Result<Position, BridgeError> {
        self.refuse_during_run()?;
        let mut slot = self.slot.lock().await;
        let active = self.live(&mut slot).await?;
        active.adapter.home().await?;
        Ok(active.adapter.position())
    }

    pub async fn move_cartesian(
        &self,
        target: CartesianTarget,
        speed: f64,
    ) -> Result<Position, BridgeError> {
        self.refuse_during_run()?;
        let mut slot = self.slot.lock().await;
        let active = self.live(&mut slot).await?;
        active.adapter.move_cartesian(target, speed).await?;
        Ok(active.adapter.position())
    }

    pub async fn move_joint(
        &self,
        target: JointTarget,
        speed: f64,
    ) -> Result<Position, BridgeError> {
        self.refuse_during_run()?;
        let mut slot = self.slot.lock().await;
        let active = self.live(&mut slot).await?;
        active.adapter.move_joint(target, speed).await?;
        Ok(active.adapter.position())
    }

    /// Move `delta` along one Cartesian axis from the tracked pose.
    pub async fn jog(
        &self,
        axis: JogAxis,
        delta: f64,
        speed: f64,
    ) -> Result<Position, BridgeError> {
        self.refuse_during_run()?;
        let mut slot = self.slot.lock().await;
        let active = self.live(&mut slot).await?;
        let target = axis.offset(active.adapter.position().cartesian(), delta);
        debug!(%axis, delta, "jog");
        active.adapter.move_cartesian(target, speed).await?;
        Ok(active.adapter.position())
    }

    pub async fn set_end_effector(&self, engaged: bool) -> Result<(), BridgeError> {
        self.refuse_during_run()?;
        let mut slot = self.slot.lock().await;
        let active = self.live(&mut slot).await?;
        active.adapter.set_end_effector(engaged).await
    }

    /// Run an ad-hoc command such as `tool_activate`.
    pub async fn execute(
        &self,
        command: &str,
        params: &Value,
    ) -> Result<CommandOutcome, BridgeError> {
        self.refuse_during_run()?;
        let mut slot = self.slot.lock().await;
        let active = self.live(&mut slot).await?;
        dispatch::run_command(active.adapter.as_mut(), command, params).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Programs
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `program` step by step.
    ///
    /// Steps run strictly in order on the adapter slot, which the run keeps
    /// until it ends; the first failure ends the run.  An emergency stop
    /// ends it at the next step boundary or mid-step, whichever comes first.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::NotConnected`] / [`BridgeError::AlreadyExecuting`]
    ///   before any step runs.
    /// - [`BridgeError::ProgramStep`] wrapping the first failing step
    ///   (1-based).
    /// - [`BridgeError::Aborted`] after an emergency stop.
    pub async fn execute_program(&self, program: &Program) -> Result<ProgramReport, BridgeError> {
        if !self.status().connected {
            return Err(BridgeError::NotConnected);
        }
        // Registered before the slot is taken, so direct commands are
        // refused from here on.
        let run = self.runs.begin()?;
        let mut slot = self.slot.lock().await;
        if run.is_cancelled() {
            return Err(BridgeError::Aborted { step: 1 });
        }
        let active = self.live(&mut slot).await?;

        let started_at = Utc::now();
        let total = program.commands.len();
        info!(run_id = %run.id(), program = %program.name, steps = total, "program started");

        for (index, command) in program.commands.iter().enumerate() {
            let step = index + 1;
            debug!(run_id = %run.id(), step, kind = command.kind(), "step");

            let outcome = tokio::select! {
                biased;
                _ = run.cancelled() => Err(BridgeError::Aborted { step }),
                result = run_step(active.adapter.as_mut(), command) => result.map_err(|source| {
                    BridgeError::ProgramStep { step, source: Box::new(source) }
                }),
            };

            if let Err(e) = outcome {
                warn!(run_id = %run.id(), step, error = %e, "program ended early");
                return Err(e);
            }
        }

        info!(run_id = %run.id(), program = %program.name, "program finished");
        Ok(ProgramReport {
            run_id: run.id(),
            name: program.name.clone(),
            started_at,
            steps_completed: total,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Emergency stop
    // ─────────────────────────────────────────────────────────────────────────

    /// Abort any running program and send the adapter's stop instruction.
    ///
    /// Clears the executing flag before anything is sent.  Send failures are
    /// logged, never returned.
    pub async fn emergency_stop(&self) {
        let aborted = self.runs.abort();
        let (robot, stop) = {
            let view = self.lock_view();
            (view.robot_type.clone(), view.stop.clone())
        };

        match stop {
            Some(handle) => {
                warn!(robot = robot.as_deref().unwrap_or("?"), aborted, "EMERGENCY STOP");
                if let Err(e) = handle.send_stop().await {
                    error!(error = %e, "stop instruction was not delivered");
                }
            }
            None if aborted => warn!("program aborted; no stop path on the active robot"),
            None => debug!("emergency stop with no robot connected"),
        }
    }

    /// Direct commands may not interleave with a program's steps.
    fn refuse_during_run(&self) -> Result<(), BridgeError> {
        if self.runs.is_running() {
            return Err(BridgeError::AlreadyExecuting);
        }
        Ok(())
    }

    /// The active adapter, once any adapter whose link dropped is released.
    async fn live<'a>(
        &self,
        slot: &'a mut Option<ActiveRobot>,
    ) -> Result<&'a mut ActiveRobot, BridgeError> {
        self.release_dropped(slot).await;
        slot.as_mut().ok_or(BridgeError::NotConnected)
    }

    async fn release_dropped(&self, slot: &mut Option<ActiveRobot>) {
        if slot.as_ref().is_some_and(|active| !active.adapter.is_connected())
            && let Some(mut stale) = slot.take()
        {
            info!(robot = %stale.robot_type, "releasing adapter whose link dropped");
            stale.adapter.disconnect().await;
            self.clear_view();
        }
    }

    fn lock_view(&self) -> MutexGuard<'_, RobotView> {
        self.view
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_view(&self) {
        *self.lock_view() = RobotView::default();
    }
}

async fn run_step(
    adapter: &mut dyn RobotAdapter,
    command: &ProgramCommand,
) -> Result<(), BridgeError> {
    match command {
        ProgramCommand::Move { params, speed } => {
            adapter
                .move_cartesian(*params, speed.unwrap_or(DEFAULT_SPEED))
                .await
        }
        ProgramCommand::MoveJoint { params, speed } => {
            adapter
                .move_joint(*params, speed.unwrap_or(DEFAULT_SPEED))
                .await
        }
        ProgramCommand::Wait { params } => {
            tokio::time::sleep(Duration::from_millis(params.duration_ms)).await;
            Ok(())
        }
        ProgramCommand::Gripper { params } => adapter.set_end_effector(params.state).await,
        ProgramCommand::Home {} => adapter.home().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armbridge_hal::adapters::custom::{self, Journal, SimulatedArm};
    use armbridge_hal::adapters::{arduino, universal};
    use armbridge_hal::sim::{DuplexDialer, unpaced};
    use armbridge_hal::{AxisRange, PacingConfig, WorkspaceLimits};
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, Lines};

    /// Built-in registry whose arduino and universal adapters dial `dialer`.
    fn piped_registry(dialer: &DuplexDialer) -> AdapterRegistry {
        let mut registry = AdapterRegistry::builtin();
        let d = dialer.clone();
        registry.register(arduino::descriptor(), move |_port, config| {
            let adapter: Box<dyn RobotAdapter> =
                Box::new(arduino::with_dialer(Box::new(d.clone()), config));
            Ok(adapter)
        });
        let d = dialer.clone();
        registry.register(universal::descriptor(), move |_host, config| {
            let adapter: Box<dyn RobotAdapter> =
                Box::new(universal::with_dialer(Box::new(d.clone()), config));
            Ok(adapter)
        });
        registry
    }

    /// Built-in registry whose custom adapter reports its journal back.
    fn journaled_registry() -> (AdapterRegistry, Arc<Mutex<Option<Journal>>>) {
        let slot = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&slot);
        let mut registry = AdapterRegistry::builtin();
        registry.register(custom::descriptor(), move |_endpoint, config| {
            let arm = SimulatedArm::new(config);
            *sink.lock().unwrap() = Some(arm.journal());
            let adapter: Box<dyn RobotAdapter> = Box::new(arm);
            Ok(adapter)
        });
        (registry, slot)
    }

    fn journal(slot: &Arc<Mutex<Option<Journal>>>) -> Vec<String> {
        slot.lock().unwrap().as_ref().unwrap().entries()
    }

    /// Custom adapter config whose moves take `motion_ms`.
    fn slow(motion_ms: u64) -> AdapterConfig {
        AdapterConfig {
            pacing: PacingConfig {
                motion_ms: Some(motion_ms),
                ..PacingConfig::default()
            },
            ..AdapterConfig::default()
        }
    }

    fn device_lines(peer: DuplexStream) -> Lines<BufReader<DuplexStream>> {
        BufReader::new(peer).lines()
    }

    fn moves(n: usize) -> Program {
        Program {
            name: "moves".to_string(),
            commands: (0..n)
                .map(|i| ProgramCommand::Move {
                    params: CartesianTarget::new(i as f64, 0.0, 100.0, 0.0),
                    speed: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn idle_manager_reports_idle_status() {
        let manager = RobotManager::with_builtin_adapters();
        assert_eq!(manager.status(), RobotStatus::idle());
        assert_eq!(manager.list_robot_types().len(), 6);
    }

    #[tokio::test]
    async fn commands_fail_while_idle() {
        let manager = RobotManager::with_builtin_adapters();
        assert_eq!(manager.home().await.err(), Some(BridgeError::NotConnected));
        assert_eq!(
            manager.execute("tool_activate", &Value::Null).await.err(),
            Some(BridgeError::NotConnected)
        );
        manager.emergency_stop().await;
    }

    #[tokio::test]
    async fn jog_moves_relative_to_tracked_pose() {
        let manager = RobotManager::with_builtin_adapters();
        manager.connect("custom", "", &unpaced()).await.unwrap();
        manager
            .move_cartesian(CartesianTarget::new(100.0, 0.0, 150.0, 0.0), 50.0)
            .await
            .unwrap();

        let pos = manager.jog(JogAxis::Z, -25.0, 50.0).await.unwrap();
        assert_eq!((pos.x, pos.z), (100.0, 125.0));
        assert_eq!(manager.current_position().z, 125.0);
    }

    #[tokio::test]
    async fn unknown_type_leaves_manager_idle() {
        let manager = RobotManager::with_builtin_adapters();
        let err = manager
            .connect("fanuc", "10.0.0.1", &AdapterConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownRobotType { .. }));
        assert_eq!(manager.status(), RobotStatus::idle());
    }

    #[tokio::test]
    async fn arduino_session_over_serial_pipe() {
        let (dialer, peer) = DuplexDialer::pair();
        let manager = RobotManager::new(piped_registry(&dialer));

        let status = manager.connect("arduino", "COM7", &unpaced()).await.unwrap();
        assert!(status.connected);
        manager.home().await.unwrap();
        manager
            .move_cartesian(CartesianTarget::new(100.0, 50.0, 150.0, 0.0), 50.0)
            .await
            .unwrap();

        let status = manager.status();
        assert!(status.connected);
        assert!(!status.executing);
        assert_eq!(status.robot_type.as_deref(), Some("arduino"));
        assert_eq!(
            status.position,
            Position {
                x: 100.0,
                y: 50.0,
                z: 150.0,
                ..Position::ZERO
            }
        );

        let mut lines = device_lines(peer);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "INIT");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "HOME");
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "MOVE 100 50 150 0 50"
        );
    }

    #[tokio::test]
    async fn second_connect_is_rejected_and_first_survives() {
        let manager = RobotManager::with_builtin_adapters();
        manager.connect("custom", "", &unpaced()).await.unwrap();

        let err = manager
            .connect("custom", "", &unpaced())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::AlreadyConnected {
                robot_type: "custom".to_string()
            }
        );
        assert!(manager.status().connected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let manager = RobotManager::with_builtin_adapters();
        manager.connect("custom", "", &unpaced()).await.unwrap();
        manager
            .move_cartesian(CartesianTarget::new(1.0, 2.0, 3.0, 0.0), 50.0)
            .await
            .unwrap();

        manager.disconnect().await;
        assert_eq!(manager.status(), RobotStatus::idle());
        manager.disconnect().await;
        assert_eq!(manager.status(), RobotStatus::idle());
    }

    #[tokio::test]
    async fn failed_connect_stays_idle_and_can_retry() {
        let dialer = DuplexDialer::default();
        let manager = RobotManager::new(piped_registry(&dialer));

        let err = manager
            .connect("arduino", "COM7", &unpaced())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Connection { .. }));
        assert_eq!(manager.status(), RobotStatus::idle());

        let _peer = dialer.add_peer();
        assert!(manager.connect("arduino", "COM7", &unpaced()).await.is_ok());
    }

    #[tokio::test]
    async fn tool_activate_on_gripper_only_robot() {
        let (dialer, peer) = DuplexDialer::pair();
        let manager = RobotManager::new(piped_registry(&dialer));
        manager
            .connect("universal", "10.0.0.9", &unpaced())
            .await
            .unwrap();

        let outcome = manager.execute("tool_activate", &json!({})).await.unwrap();
        assert_eq!(outcome.message, "Gripper activated");

        let mut lines = device_lines(peer);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "set_digital_out(0, True)"
        );
    }

    #[tokio::test]
    async fn limit_violation_sends_nothing() {
        let manager = RobotManager::with_builtin_adapters();
        manager.connect("custom", "", &unpaced()).await.unwrap();
        let before = manager.sends();

        let err = manager
            .move_cartesian(CartesianTarget::new(0.0, 0.0, 5000.0, 0.0), 50.0)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::LimitViolation { ref axis, .. } if axis == "z"));
        assert_eq!(manager.sends(), before);
        assert_eq!(manager.current_position(), Position::ZERO);
    }

    #[tokio::test]
    async fn program_steps_run_in_order() {
        let (registry, journal_slot) = journaled_registry();
        let manager = RobotManager::new(registry);
        manager.connect("custom", "", &unpaced()).await.unwrap();

        let program: Program = serde_json::from_value(json!({
            "name": "pick",
            "commands": [
                { "type": "home" },
                { "type": "move", "params": { "x": 100, "y": 50, "z": 150, "r": 0 }, "speed": 40 },
                { "type": "gripper", "params": { "state": true } },
                { "type": "wait", "params": { "duration": 10 } },
                { "type": "moveJoint", "params": { "j1": 10, "j2": 20, "j3": 30, "j4": 0 } }
            ]
        }))
        .unwrap();

        let report = manager.execute_program(&program).await.unwrap();
        assert_eq!(report.name, "pick");
        assert_eq!(report.steps_completed, 5);
        assert!(!manager.is_executing());
        assert_eq!(
            journal(&journal_slot),
            vec![
                "home",
                "move 100 50 150 0 @40",
                "gripper closed",
                "joint 10 20 30 0 @50"
            ]
        );
    }

    #[tokio::test]
    async fn failing_step_stops_program_and_names_step() {
        let (registry, journal_slot) = journaled_registry();
        let manager = RobotManager::new(registry);
        manager.connect("custom", "", &unpaced()).await.unwrap();

        let mut program = moves(4);
        program.commands[1] = ProgramCommand::Move {
            params: CartesianTarget::new(0.0, 0.0, 9999.0, 0.0),
            speed: None,
        };

        let err = manager.execute_program(&program).await.unwrap_err();
        match err {
            BridgeError::ProgramStep { step, source } => {
                assert_eq!(step, 2);
                assert!(matches!(*source, BridgeError::LimitViolation { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(journal(&journal_slot).len(), 1);
        assert!(!manager.is_executing());

        let report = manager.execute_program(&moves(2)).await.unwrap();
        assert_eq!(report.steps_completed, 2);
    }

    #[tokio::test]
    async fn program_requires_connection() {
        let manager = RobotManager::with_builtin_adapters();
        let err = manager.execute_program(&moves(1)).await.unwrap_err();
        assert_eq!(err, BridgeError::NotConnected);
    }

    #[tokio::test]
    async fn concurrent_program_is_rejected() {
        let manager = Arc::new(RobotManager::with_builtin_adapters());
        manager.connect("custom", "", &slow(200)).await.unwrap();

        let runner = Arc::clone(&manager);
        let first = tokio::spawn(async move { runner.execute_program(&moves(2)).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(manager.status().executing);
        let err = manager.execute_program(&moves(1)).await.unwrap_err();
        assert_eq!(err, BridgeError::AlreadyExecuting);

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.steps_completed, 2);
        assert!(!manager.is_executing());
    }

    #[tokio::test]
    async fn emergency_stop_aborts_running_program() {
        let (registry, journal_slot) = journaled_registry();
        let manager = Arc::new(RobotManager::new(registry));
        manager.connect("custom", "", &slow(300)).await.unwrap();

        let runner = Arc::clone(&manager);
        let run = tokio::spawn(async move { runner.execute_program(&moves(3)).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.emergency_stop().await;
        assert!(!manager.status().executing);

        let err = run.await.unwrap().unwrap_err();
        assert_eq!(err, BridgeError::Aborted { step: 1 });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(journal(&journal_slot), vec!["move 0 0 100 0 @50", "stop"]);
        assert!(manager.status().connected);
    }

    #[tokio::test]
    async fn direct_commands_are_refused_while_program_runs() {
        let (registry, journal_slot) = journaled_registry();
        let manager = Arc::new(RobotManager::new(registry));
        manager.connect("custom", "", &unpaced()).await.unwrap();

        let program: Program = serde_json::from_value(json!({
            "name": "paced",
            "commands": [
                { "type": "move", "params": { "x": 1, "y": 0, "z": 10, "r": 0 } },
                { "type": "wait", "params": { "duration": 300 } },
                { "type": "move", "params": { "x": 2, "y": 0, "z": 10, "r": 0 } }
            ]
        }))
        .unwrap();
        let runner = Arc::clone(&manager);
        let run = tokio::spawn(async move { runner.execute_program(&program).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = manager
            .move_cartesian(CartesianTarget::new(99.0, 0.0, 10.0, 0.0), 50.0)
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::AlreadyExecuting);
        assert_eq!(manager.home().await.err(), Some(BridgeError::AlreadyExecuting));
        assert_eq!(
            manager.execute("tool_activate", &json!({})).await.err(),
            Some(BridgeError::AlreadyExecuting)
        );
        assert_eq!(
            manager.set_end_effector(true).await.err(),
            Some(BridgeError::AlreadyExecuting)
        );

        assert_eq!(run.await.unwrap().unwrap().steps_completed, 3);
        assert_eq!(
            journal(&journal_slot),
            vec!["move 1 0 10 0 @50", "move 2 0 10 0 @50"]
        );
        assert!(manager.home().await.is_ok());
    }

    #[tokio::test]
    async fn emergency_stop_follows_a_half_written_line_whole() {
        let dialer = DuplexDialer::with_capacity(8);
        let peer = dialer.add_peer();
        let manager = Arc::new(RobotManager::new(piped_registry(&dialer)));
        manager.connect("arduino", "COM7", &unpaced()).await.unwrap();

        let program = Program {
            name: "reach".to_string(),
            commands: vec![ProgramCommand::Move {
                params: CartesianTarget::new(100.0, 50.0, 150.0, 0.0),
                speed: None,
            }],
        };
        let runner = Arc::clone(&manager);
        let run = tokio::spawn(async move { runner.execute_program(&program).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The device has not read yet, so the move line is stuck mid-write.
        let stopper = Arc::clone(&manager);
        let stop = tokio::spawn(async move { stopper.emergency_stop().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut lines = device_lines(peer);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "INIT");
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "MOVE 100 50 150 0 50"
        );
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "STOP");

        stop.await.unwrap();
        assert_eq!(run.await.unwrap().unwrap_err(), BridgeError::Aborted { step: 1 });
        assert!(!manager.is_executing());
    }

    #[tokio::test]
    async fn emergency_stop_does_not_wait_for_motion() {
        let manager = Arc::new(RobotManager::with_builtin_adapters());
        manager.connect("custom", "", &slow(2_000)).await.unwrap();

        let mover = Arc::clone(&manager);
        let motion = tokio::spawn(async move {
            mover
                .move_cartesian(CartesianTarget::new(1.0, 1.0, 1.0, 0.0), 50.0)
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stopped =
            tokio::time::timeout(Duration::from_millis(500), manager.emergency_stop()).await;
        assert!(stopped.is_ok());
        assert!(manager.status().connected);
        motion.abort();
    }

    #[tokio::test]
    async fn peer_close_drops_to_idle_and_allows_reconnect() {
        let (dialer, peer) = DuplexDialer::pair();
        let manager = RobotManager::new(piped_registry(&dialer));
        manager.connect("arduino", "COM7", &unpaced()).await.unwrap();

        manager
            .move_cartesian(CartesianTarget::new(10.0, 0.0, 100.0, 0.0), 50.0)
            .await
            .unwrap();

        drop(peer);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.status(), RobotStatus::idle());
        assert_eq!(manager.current_position(), Position::ZERO);
        assert_eq!(manager.home().await.err(), Some(BridgeError::NotConnected));

        let _peer = dialer.add_peer();
        let status = manager.connect("arduino", "COM7", &unpaced()).await.unwrap();
        assert!(status.connected);
    }

    #[tokio::test]
    async fn custom_limits_from_config_apply() {
        let manager = RobotManager::with_builtin_adapters();
        let config = AdapterConfig {
            limits: Some(WorkspaceLimits::reach(50.0, AxisRange::new(0.0, 50.0), 90.0)),
            ..unpaced()
        };
        manager.connect("custom", "", &config).await.unwrap();
        assert!(manager
            .move_cartesian(CartesianTarget::new(60.0, 0.0, 10.0, 0.0), 50.0)
            .await
            .is_err());
        assert!(manager
            .move_joint(JointTarget::new(45.0, 0.0, 0.0, 0.0), 50.0)
            .await
            .is_ok());
    }
}
