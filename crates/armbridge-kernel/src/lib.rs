//! `armbridge-kernel` – orchestration over the active robot.
//!
//! # Modules
//!
//! - [`manager`] – [`RobotManager`]: owns at most one connected adapter,
//!   serialises robot commands, runs programs and delivers the emergency
//!   stop without waiting behind an in-flight command.
//! - [`dispatch`] – maps ad-hoc commands such as `tool_activate` onto
//!   adapter capabilities.
//! - [`run`] – [`RunTracker`]: the single-run rule and run cancellation.
//! - [`jog`] – relative single-axis moves.
//! - [`discovery`] – serial port listing and network scan.

pub mod discovery;
pub mod dispatch;
pub mod jog;
pub mod manager;
pub mod run;

pub use discovery::{DiscoveredRobot, SerialPortEntry, list_serial_ports, scan_network};
pub use dispatch::TOOL_PROBE_ORDER;
pub use jog::JogAxis;
pub use manager::RobotManager;
pub use run::RunTracker;
