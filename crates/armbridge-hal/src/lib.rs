//! `armbridge-hal` – vendor adapters behind one contract.
//!
//! The rest of the workspace talks only to [`RobotAdapter`] and asks the
//! [`AdapterRegistry`] for new instances, so adding a controller family
//! never touches the manager or the CLI.
//!
//! # Modules
//!
//! - [`adapter`] – the adapter contract and optional capability traits.
//! - [`adapters`] – built-in families (Dobot, UR, ABB, KUKA, Arduino, custom).
//! - [`transport`] – TCP/serial dialers and the line-framed link.
//! - [`bridge`] – request/reply channel to an out-of-process vendor SDK.
//! - [`registry`] – robot type id → factory.
//! - [`limits`] – workspace envelopes and speed mapping.
//! - [`sim`] – in-memory transports for tests and dry runs.

pub mod adapter;
pub mod adapters;
pub mod bridge;
pub mod config;
pub mod limits;
pub mod link;
pub mod registry;
pub mod sim;
pub mod transport;

pub use adapter::{
    Capability, EmergencyStop, GripperControl, PenControl, RawCommand, RobotAdapter, ToolControl,
};
pub use config::{AdapterConfig, CommandFormat, Pacing, PacingConfig};
pub use limits::{AxisRange, WorkspaceLimits};
pub use link::LinkState;
pub use registry::{AdapterFactory, AdapterRegistry};
