//! Per-adapter configuration.
//!
//! An [`AdapterConfig`] is what the CLI reads from an
//! `[adapters.<id>]` table of `~/.armbridge/config.toml` and passes to the
//! registry factory alongside the endpoint string.  Every field is optional;
//! each adapter family supplies its own defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::limits::WorkspaceLimits;

/// Connect timeout applied when the config does not set one.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Wire dialect spoken by the Arduino firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFormat {
    /// `MOVE x y z r speed`
    #[default]
    Simple,
    /// `G1 X.. Y.. Z.. F..`
    Gcode,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub baud_rate: Option<u32>,
    pub command_format: CommandFormat,
    pub connect_timeout_ms: Option<u64>,
    pub pacing: PacingConfig,
    /// Replaces the family's default envelope when set.
    pub limits: Option<WorkspaceLimits>,
    /// Interpreter used to run the vendor SDK bridge script.
    pub sdk_program: Option<String>,
    pub sdk_script: Option<String>,
}

impl AdapterConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.connect_timeout_ms
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }
}

/// Optional overrides for [`Pacing`], in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub ack_ms: Option<u64>,
    pub motion_ms: Option<u64>,
    pub home_ms: Option<u64>,
    pub boot_ms: Option<u64>,
}

/// Fixed delays that stand in for device acknowledgements.
///
/// None of the supported controllers report motion completion on the line
/// the adapters listen to, so each adapter sleeps for a family-specific
/// interval after writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After every successful write.
    pub ack: Duration,
    /// After a Cartesian or joint move.
    pub motion: Duration,
    /// After a homing command.
    pub home: Duration,
    /// Between opening the link and sending the init line.
    pub boot: Duration,
}

impl Pacing {
    pub const fn from_millis(ack: u64, motion: u64, home: u64, boot: u64) -> Self {
        Self {
            ack: Duration::from_millis(ack),
            motion: Duration::from_millis(motion),
            home: Duration::from_millis(home),
            boot: Duration::from_millis(boot),
        }
    }

    pub const fn immediate() -> Self {
        Self::from_millis(0, 0, 0, 0)
    }

    pub fn with_overrides(self, overrides: &PacingConfig) -> Self {
        let pick = |set: Option<u64>, default: Duration| set.map_or(default, Duration::from_millis);
        Self {
            ack: pick(overrides.ack_ms, self.ack),
            motion: pick(overrides.motion_ms, self.motion),
            home: pick(overrides.home_ms, self.home),
            boot: pick(overrides.boot_ms, self.boot),
        }
    }
}

/// Sleep for `delay`, skipping the timer entirely when it is zero.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
