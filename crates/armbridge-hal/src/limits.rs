//! Workspace limits and speed mapping.
//!
//! Every adapter validates a requested pose against its [`WorkspaceLimits`]
//! before encoding anything, so an out-of-range move never reaches the
//! wire.  Limits are adapter-specific: each family ships defaults, and the
//! `[adapters.<id>.limits]` config table may replace them.

use armbridge_types::{BridgeError, CartesianTarget, DEFAULT_SPEED};
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` range for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `[-limit, limit]`.
    pub const fn symmetric(limit: f64) -> Self {
        Self {
            min: -limit,
            max: limit,
        }
    }

    /// Reject non-finite values and values outside the range.
    pub fn check(&self, axis: &str, value: f64) -> Result<(), BridgeError> {
        if value.is_finite() && value >= self.min && value <= self.max {
            Ok(())
        } else {
            Err(BridgeError::LimitViolation {
                axis: axis.to_string(),
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

const JOINT_NAMES: [&str; 6] = ["j1", "j2", "j3", "j4", "j5", "j6"];

/// Cartesian and joint envelope of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceLimits {
    pub x: AxisRange,
    pub y: AxisRange,
    pub z: AxisRange,
    pub r: AxisRange,
    pub joints: [AxisRange; 6],
}

impl WorkspaceLimits {
    /// Symmetric Cartesian reach with a floor/ceiling on `z` and the same
    /// range on every joint.
    pub const fn reach(reach: f64, z: AxisRange, joint: f64) -> Self {
        Self {
            x: AxisRange::symmetric(reach),
            y: AxisRange::symmetric(reach),
            z,
            r: AxisRange::symmetric(180.0),
            joints: [AxisRange::symmetric(joint); 6],
        }
    }

    pub fn check_cartesian(&self, target: &CartesianTarget) -> Result<(), BridgeError> {
        self.x.check("x", target.x)?;
        self.y.check("y", target.y)?;
        self.z.check("z", target.z)?;
        self.r.check("r", target.r)
    }

    /// Check the first `angles.len()` joints (at most six).
    pub fn check_joints(&self, angles: &[f64]) -> Result<(), BridgeError> {
        for ((range, name), value) in self.joints.iter().zip(JOINT_NAMES).zip(angles) {
            range.check(name, *value)?;
        }
        Ok(())
    }
}

/// Clamp a 0–100 speed request; NaN falls back to the default speed.
pub fn clamp_speed(percent: f64) -> f64 {
    if percent.is_nan() {
        DEFAULT_SPEED
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Map a 0–100 speed onto `[0, max]` in a protocol's native unit.
pub fn scale_speed(percent: f64, max: f64) -> f64 {
    clamp_speed(percent) / 100.0 * max
}
