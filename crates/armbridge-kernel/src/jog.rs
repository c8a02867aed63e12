//! Relative Cartesian nudges.

use std::fmt;
use std::str::FromStr;

use armbridge_types::{BridgeError, CartesianTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogAxis {
    X,
    Y,
    Z,
    R,
}

impl JogAxis {
    /// `from` with `delta` added on this axis.
    pub fn offset(self, from: CartesianTarget, delta: f64) -> CartesianTarget {
        let mut target = from;
        match self {
            JogAxis::X => target.x += delta,
            JogAxis::Y => target.y += delta,
            JogAxis::Z => target.z += delta,
            JogAxis::R => target.r += delta,
        }
        target
    }
}

impl FromStr for JogAxis {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(JogAxis::X),
            "y" => Ok(JogAxis::Y),
            "z" => Ok(JogAxis::Z),
            "r" => Ok(JogAxis::R),
            other => Err(BridgeError::InvalidCommand(format!(
                "unknown jog axis '{other}' (expected x, y, z or r)"
            ))),
        }
    }
}

impl fmt::Display for JogAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = match self {
            JogAxis::X => "x",
            JogAxis::Y => "y",
            JogAxis::Z => "z",
            JogAxis::R => "r",
        };
        f.write_str(axis)
    }
}
