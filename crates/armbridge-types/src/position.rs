//! Cartesian + joint-space position model with partial-merge updates.
//!
//! A [`Position`] is never reset implicitly: applying a [`PositionUpdate`]
//! overwrites only the axes the update names, so an adapter that tracks
//! Cartesian axes does not clobber the last-known joint angles (and vice
//! versa).

use serde::{Deserialize, Serialize};

/// Last-known pose of the robot.
///
/// Cartesian axes are in device units (typically millimetres, `r` in
/// degrees); joint axes are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: f64,
    pub j1: f64,
    pub j2: f64,
    pub j3: f64,
    pub j4: f64,
    pub j5: f64,
    pub j6: f64,
}

impl Position {
    pub const ZERO: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        r: 0.0,
        j1: 0.0,
        j2: 0.0,
        j3: 0.0,
        j4: 0.0,
        j5: 0.0,
        j6: 0.0,
    };

    /// Overwrite the axes named in `update`, leaving every other axis as-is.
    pub fn merge(&mut self, update: &PositionUpdate) {
        let slots = [
            (&mut self.x, update.x),
            (&mut self.y, update.y),
            (&mut self.z, update.z),
            (&mut self.r, update.r),
            (&mut self.j1, update.j1),
            (&mut self.j2, update.j2),
            (&mut self.j3, update.j3),
            (&mut self.j4, update.j4),
            (&mut self.j5, update.j5),
            (&mut self.j6, update.j6),
        ];
        for (slot, value) in slots {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }

    /// By-value form of [`Position::merge`].
    pub fn merged(mut self, update: &PositionUpdate) -> Self {
        self.merge(update);
        self
    }

    pub fn cartesian(&self) -> CartesianTarget {
        CartesianTarget {
            x: self.x,
            y: self.y,
            z: self.z,
            r: self.r,
        }
    }
}

/// Sparse update: `None` means "leave this axis alone".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j4: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j5: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j6: Option<f64>,
}

impl PositionUpdate {
    /// Update that sets all six joints.
    pub fn joints(j: [f64; 6]) -> Self {
        Self {
            j1: Some(j[0]),
            j2: Some(j[1]),
            j3: Some(j[2]),
            j4: Some(j[3]),
            j5: Some(j[4]),
            j6: Some(j[5]),
            ..Self::default()
        }
    }

    /// Combine two updates; axes set in `other` win.
    pub fn and(self, other: PositionUpdate) -> Self {
        Self {
            x: other.x.or(self.x),
            y: other.y.or(self.y),
            z: other.z.or(self.z),
            r: other.r.or(self.r),
            j1: other.j1.or(self.j1),
            j2: other.j2.or(self.j2),
            j3: other.j3.or(self.j3),
            j4: other.j4.or(self.j4),
            j5: other.j5.or(self.j5),
            j6: other.j6.or(self.j6),
        }
    }
}

/// Requested Cartesian pose.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartesianTarget {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub r: f64,
}

impl CartesianTarget {
    pub fn new(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self { x, y, z, r }
    }
}

impl From<CartesianTarget> for PositionUpdate {
    fn from(t: CartesianTarget) -> Self {
        Self {
            x: Some(t.x),
            y: Some(t.y),
            z: Some(t.z),
            r: Some(t.r),
            ..Self::default()
        }
    }
}

/// Requested joint angles in degrees.
///
/// Four-axis controllers only read `j1..j4`; six-axis controllers fill a
/// missing `j5`/`j6` from the last-known position (see
/// [`JointTarget::six_axis`]).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointTarget {
    #[serde(default)]
    pub j1: f64,
    #[serde(default)]
    pub j2: f64,
    #[serde(default)]
    pub j3: f64,
    #[serde(default)]
    pub j4: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j5: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j6: Option<f64>,
}

impl JointTarget {
    pub fn new(j1: f64, j2: f64, j3: f64, j4: f64) -> Self {
        Self {
            j1,
            j2,
            j3,
            j4,
            j5: None,
            j6: None,
        }
    }

    pub fn with_wrist(mut self, j5: f64, j6: f64) -> Self {
        self.j5 = Some(j5);
        self.j6 = Some(j6);
        self
    }

    /// All six angles, taking unspecified wrist joints from `current`.
    pub fn six_axis(&self, current: &Position) -> [f64; 6] {
        [
            self.j1,
            self.j2,
            self.j3,
            self.j4,
            self.j5.unwrap_or(current.j5),
            self.j6.unwrap_or(current.j6),
        ]
    }
}

impl From<JointTarget> for PositionUpdate {
    fn from(t: JointTarget) -> Self {
        Self {
            j1: Some(t.j1),
            j2: Some(t.j2),
            j3: Some(t.j3),
            j4: Some(t.j4),
            j5: t.j5,
            j6: t.j6,
            ..Self::default()
        }
    }
}
