//! ABB IRC5 / OmniCore controllers driven by a RAPID socket server.
//!
//! Each instruction is one RAPID statement.  Cartesian targets use a fixed
//! identity orientation; `r` is tracked but not encoded.

use armbridge_types::{AdapterDescriptor, BridgeError, CartesianTarget, PositionUpdate};

use super::line_arm::{Dialect, LineArm};
use super::tcp_dialer;
use crate::adapter::RobotAdapter;
use crate::config::{AdapterConfig, Pacing};
use crate::limits::{AxisRange, WorkspaceLimits};
use crate::transport::Dialer;

pub const ID: &str = "abb";
pub const DEFAULT_HOST: &str = "192.168.125.1";
pub const DEFAULT_PORT: u16 = 5000;

const EXTERNAL_AXES: &str = "[9E9,9E9,9E9,9E9,9E9,9E9]";

pub fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor::new(
        ID,
        "ABB Robot (IRC5/OmniCore)",
        "ABB industrial robots with RAPID programming language",
    )
}

pub fn create(endpoint: &str, config: &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> {
    let dialer = tcp_dialer(endpoint, config, DEFAULT_HOST, DEFAULT_PORT);
    Ok(Box::new(with_dialer(dialer, config)))
}

pub fn with_dialer(dialer: Box<dyn Dialer>, config: &AdapterConfig) -> LineArm<Rapid> {
    LineArm::new(ID, Rapid, dialer, config)
}

/// RAPID speed data: `v10` … `v1000`.
fn speed_data(speed: f64) -> String {
    format!("v{}", (speed * 10.0).round().max(10.0) as u32)
}

pub struct Rapid;

impl Dialect for Rapid {
    fn default_limits(&self) -> WorkspaceLimits {
        WorkspaceLimits::reach(2000.0, AxisRange::new(-500.0, 2500.0), 360.0)
    }

    fn default_pacing(&self) -> Pacing {
        Pacing::from_millis(100, 1000, 3000, 0)
    }

    fn home_line(&self) -> String {
        format!("MoveAbsJ [[0,0,0,0,0,0],{EXTERNAL_AXES}],v1000,fine,tool0;")
    }

    fn home_pose(&self) -> PositionUpdate {
        PositionUpdate::joints([0.0; 6])
    }

    fn linear_line(&self, t: &CartesianTarget, speed: f64) -> String {
        format!(
            "MoveL [[{},{},{}],[1,0,0,0],[0,0,0,0],{EXTERNAL_AXES}],{},fine,tool0;",
            t.x,
            t.y,
            t.z,
            speed_data(speed)
        )
    }

    fn joint_line(&self, j: &[f64; 6], speed: f64) -> String {
        format!(
            "MoveAbsJ [[{},{},{},{},{},{}],{EXTERNAL_AXES}],{},fine,tool0;",
            j[0],
            j[1],
            j[2],
            j[3],
            j[4],
            j[5],
            speed_data(speed)
        )
    }

    fn end_effector_line(&self, engaged: bool) -> String {
        format!("SetDO DO10_1, {};", u8::from(engaged))
    }

    fn stop_line(&self) -> String {
        "Stop;".to_string()
    }
}
