//! KUKA KR / iiwa controllers reached through a KRL proxy.
//!
//! KRL motion statements carry no per-move velocity; the controller's
//! programmed override applies, so the requested speed is ignored.

use armbridge_types::{AdapterDescriptor, BridgeError, CartesianTarget, PositionUpdate};

use super::line_arm::{Dialect, LineArm};
use super::tcp_dialer;
use crate::adapter::RobotAdapter;
use crate::config::{AdapterConfig, Pacing};
use crate::limits::{AxisRange, WorkspaceLimits};
use crate::transport::Dialer;

pub const ID: &str = "kuka";
pub const DEFAULT_HOST: &str = "192.168.1.1";
pub const DEFAULT_PORT: u16 = 59152;

pub fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor::new(
        ID,
        "KUKA Robot (KR/iiwa)",
        "KUKA industrial robots with KRL programming",
    )
}

pub fn create(endpoint: &str, config: &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> {
    let dialer = tcp_dialer(endpoint, config, DEFAULT_HOST, DEFAULT_PORT);
    Ok(Box::new(with_dialer(dialer, config)))
}

pub fn with_dialer(dialer: Box<dyn Dialer>, config: &AdapterConfig) -> LineArm<Krl> {
    LineArm::new(ID, Krl, dialer, config)
}

pub struct Krl;

impl Dialect for Krl {
    fn default_limits(&self) -> WorkspaceLimits {
        WorkspaceLimits::reach(2500.0, AxisRange::new(-1000.0, 3000.0), 360.0)
    }

    fn default_pacing(&self) -> Pacing {
        Pacing::from_millis(100, 1000, 3000, 0)
    }

    fn home_line(&self) -> String {
        "PTP {A1 0, A2 -90, A3 90, A4 0, A5 90, A6 0}".to_string()
    }

    fn home_pose(&self) -> PositionUpdate {
        PositionUpdate::joints([0.0, -90.0, 90.0, 0.0, 90.0, 0.0])
    }

    fn linear_line(&self, t: &CartesianTarget, _speed: f64) -> String {
        format!("LIN {{X {}, Y {}, Z {}, A 0, B 0, C {}}}", t.x, t.y, t.z, t.r)
    }

    fn joint_line(&self, j: &[f64; 6], _speed: f64) -> String {
        format!(
            "PTP {{A1 {}, A2 {}, A3 {}, A4 {}, A5 {}, A6 {}}}",
            j[0], j[1], j[2], j[3], j[4], j[5]
        )
    }

    fn end_effector_line(&self, engaged: bool) -> String {
        format!("$OUT[1]={}", if engaged { "TRUE" } else { "FALSE" })
    }

    fn stop_line(&self) -> String {
        "HALT".to_string()
    }
}
