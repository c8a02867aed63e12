//! Universal Robots (UR3/UR5/UR10) over the secondary URScript interface.
//!
//! URScript poses are in metres and radians.  Positions handed to this
//! adapter are millimetres and degrees like every other adapter, so the
//! encoders convert on the way out.

use armbridge_types::{AdapterDescriptor, BridgeError, CartesianTarget, PositionUpdate};

use super::line_arm::{Dialect, LineArm};
use super::tcp_dialer;
use crate::adapter::RobotAdapter;
use crate::config::{AdapterConfig, Pacing};
use crate::limits::{AxisRange, WorkspaceLimits, scale_speed};
use crate::transport::Dialer;

pub const ID: &str = "universal";
pub const DEFAULT_HOST: &str = "192.168.1.1";
pub const DEFAULT_PORT: u16 = 30002;

const ACCELERATION: f64 = 1.2;

/// Joint pose used for homing, in degrees.
const HOME_JOINTS: [f64; 6] = [0.0, -90.0, 0.0, -90.0, 0.0, 0.0];

pub fn descriptor() -> AdapterDescriptor {
    AdapterDescriptor::new(
        ID,
        "Universal Robots",
        "UR3, UR5, UR10 collaborative robots via URScript",
    )
}

pub fn create(endpoint: &str, config: &AdapterConfig) -> Result<Box<dyn RobotAdapter>, BridgeError> {
    let dialer = tcp_dialer(endpoint, config, DEFAULT_HOST, DEFAULT_PORT);
    Ok(Box::new(with_dialer(dialer, config)))
}

pub fn with_dialer(dialer: Box<dyn Dialer>, config: &AdapterConfig) -> LineArm<UrScript> {
    LineArm::new(ID, UrScript, dialer, config)
}

fn joint_list(degrees: &[f64; 6]) -> String {
    let radians: Vec<String> = degrees
        .iter()
        .map(|d| format!("{:.4}", d.to_radians()))
        .collect();
    format!("[{}]", radians.join(", "))
}

pub struct UrScript;

impl Dialect for UrScript {
    fn default_limits(&self) -> WorkspaceLimits {
        WorkspaceLimits::reach(1300.0, AxisRange::new(-1300.0, 1300.0), 360.0)
    }

    fn default_pacing(&self) -> Pacing {
        Pacing::from_millis(100, 0, 0, 0)
    }

    fn home_line(&self) -> String {
        format!("movej({}, a={ACCELERATION}, v=0.25)", joint_list(&HOME_JOINTS))
    }

    fn home_pose(&self) -> PositionUpdate {
        PositionUpdate::joints(HOME_JOINTS)
    }

    fn linear_line(&self, t: &CartesianTarget, speed: f64) -> String {
        format!(
            "movel(p[{}, {}, {}, {:.4}, 0, 0], a={ACCELERATION}, v={})",
            t.x / 1000.0,
            t.y / 1000.0,
            t.z / 1000.0,
            t.r.to_radians(),
            scale_speed(speed, 1.0)
        )
    }

    fn joint_line(&self, j: &[f64; 6], speed: f64) -> String {
        format!(
            "movej({}, a={ACCELERATION}, v={})",
            joint_list(j),
            scale_speed(speed, 1.0)
        )
    }

    fn end_effector_line(&self, engaged: bool) -> String {
        format!(
            "set_digital_out(0, {})",
            if engaged { "True" } else { "False" }
        )
    }

    fn stop_line(&self) -> String {
        "stopj(2.0)".to_string()
    }
}
