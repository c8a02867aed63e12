//! Built-in adapter families.
//!
//! | id          | transport              | end effector |
//! |-------------|------------------------|--------------|
//! | `dobot`     | vendor SDK bridge      | pen          |
//! | `universal` | TCP, URScript          | gripper      |
//! | `abb`       | TCP, RAPID             | gripper      |
//! | `kuka`      | TCP, KRL               | gripper      |
//! | `arduino`   | serial, line protocol  | gripper      |
//! | `custom`    | none (simulated)       | named tools  |

pub mod abb;
pub mod arduino;
pub mod custom;
pub mod dobot;
pub mod kuka;
pub mod line_arm;
pub mod universal;

use crate::config::AdapterConfig;
use crate::transport::{Dialer, TcpDialer};

/// TCP dialer for `endpoint`, falling back to the config and then to the
/// family defaults for whatever the endpoint leaves out.
fn tcp_dialer(
    endpoint: &str,
    config: &AdapterConfig,
    default_host: &str,
    default_port: u16,
) -> Box<dyn Dialer> {
    Box::new(TcpDialer::resolve(
        endpoint,
        config.host.as_deref().unwrap_or(default_host),
        config.port.unwrap_or(default_port),
    ))
}
