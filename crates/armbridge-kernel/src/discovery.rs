//! Finding robots to connect to.
//!
//! Serial ports come from the operating system.  Network discovery is not
//! implemented yet; [`scan_network`] returns a fixed pair of example
//! controllers so front ends can exercise their device pickers.

use armbridge_types::BridgeError;
use serde::{Deserialize, Serialize};
use tokio_serial::SerialPortType;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredRobot {
    pub ip: String,
    /// Registry id of the family the controller appears to be.
    #[serde(rename = "type")]
    pub robot_type: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialPortEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Hex, e.g. `"2341"` for Arduino.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

pub async fn scan_network() -> Vec<DiscoveredRobot> {
    debug!("network scan (static results)");
    vec![
        DiscoveredRobot {
            ip: "192.168.1.100".to_string(),
            robot_type: "universal".to_string(),
            name: "Simulated UR5".to_string(),
        },
        DiscoveredRobot {
            ip: "192.168.1.101".to_string(),
            robot_type: "abb".to_string(),
            name: "Simulated ABB".to_string(),
        },
    ]
}

/// # Errors
///
/// [`BridgeError::Transport`] when the OS port enumeration fails.
pub fn list_serial_ports() -> Result<Vec<SerialPortEntry>, BridgeError> {
    let ports =
        tokio_serial::available_ports().map_err(|e| BridgeError::transport("serial", e))?;
    Ok(ports
        .into_iter()
        .map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) => SerialPortEntry {
                path: port.port_name,
                manufacturer: usb.manufacturer,
                serial_number: usb.serial_number,
                vendor_id: Some(format!("{:04x}", usb.vid)),
                product_id: Some(format!("{:04x}", usb.pid)),
            },
            _ => SerialPortEntry {
                path: port.port_name,
                manufacturer: None,
                serial_number: None,
                vendor_id: None,
                product_id: None,
            },
        })
        .collect())
}
