//! Request/reply channel to a vendor SDK that runs out of process.
//!
//! Some controllers are only reachable through a vendor library.  The
//! adapter sends one JSON request per operation and waits for one JSON
//! reply; [`ProcessBridge`] implements that by spawning the bridge script
//! with the request as its last argument and parsing the final line of its
//! stdout.

use std::time::Duration;

use armbridge_types::BridgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

/// One SDK operation, e.g. `{"command":"move","port":"COM3","x":200,...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdkRequest {
    pub command: String,
    pub port: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SdkRequest {
    pub fn new(command: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            port: port.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkReply {
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SdkReply {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Exactly one reply per request.
#[async_trait]
pub trait SdkChannel: Send + Sync {
    /// # Errors
    ///
    /// [`BridgeError::Transport`] when the channel itself fails.  A reply
    /// with `success = false` is *not* an error at this layer.
    async fn call(&self, request: &SdkRequest) -> Result<SdkReply, BridgeError>;
}

/// Runs `<program> -X utf8 <script> '<request json>'` per request.
#[derive(Debug, Clone)]
pub struct ProcessBridge {
    program: String,
    script: String,
    timeout: Duration,
}

impl ProcessBridge {
    pub fn new(program: impl Into<String>, script: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SdkChannel for ProcessBridge {
    async fn call(&self, request: &SdkRequest) -> Result<SdkReply, BridgeError> {
        let payload =
            serde_json::to_string(request).map_err(|e| BridgeError::transport("sdk", e))?;
        debug!(program = %self.program, command = %request.command, "sdk request");

        let child = Command::new(&self.program)
            .args(["-X", "utf8", self.script.as_str(), payload.as_str()])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(BridgeError::transport("sdk", e)),
            Err(_) => {
                return Err(BridgeError::transport(
                    "sdk",
                    format!(
                        "{} did not answer within {} ms",
                        request.command,
                        self.timeout.as_millis()
                    ),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_reply(&stdout).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            BridgeError::transport(
                "sdk",
                format!("no JSON reply (status {}): {}", output.status, stderr.trim()),
            )
        })
    }
}

/// The last stdout line that parses as a reply.  Vendor libraries print
/// banners of their own before the bridge writes its answer.
fn parse_reply(stdout: &str) -> Option<SdkReply> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .find_map(|l| serde_json::from_str(l).ok())
}
