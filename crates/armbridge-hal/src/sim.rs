//! In-process stand-ins for real transports.
//!
//! [`DuplexDialer`] hands out one end of a `tokio::io::duplex` pipe so a test
//! can play the device on the other end.  [`ScriptedSdk`] answers SDK bridge
//! requests from memory.  Neither touches the network or spawns processes.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use armbridge_types::BridgeError;
use async_trait::async_trait;
use tokio::io::DuplexStream;

use crate::bridge::{SdkChannel, SdkReply, SdkRequest};
use crate::config::{AdapterConfig, PacingConfig};
use crate::transport::{BoxedStream, Dialer};

const PIPE_CAPACITY: usize = 64 * 1024;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Adapter config with every pacing delay set to zero.
pub fn unpaced() -> AdapterConfig {
    AdapterConfig {
        pacing: PacingConfig {
            ack_ms: Some(0),
            motion_ms: Some(0),
            home_ms: Some(0),
            boot_ms: Some(0),
        },
        ..AdapterConfig::default()
    }
}

/// Dialer backed by a queue of in-memory pipes.
///
/// Each successful dial consumes one queued pipe; dialing with an empty
/// queue fails with `ConnectionRefused`.  Clones share the queue.
#[derive(Clone)]
pub struct DuplexDialer {
    pending: Arc<Mutex<VecDeque<DuplexStream>>>,
    capacity: usize,
}

impl Default for DuplexDialer {
    fn default() -> Self {
        Self::with_capacity(PIPE_CAPACITY)
    }
}

impl DuplexDialer {
    /// A dialer whose pipes buffer at most `capacity` bytes each way.  A
    /// device end that is not read stalls writes once that fills.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Arc::default(),
            capacity,
        }
    }

    /// A dialer with one queued pipe, plus the device end of that pipe.
    pub fn pair() -> (Self, DuplexStream) {
        let dialer = Self::default();
        let peer = dialer.add_peer();
        (dialer, peer)
    }

    /// Queue another pipe and return its device end.
    pub fn add_peer(&self) -> DuplexStream {
        let (ours, theirs) = tokio::io::duplex(self.capacity);
        lock(&self.pending).push_back(ours);
        theirs
    }
}

#[async_trait]
impl Dialer for DuplexDialer {
    fn endpoint(&self) -> String {
        "sim://duplex".to_string()
    }

    async fn dial(&self) -> io::Result<BoxedStream> {
        match lock(&self.pending).pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no simulated peer available",
            )),
        }
    }
}

/// Dialer whose connect never completes.
#[derive(Debug, Clone)]
pub struct StalledDialer {
    endpoint: String,
}

impl StalledDialer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Dialer for StalledDialer {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn dial(&self) -> io::Result<BoxedStream> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct ScriptState {
    requests: Vec<SdkRequest>,
    failures: HashMap<String, String>,
    broken: bool,
}

/// SDK channel that records requests and answers from a script.
///
/// Every command succeeds unless registered with
/// [`ScriptedSdk::fail_command`].  Clones share the script and the log.
#[derive(Clone, Default)]
pub struct ScriptedSdk {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `success = false` and `msg`.
    pub fn fail_command(&self, command: &str, msg: &str) {
        lock(&self.state)
            .failures
            .insert(command.to_string(), msg.to_string());
    }

    /// Make every later call fail at the channel level.
    pub fn break_channel(&self) {
        lock(&self.state).broken = true;
    }

    pub fn requests(&self) -> Vec<SdkRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.state)
            .requests
            .iter()
            .map(|r| r.command.clone())
            .collect()
    }
}

#[async_trait]
impl SdkChannel for ScriptedSdk {
    async fn call(&self, request: &SdkRequest) -> Result<SdkReply, BridgeError> {
        let mut state = lock(&self.state);
        if state.broken {
            return Err(BridgeError::transport("sdk", "bridge process exited"));
        }
        state.requests.push(request.clone());
        Ok(match state.failures.get(&request.command) {
            Some(msg) => SdkReply::failed(msg.clone()),
            None => SdkReply::ok(format!("{} ok", request.command)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplex_dialer_consumes_queued_peers() {
        let (dialer, _peer) = DuplexDialer::pair();
        assert!(dialer.dial().await.is_ok());
        let err = dialer.dial().await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);

        let _second = dialer.clone().add_peer();
        assert!(dialer.dial().await.is_ok());
    }

    #[tokio::test]
    async fn scripted_sdk_records_and_fails_on_request() {
        let sdk = ScriptedSdk::new();
        sdk.fail_command("home", "Robot not homed: alarm active");

        let ok = sdk.call(&SdkRequest::new("init", "COM3")).await.unwrap();
        assert!(ok.success);
        let failed = sdk.call(&SdkRequest::new("home", "COM3")).await.unwrap();
        assert!(!failed.success);
        assert_eq!(failed.msg, "Robot not homed: alarm active");
        assert_eq!(sdk.commands(), vec!["init", "home"]);

        sdk.break_channel();
        assert!(sdk.call(&SdkRequest::new("stop", "COM3")).await.is_err());
    }
}
