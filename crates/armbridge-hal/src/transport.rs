//! Line-oriented byte transports: TCP sockets and serial ports.
//!
//! A [`Dialer`] knows how to open a stream; [`LineLink`] owns an open stream,
//! hands newline-terminated commands to a writer task and runs a passive
//! read loop on another.  The read loop never answers a command – it only logs
//! inbound lines, forwards them to an optional [`LineHandler`], and marks the
//! link disconnected when the peer closes.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use armbridge_types::BridgeError;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::link::LinkState;

/// Any bidirectional byte stream an adapter can talk over.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkStream for T {}

pub type BoxedStream = Box<dyn LinkStream>;

/// Callback invoked with every inbound line (terminator stripped).
pub type LineHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Opens a fresh stream to one endpoint.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Human-readable endpoint, used in errors and logs.
    fn endpoint(&self) -> String;

    async fn dial(&self) -> io::Result<BoxedStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// TCP
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpDialer {
    pub host: String,
    pub port: u16,
}

impl TcpDialer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve `"host"` or `"host:port"`.
    ///
    /// An empty endpoint falls back to `default_host`; a missing port falls
    /// back to `default_port`.
    pub fn resolve(endpoint: &str, default_host: &str, default_port: u16) -> Self {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Self::new(default_host, default_port);
        }
        match endpoint.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(port) => Self::new(host, port),
                Err(_) => Self::new(endpoint, default_port),
            },
            _ => Self::new(endpoint, default_port),
        }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn dial(&self) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serial
// ─────────────────────────────────────────────────────────────────────────────

/// 8N1 serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDialer {
    pub path: String,
    pub baud_rate: u32,
}

impl SerialDialer {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl Dialer for SerialDialer {
    fn endpoint(&self) -> String {
        format!("{}@{}", self.path, self.baud_rate)
    }

    async fn dial(&self) -> io::Result<BoxedStream> {
        let port = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(io::Error::from)?;
        Ok(Box::new(port))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LineLink
// ─────────────────────────────────────────────────────────────────────────────

/// Frames queued per priority before senders wait.
const WRITE_QUEUE: usize = 16;

/// One framed line waiting for the writer task.
struct Frame {
    bytes: String,
    done: oneshot::Sender<io::Result<()>>,
}

/// An open, line-framed connection plus its background read and write loops.
///
/// Only the writer task touches the write half.  A line it has started is
/// always finished, even when the caller that queued it has gone away, so a
/// stop line can never be spliced into a half-written command.
pub struct LineLink {
    sender: LineSender,
    cancel: CancellationToken,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl LineLink {
    /// Dial with a timeout, split the stream and start the read and write
    /// loops.
    ///
    /// Marks `link` connected on success.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Connection`] when the dial fails or does not finish
    /// within `timeout`.
    pub async fn open(
        dialer: &dyn Dialer,
        timeout: Duration,
        component: &str,
        link: LinkState,
        on_line: Option<LineHandler>,
    ) -> Result<Self, BridgeError> {
        let endpoint = dialer.endpoint();
        let stream = match tokio::time::timeout(timeout, dialer.dial()).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(BridgeError::connection(endpoint, e)),
            Err(_) => {
                return Err(BridgeError::connection(
                    endpoint,
                    format!("timed out after {} ms", timeout.as_millis()),
                ));
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let cancel = CancellationToken::new();
        link.set_connected(true);
        info!(component, %endpoint, "link open");

        let reader = tokio::spawn(read_loop(
            BufReader::new(read_half),
            component.to_string(),
            link.clone(),
            on_line,
            cancel.clone(),
        ));

        let (urgent_tx, urgent_rx) = mpsc::channel(WRITE_QUEUE);
        let (normal_tx, normal_rx) = mpsc::channel(WRITE_QUEUE);
        let writer = tokio::spawn(write_loop(
            write_half,
            urgent_rx,
            normal_rx,
            component.to_string(),
            link.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            sender: LineSender {
                component: component.to_string(),
                urgent: urgent_tx,
                normal: normal_tx,
                link,
            },
            cancel,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    /// Write one command line.
    pub async fn send_line(&self, line: &str) -> Result<(), BridgeError> {
        self.sender.send_line(line).await
    }

    /// A cloneable writer sharing this link's stream.
    pub fn sender(&self) -> LineSender {
        self.sender.clone()
    }

    /// Stop both loops and shut the write side.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        self.sender.link.set_connected(false);
    }
}

impl Drop for LineLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Write side of a [`LineLink`], shareable with a stop handle.
#[derive(Clone)]
pub struct LineSender {
    component: String,
    urgent: mpsc::Sender<Frame>,
    normal: mpsc::Sender<Frame>,
    link: LinkState,
}

impl LineSender {
    /// Write `line` plus `\n`, failing fast if the link is known closed.
    ///
    /// Dropping the returned future before the writer picks the line up
    /// discards it; once writing has started the line goes out whole.
    pub async fn send_line(&self, line: &str) -> Result<(), BridgeError> {
        if !self.link.is_connected() {
            return Err(self.closed());
        }
        self.enqueue(&self.normal, line).await
    }

    /// Write `line` ahead of any queued lines, without checking link state.
    /// Used by the stop path.
    pub async fn force_line(&self, line: &str) -> Result<(), BridgeError> {
        self.enqueue(&self.urgent, line).await
    }

    async fn enqueue(&self, queue: &mpsc::Sender<Frame>, line: &str) -> Result<(), BridgeError> {
        let mut bytes = String::with_capacity(line.len() + 1);
        bytes.push_str(line);
        bytes.push('\n');

        let (done, written) = oneshot::channel();
        queue
            .send(Frame { bytes, done })
            .await
            .map_err(|_| self.closed())?;
        match written.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::transport(&self.component, e)),
            Err(_) => Err(self.closed()),
        }
    }

    fn closed(&self) -> BridgeError {
        BridgeError::transport(&self.component, "link is closed")
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut urgent: mpsc::Receiver<Frame>,
    mut normal: mpsc::Receiver<Frame>,
    component: String,
    link: LinkState,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(frame) = urgent.recv() => frame,
            Some(frame) = normal.recv() => frame,
            else => break,
        };
        if frame.done.is_closed() {
            debug!(%component, line = frame.bytes.trim_end(), "dropped; sender went away");
            continue;
        }

        let written = tokio::select! {
            _ = cancel.cancelled() => break,
            written = write_frame(&mut writer, frame.bytes.as_bytes()) => written,
        };
        match &written {
            Ok(()) => {
                link.record_send();
                debug!(%component, line = frame.bytes.trim_end(), "sent");
            }
            Err(e) => warn!(%component, error = %e, "write failed"),
        }
        let _ = frame.done.send(written);
    }

    if let Err(e) = writer.shutdown().await {
        debug!(%component, error = %e, "shutdown on close failed");
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}

async fn read_loop<R>(
    mut reader: BufReader<R>,
    component: String,
    link: LinkState,
    on_line: Option<LineHandler>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = String::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read_line(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                warn!(%component, "peer closed the link");
                link.set_connected(false);
                return;
            }
            Ok(_) => {
                let line = buf.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                debug!(%component, line, "received");
                if let Some(handler) = &on_line {
                    handler(line);
                }
            }
            Err(e) => {
                warn!(%component, error = %e, "read failed; marking link closed");
                link.set_connected(false);
                return;
            }
        }
    }
}
