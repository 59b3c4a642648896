//! Unix-socket IPC between the CLI and the running daemon.
//!
//! Wire format: a 4-byte big-endian length prefix followed by a JSON body.
//! Requests and responses are `type`-tagged enums, so the protocol stays
//! readable with `socat` in hand.

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr, bail};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::warn;

/// Largest accepted message body.
const MAX_MESSAGE_SIZE: u32 = 64 * 1024;
/// Budget for each half of a round trip.
const IPC_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Protocol
// ============================================================================

/// Commands the CLI sends to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Query daemon status.
    Status,
    /// Pause window detection.
    Pause,
    /// Resume window detection.
    Resume,
    /// Flip window detection.
    Toggle,
    /// Gracefully stop the daemon.
    Shutdown,
}

/// Daemon replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Status snapshot.
    Status(StatusReply),
    /// Generic success.
    Ok { message: String },
    /// Request could not be served.
    Error { message: String },
}

/// Snapshot of the daemon for `bptv status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub version: String,
    pub uptime_secs: u64,
    pub detection_active: bool,
    pub last_presence: Option<bool>,
    pub current_mode: Option<String>,
    pub last_fault: Option<String>,
}

/// Control socket path: `$XDG_RUNTIME_DIR/bptv.sock`, or `/tmp/bptv.sock`
/// without a runtime dir.
#[must_use]
pub fn socket_path() -> PathBuf {
    dirs::runtime_dir().map_or_else(
        || PathBuf::from("/tmp/bptv.sock"),
        |dir| dir.join("bptv.sock"),
    )
}

// ============================================================================
// Server
// ============================================================================

/// Listening side, owned by the daemon; the socket file is removed on drop.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Binds the control socket, sweeping a stale one first.
    ///
    /// # Errors
    /// When another daemon answers on the socket, or binding fails.
    pub fn bind() -> Result<Self> {
        let path = socket_path();
        if path.exists() {
            if std::os::unix::net::UnixStream::connect(&path).is_ok() {
                bail!("another daemon is already listening on {}", path.display());
            }
            // Leftover socket from a crashed daemon; nobody answered.
            std::fs::remove_file(&path)
                .wrap_err_with(|| format!("failed to remove stale socket {}", path.display()))?;
        }
        let listener = UnixListener::bind(&path)
            .wrap_err_with(|| format!("failed to bind {}", path.display()))?;
        Ok(Self { listener, path })
    }

    /// Waits for the next client. `None` on a failed accept (non-fatal).
    pub async fn accept(&self) -> Option<UnixStream> {
        match self.listener.accept().await {
            Ok((stream, _addr)) => Some(stream),
            Err(e) => {
                warn!("ipc accept failed: {e}");
                None
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Reads a client's request, bounded by the IPC timeout.
///
/// # Errors
/// On timeout, short reads, oversized messages, or malformed JSON.
pub async fn read_request(stream: &mut UnixStream) -> Result<Request> {
    tokio::time::timeout(IPC_TIMEOUT, read_message(stream))
        .await
        .wrap_err("timed out reading ipc request")?
}

/// Writes a response back to the client, bounded by the IPC timeout.
///
/// # Errors
/// On timeout or a broken stream.
pub async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    tokio::time::timeout(IPC_TIMEOUT, write_message(stream, response))
        .await
        .wrap_err("timed out writing ipc response")?
}

// ============================================================================
// Client
// ============================================================================

/// Sends one request to the daemon and awaits its reply.
///
/// # Errors
/// When no daemon is listening or the round trip times out.
pub async fn send_request(request: &Request) -> Result<Response> {
    let path = socket_path();
    let mut stream = tokio::time::timeout(IPC_TIMEOUT, UnixStream::connect(&path))
        .await
        .wrap_err("timed out connecting to the daemon")?
        .wrap_err_with(|| format!("no daemon listening on {}", path.display()))?;

    tokio::time::timeout(IPC_TIMEOUT, write_message(&mut stream, request))
        .await
        .wrap_err("timed out sending ipc request")??;

    tokio::time::timeout(IPC_TIMEOUT, read_message(&mut stream))
        .await
        .wrap_err("timed out reading ipc response")?
}

/// Whether a daemon currently answers on the control socket.
#[must_use]
pub fn is_daemon_running() -> bool {
    let path = socket_path();
    path.exists() && std::os::unix::net::UnixStream::connect(path).is_ok()
}

// ============================================================================
// Framing
// ============================================================================

async fn write_message<W, T>(stream: &mut W, payload: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(payload).wrap_err("failed to encode ipc message")?;
    if body.len() > MAX_MESSAGE_SIZE as usize {
        bail!(
            "ipc message of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte cap",
            body.len()
        );
    }
    stream
        .write_all(&(body.len() as u32).to_be_bytes())
        .await
        .wrap_err("failed to write ipc length prefix")?;
    stream
        .write_all(&body)
        .await
        .wrap_err("failed to write ipc body")?;
    stream.flush().await.wrap_err("failed to flush ipc stream")?;
    Ok(())
}

async fn read_message<R, T>(stream: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .wrap_err("failed to read ipc length prefix")?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        bail!("ipc message of {len} bytes exceeds the {MAX_MESSAGE_SIZE} byte cap");
    }
    let mut body = vec![0u8; len as usize];
    stream
        .read_exact(&mut body)
        .await
        .wrap_err("failed to read ipc body")?;
    serde_json::from_slice(&body).wrap_err("failed to decode ipc message")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_type_tagged() {
        let json = serde_json::to_string(&Request::Pause).unwrap();
        assert_eq!(json, r#"{"type":"Pause"}"#);
    }

    #[test]
    fn status_reply_inlines_its_tag() {
        let response = Response::Status(StatusReply {
            version: "0.2.0".to_string(),
            uptime_secs: 61,
            detection_active: true,
            last_presence: Some(false),
            current_mode: Some("Desktop Mode".to_string()),
            last_fault: None,
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with(r#"{"type":"Status""#), "{json}");
        assert!(json.contains(r#""uptime_secs":61"#));
    }

    #[tokio::test]
    async fn messages_round_trip_over_a_stream() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_message(&mut a, &Request::Toggle).await.unwrap();
        let request: Request = read_message(&mut b).await.unwrap();
        assert_eq!(request, Request::Toggle);

        let reply = Response::Ok {
            message: "detection paused".to_string(),
        };
        write_message(&mut b, &reply).await.unwrap();
        let received: Response = read_message(&mut a).await.unwrap();
        assert_eq!(received, reply);
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let result: Result<Request> = read_message(&mut b).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn garbage_body_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&4u32.to_be_bytes()).await.unwrap();
        a.write_all(b"????").await.unwrap();
        let result: Result<Request> = read_message(&mut b).await;
        assert!(result.is_err());
    }
}
