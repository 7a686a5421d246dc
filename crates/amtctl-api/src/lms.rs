//! Session channel to the Local Manageability Service.
//!
//! LMS listens on a loopback TCP port and proxies management-protocol
//! payloads to the firmware. Responses carry no length prefix or terminator
//! at this layer, so [`LmsConnection::listen`] drains the socket until the
//! peer goes quiet for the read deadline or closes the stream. The returned
//! [`RawFrame`] is best-effort complete; callers validate it with
//! protocol-level checks such as [`RawFrame::http_completeness`].
//!
//! ```rust,ignore
//! let mut conn = LmsConnection::new(LmsConfig::default());
//! conn.connect().await?;
//! conn.send(&request).await?;
//! let outcome = conn.listen().await;
//! conn.close().await?;
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::http::{self, HttpCompleteness};

pub const DEFAULT_LMS_HOST: &str = "localhost";
pub const DEFAULT_LMS_PORT: u16 = 16992;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

const LINGER: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 4096;
const INITIAL_CAPACITY: usize = 8192;

// ── Config ───────────────────────────────────────────────────────────

/// Where LMS lives and how long a quiet period ends a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmsConfig {
    pub host: String,
    pub port: u16,
    /// Read deadline for one [`LmsConnection::listen`] call, measured from the call.
    pub read_timeout: Duration,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_LMS_HOST.into(),
            port: DEFAULT_LMS_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl LmsConfig {
    /// `host:port`, as used for resolution and the HTTP `Host` header.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── RawFrame ─────────────────────────────────────────────────────────

/// Bytes accumulated by one drain of the socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame(Vec<u8>);

impl RawFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append another drain, for callers that keep listening on an incomplete response.
    pub fn extend(&mut self, other: RawFrame) {
        self.0.extend(other.0);
    }

    /// Check HTTP/1.1 framing before trusting the frame as a whole response.
    pub fn http_completeness(&self) -> HttpCompleteness {
        http::completeness(&self.0)
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Why a drain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainEnd {
    /// The read deadline elapsed.
    Quiet,
    /// The peer closed its side.
    EndOfStream,
    /// A read failed; the session is invalidated.
    Failed,
}

/// Result of [`LmsConnection::listen`]: the bytes are returned even when a read failed.
#[derive(Debug)]
pub struct ListenOutcome {
    pub frame: RawFrame,
    pub end: DrainEnd,
    pub error: Option<Error>,
}

// ── LmsConnection ────────────────────────────────────────────────────

enum State {
    Idle,
    Open(TcpStream),
    Closed,
}

/// One exclusively owned TCP session to LMS. Never pooled or shared.
pub struct LmsConnection {
    config: LmsConfig,
    state: State,
}

impl std::fmt::Debug for LmsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Idle => "idle",
            State::Open(_) => "open",
            State::Closed => "closed",
        };
        f.debug_struct("LmsConnection")
            .field("endpoint", &self.config.endpoint())
            .field("state", &state)
            .finish()
    }
}

impl LmsConnection {
    pub fn new(config: LmsConfig) -> Self {
        Self {
            config,
            state: State::Idle,
        }
    }

    pub fn config(&self) -> &LmsConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Resolve the endpoint as IPv4 and dial it. No retry.
    pub async fn connect(&mut self) -> Result<(), Error> {
        let endpoint = self.config.endpoint();
        debug!(%endpoint, "connecting to lms");

        let addr = resolve_v4(&endpoint).await?;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| Error::Connection {
                endpoint: endpoint.clone(),
                source,
            })?;

        if self.is_open() {
            debug!("replacing an open lms session");
        }
        self.state = State::Open(stream);
        debug!("connected to lms");
        Ok(())
    }

    /// Write the whole payload. No framing is added.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let State::Open(stream) = &mut self.state else {
            return Err(Error::NotConnected);
        };
        debug!(bytes = data.len(), "sending message to lms");
        stream.write_all(data).await.map_err(Error::Transport)?;
        stream.flush().await.map_err(Error::Transport)?;
        debug!("sent message to lms");
        Ok(())
    }

    /// Drain the socket until the read deadline, end of stream, or a read error.
    ///
    /// A read error other than a timeout is returned in [`ListenOutcome::error`]
    /// and invalidates the session; whatever was accumulated is still returned.
    pub async fn listen(&mut self) -> ListenOutcome {
        let read_timeout = self.config.read_timeout;
        let State::Open(stream) = &mut self.state else {
            return ListenOutcome {
                frame: RawFrame::default(),
                end: DrainEnd::Failed,
                error: Some(Error::NotConnected),
            };
        };

        debug!("listening for lms messages");
        if let Err(e) = set_linger(stream) {
            warn!(error = %e, "could not set linger on lms socket");
        }

        let deadline = Instant::now() + read_timeout;
        let mut buf = Vec::with_capacity(INITIAL_CAPACITY);
        let mut chunk = [0u8; READ_CHUNK];

        let (end, failure) = loop {
            match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
                Err(_) => break (DrainEnd::Quiet, None),
                Ok(Ok(0)) => break (DrainEnd::EndOfStream, None),
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => break (DrainEnd::Quiet, None),
                Ok(Err(e)) => {
                    warn!(error = %e, "lms read error");
                    break (DrainEnd::Failed, Some(e));
                }
            }
        };

        let error = failure.map(|e| {
            self.state = State::Closed;
            Error::Transport(e)
        });

        trace!(bytes = buf.len(), ?end, "done listening");
        ListenOutcome {
            frame: RawFrame(buf),
            end,
            error,
        }
    }

    /// Run [`listen`](Self::listen) on its own task.
    ///
    /// The frame and any transport error arrive on two separate one-shot
    /// channels, so the caller can race them against its own deadline.
    pub fn spawn_listen(mut self) -> ListenHandle {
        let (frame_tx, frame_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let outcome = self.listen().await;
            if let Some(err) = outcome.error {
                let _ = error_tx.send(err);
            }
            let _ = frame_tx.send((outcome.frame, outcome.end));
            self
        });

        ListenHandle {
            frame: frame_rx,
            error: error_rx,
            task,
        }
    }

    /// Release the socket. Closing twice is fine; closing a never-connected
    /// session is an error.
    pub async fn close(&mut self) -> Result<(), Error> {
        debug!("closing connection to lms");
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Idle => {
                self.state = State::Idle;
                Err(Error::NotConnected)
            }
            State::Open(mut stream) => {
                if let Err(e) = stream.shutdown().await {
                    debug!(error = %e, "lms socket shutdown reported an error");
                }
                Ok(())
            }
            State::Closed => Ok(()),
        }
    }
}

// ── ListenHandle ─────────────────────────────────────────────────────

/// A listen running on its own task. See [`LmsConnection::spawn_listen`].
pub struct ListenHandle {
    pub frame: oneshot::Receiver<(RawFrame, DrainEnd)>,
    pub error: oneshot::Receiver<Error>,
    task: JoinHandle<LmsConnection>,
}

impl ListenHandle {
    /// Wait up to `outer` for the drain to finish, then take the session back.
    ///
    /// The outer deadline should exceed the per-read deadline; if it elapses
    /// first the task is aborted and the session is lost.
    pub async fn finish(self, outer: Duration) -> Result<(LmsConnection, ListenOutcome), Error> {
        let (frame, end) = match tokio::time::timeout(outer, self.frame).await {
            Ok(Ok(received)) => received,
            Ok(Err(_)) => {
                return Err(Error::Transport(io::Error::other(
                    "listen task ended without delivering a frame",
                )));
            }
            Err(_) => {
                self.task.abort();
                return Err(Error::Timeout {
                    timeout_ms: u64::try_from(outer.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        // The task sends the error before the frame.
        let mut error_rx = self.error;
        let error = error_rx.try_recv().ok();

        let connection = self
            .task
            .await
            .map_err(|e| Error::Transport(io::Error::other(e)))?;

        Ok((connection, ListenOutcome { frame, end, error }))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

async fn resolve_v4(endpoint: &str) -> Result<SocketAddr, Error> {
    let mut addrs = tokio::net::lookup_host(endpoint)
        .await
        .map_err(|source| Error::Connection {
            endpoint: endpoint.to_string(),
            source,
        })?;
    addrs.find(SocketAddr::is_ipv4).ok_or_else(|| Error::Connection {
        endpoint: endpoint.to_string(),
        source: io::Error::new(io::ErrorKind::AddrNotAvailable, "no IPv4 address"),
    })
}

#[allow(deprecated)]
fn set_linger(stream: &TcpStream) -> io::Result<()> {
    stream.set_linger(Some(LINGER))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_lms() -> (TcpListener, LmsConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = LmsConfig {
            host: "127.0.0.1".into(),
            port,
            read_timeout: Duration::from_millis(200),
        };
        (listener, config)
    }

    #[tokio::test]
    async fn close_without_connect_is_an_error() {
        let mut conn = LmsConnection::new(LmsConfig::default());
        let err = conn.close().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(err.to_string(), "no connection to LMS");
    }

    #[tokio::test]
    async fn send_without_connect_is_an_error() {
        let mut conn = LmsConnection::new(LmsConfig::default());
        assert!(matches!(conn.send(b"x").await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn connect_failure_is_a_connection_error() {
        let (listener, config) = local_lms().await;
        drop(listener);
        let mut conn = LmsConnection::new(config);
        let err = conn.connect().await.unwrap_err();
        assert!(err.is_connection(), "got {err:?}");
    }

    #[tokio::test]
    async fn listen_with_silent_peer_returns_within_deadline() {
        let (listener, config) = local_lms().await;
        let peer = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(sock);
        });

        let mut conn = LmsConnection::new(config);
        conn.connect().await.unwrap();
        let started = std::time::Instant::now();
        let outcome = conn.listen().await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(outcome.frame.is_empty());
        assert_eq!(outcome.end, DrainEnd::Quiet);
        assert!(outcome.error.is_none());
        assert!(conn.is_open());
        peer.abort();
    }

    #[tokio::test]
    async fn listen_accumulates_fragments_until_close() {
        let (listener, config) = local_lms().await;
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 4];
            sock.read_exact(&mut req).await.unwrap();
            sock.write_all(b"hel").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            sock.write_all(b"lo").await.unwrap();
        });

        let mut conn = LmsConnection::new(config);
        conn.connect().await.unwrap();
        conn.send(b"ping").await.unwrap();
        let outcome = conn.listen().await;

        assert_eq!(outcome.frame.as_bytes(), b"hello");
        assert_eq!(outcome.end, DrainEnd::EndOfStream);
        conn.close().await.unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn spawned_listen_delivers_frame_and_returns_session() {
        let (listener, config) = local_lms().await;
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut conn = LmsConnection::new(config);
        conn.connect().await.unwrap();
        let (mut conn, outcome) = conn
            .spawn_listen()
            .finish(Duration::from_secs(2))
            .await
            .unwrap();

        assert!(outcome.error.is_none());
        assert_eq!(outcome.frame.http_completeness(), HttpCompleteness::Complete);
        assert!(conn.is_open());
        conn.close().await.unwrap();
    }

    /// Accept one connection, optionally write `data`, then abort it with a reset.
    fn reset_after(listener: TcpListener, data: &'static [u8], delay: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(data).await.unwrap();
            tokio::time::sleep(delay).await;
            #[allow(deprecated)]
            let linger = sock.set_linger(Some(Duration::ZERO));
            linger.unwrap();
            drop(sock);
        })
    }

    #[tokio::test]
    async fn reset_mid_drain_keeps_partial_bytes_and_invalidates_session() {
        let (listener, mut config) = local_lms().await;
        config.read_timeout = Duration::from_secs(2);
        let peer = reset_after(listener, b"partial", Duration::from_millis(100));

        let mut conn = LmsConnection::new(config);
        conn.connect().await.unwrap();
        let handle = conn.spawn_listen();
        let (mut conn, outcome) = handle.finish(Duration::from_secs(5)).await.unwrap();
        peer.await.unwrap();

        assert_eq!(outcome.frame.as_bytes(), b"partial");
        assert_eq!(outcome.end, DrainEnd::Failed);
        assert!(matches!(outcome.error, Some(Error::Transport(_))), "{:?}", outcome.error);
        assert!(!conn.is_open());
        assert!(matches!(conn.send(b"again").await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn send_to_a_reset_peer_is_a_transport_error() {
        let (listener, config) = local_lms().await;
        let peer = reset_after(listener, b"", Duration::ZERO);

        let mut conn = LmsConnection::new(config);
        conn.connect().await.unwrap();
        peer.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The first write after a reset may still be accepted by the kernel.
        let mut result = Ok(());
        for _ in 0..10 {
            result = conn.send(&[0u8; 1024]).await;
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(matches!(result, Err(Error::Transport(_))), "{result:?}");
    }

    #[tokio::test]
    async fn outer_deadline_shorter_than_read_deadline_times_out() {
        let (listener, mut config) = local_lms().await;
        config.read_timeout = Duration::from_secs(2);
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(3)).await;
        });

        let mut conn = LmsConnection::new(config);
        conn.connect().await.unwrap();
        let err = conn
            .spawn_listen()
            .finish(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { timeout_ms: 100 }));
    }
}
