use thiserror::Error;

/// Top-level error type for the `amtctl-api` crate.
///
/// Covers every failure mode across the transport surfaces:
/// the LMS socket, WS-Management over HTTP, and the RPS WebSocket.
/// `amtctl-core` maps these into run-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── LMS socket ──────────────────────────────────────────────────
    /// Resolving or dialing the LMS endpoint failed.
    #[error("Cannot connect to LMS at {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Write or read failure on an open LMS socket (other than a read timeout).
    #[error("LMS transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// The session was never connected, or was invalidated by a fatal read.
    #[error("no connection to LMS")]
    NotConnected,

    /// An outer deadline elapsed before the operation finished.
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A drained frame did not hold a complete response.
    #[error("Incomplete response from LMS ({received} bytes received)")]
    Truncated { received: usize },

    // ── WS-Management ───────────────────────────────────────────────
    /// The firmware rejected the supplied digest credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Malformed HTTP response from LMS.
    #[error("Malformed HTTP response: {0}")]
    Http(String),

    /// A SOAP fault or unexpected WS-Management response.
    #[error("WS-Management error: {message}")]
    Wsman { message: String },

    /// A method invocation returned a non-zero `ReturnValue`.
    #[error("{method} returned {code}")]
    ReturnValue { method: &'static str, code: u32 },

    /// Operation not reachable over this transport.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    // ── Host interface ──────────────────────────────────────────────
    /// Opening the MEI device or connecting it to the PTHI client failed.
    #[error("Cannot open the AMT host interface at {device}: {source}")]
    Mei {
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// Read or write failure on a connected host interface.
    #[error("Host interface transport error: {0}")]
    HostInterface(#[source] std::io::Error),

    /// A PTHI response was malformed or answered a different command.
    #[error("Malformed PTHI response: {message}")]
    Pthi { message: String },

    /// The firmware answered a PTHI command with a non-success status.
    #[error("PTHI command failed with status {status:#x}")]
    PthiStatus { status: u32 },

    // ── Remote provisioning ─────────────────────────────────────────
    /// RPS reported an error or ended the session early.
    #[error("Remote provisioning failed: {message}")]
    Rps { message: String },

    /// WebSocket connection or framing failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// TLS handshake or certificate verification failure.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON or base64 decoding failed.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String },
}

impl Error {
    /// Returns `true` if the LMS endpoint could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::NotConnected)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization {
            message: err.to_string(),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Deserialization {
            message: format!("invalid base64 payload: {err}"),
        }
    }
}
