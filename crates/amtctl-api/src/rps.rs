//! Remote provisioning over a WebSocket to RPS.
//!
//! The agent opens a WebSocket to the Remote Provisioning Server, sends an
//! activation message describing the device, then relays: every
//! server message that is not a heartbeat or a terminal status carries a
//! base64 management payload, which is forwarded to LMS verbatim and the
//! drained reply sent back as a `response` message.
//!
//! ```rust,ignore
//! let session = RemoteSession::connect(&url, LmsConfig::default()).await?;
//! let outcome = session.run(&initial, &cancel).await?;
//! ```

use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::{Sink, SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::lms::{LmsConfig, LmsConnection};

/// RPS protocol revision this agent speaks.
pub const PROTOCOL_VERSION: &str = "4.0.0";

/// Outer deadline for one LMS round trip on behalf of RPS.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Values of [`RpsMessage::method`].
pub mod method {
    pub const ACTIVATION: &str = "activation";
    pub const HEARTBEAT_REQUEST: &str = "heartbeat_request";
    pub const HEARTBEAT_RESPONSE: &str = "heartbeat_response";
    pub const RESPONSE: &str = "response";
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Messages ─────────────────────────────────────────────────────────

/// One JSON message in either direction.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpsMessage {
    pub method: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// Base64; for activation this encodes the device facts, credentials included.
    #[serde(default)]
    pub payload: String,
}

impl fmt::Debug for RpsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpsMessage")
            .field("method", &self.method)
            .field("app_version", &self.app_version)
            .field("protocol_version", &self.protocol_version)
            .field("status", &self.status)
            .field("message", &self.message)
            .field("payload", &format_args!("<{} bytes>", self.payload.len()))
            .finish_non_exhaustive()
    }
}

impl RpsMessage {
    /// The opening `activation` message.
    pub fn activation(payload: &ActivationPayload, app_version: &str) -> Result<Self, Error> {
        let json = serde_json::to_vec(payload)?;
        Ok(Self {
            method: method::ACTIVATION.into(),
            app_version: app_version.into(),
            protocol_version: PROTOCOL_VERSION.into(),
            status: "ok".into(),
            message: "ok".into(),
            payload: STANDARD.encode(json),
            ..Self::default()
        })
    }

    fn reply(method: &str, app_version: &str, payload: &[u8]) -> Self {
        Self {
            method: method.into(),
            app_version: app_version.into(),
            protocol_version: PROTOCOL_VERSION.into(),
            status: "ok".into(),
            message: "ok".into(),
            payload: STANDARD.encode(payload),
            ..Self::default()
        }
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>, Error> {
        Ok(STANDARD.decode(self.payload.trim())?)
    }
}

/// Device facts sent base64-encoded inside the activation message.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationPayload {
    pub ver: String,
    pub build: String,
    pub sku: String,
    pub uuid: String,
    pub username: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    pub current_mode: u32,
    pub hostname: String,
    pub fqdn: String,
    pub client: String,
    pub cert_hashes: Vec<String>,
    pub profile: String,
}

impl fmt::Debug for ActivationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationPayload")
            .field("ver", &self.ver)
            .field("build", &self.build)
            .field("sku", &self.sku)
            .field("uuid", &self.uuid)
            .field("username", &self.username)
            .field("current_mode", &self.current_mode)
            .field("hostname", &self.hostname)
            .field("fqdn", &self.fqdn)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Terminal `success` message contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpsOutcome {
    pub status: String,
    pub message: String,
}

// ── Session ──────────────────────────────────────────────────────────

/// An open WebSocket to RPS, ready to run one provisioning exchange.
pub struct RemoteSession {
    socket: Socket,
    lms: LmsConfig,
    exchange_timeout: Duration,
}

impl RemoteSession {
    /// Dial RPS. A TLS or certificate failure maps to [`Error::Tls`].
    pub async fn connect(url: &Url, lms: LmsConfig) -> Result<Self, Error> {
        info!(%url, "connecting to remote provisioning server");
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(map_ws_error)?;
        debug!("connected to remote provisioning server");
        Ok(Self {
            socket,
            lms,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Send `initial`, then relay until RPS reports success or error.
    pub async fn run(self, initial: &RpsMessage, cancel: &CancellationToken) -> Result<RpsOutcome, Error> {
        let Self {
            socket,
            lms,
            exchange_timeout,
        } = self;
        let (mut write, mut read) = socket.split();
        let app_version = initial.app_version.clone();

        send(&mut write, initial).await?;

        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = write.close().await;
                    return Err(Error::Rps { message: "cancelled".into() });
                }
                frame = read.next() => frame,
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|cf| cf.reason.as_str().to_owned()).unwrap_or_default();
                    return Err(Error::Rps {
                        message: format!("server closed the session before completion {reason}")
                            .trim_end()
                            .to_string(),
                    });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(map_ws_error(e)),
                None => {
                    return Err(Error::Rps {
                        message: "connection ended before completion".into(),
                    });
                }
            };

            let message: RpsMessage = serde_json::from_str(text.as_str())?;
            trace!(method = %message.method, "rps message");

            match message.method.as_str() {
                method::HEARTBEAT_REQUEST => {
                    let reply = RpsMessage::reply(method::HEARTBEAT_RESPONSE, &app_version, &[]);
                    send(&mut write, &reply).await?;
                }
                method::SUCCESS => {
                    info!(status = %message.status, "remote provisioning succeeded");
                    let _ = write.close().await;
                    return Ok(RpsOutcome {
                        status: message.status,
                        message: message.message,
                    });
                }
                method::ERROR => {
                    warn!(status = %message.status, "remote provisioning reported an error");
                    let _ = write.close().await;
                    return Err(Error::Rps {
                        message: if message.message.is_empty() {
                            message.status
                        } else {
                            message.message
                        },
                    });
                }
                _ => {
                    let request = message.decode_payload()?;
                    let response = forward(&lms, exchange_timeout, &request).await?;
                    let reply = RpsMessage::reply(method::RESPONSE, &app_version, &response);
                    send(&mut write, &reply).await?;
                }
            }
        }
    }
}

async fn send<S>(write: &mut S, message: &RpsMessage) -> Result<(), Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)?;
    write.send(Message::text(json)).await.map_err(map_ws_error)
}

/// One LMS round trip: connect, send, drain under an outer deadline, close.
async fn forward(lms: &LmsConfig, timeout: Duration, request: &[u8]) -> Result<Vec<u8>, Error> {
    debug!(bytes = request.len(), "forwarding rps payload to lms");
    let mut conn = LmsConnection::new(lms.clone());
    conn.connect().await?;
    conn.send(request).await?;

    let (mut conn, outcome) = conn.spawn_listen().finish(timeout).await?;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing lms session");
    }
    if let Some(err) = outcome.error {
        return Err(err);
    }
    Ok(outcome.frame.into_bytes())
}

fn map_ws_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Tls(e) => Error::Tls(e.to_string()),
        tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::InvalidData && e.to_string().contains("certificate") => {
            Error::Tls(e.to_string())
        }
        other => Error::WebSocket(other.to_string()),
    }
}
