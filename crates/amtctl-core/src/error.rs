// ── Core error types ──
//
// Run-level errors from amtctl-core. Callers never see HTTP statuses or SOAP
// faults directly: the `From<amtctl_api::Error>` impl folds transport errors
// into these variants, which the CLI maps onto exit codes.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to LMS at {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Credential errors ────────────────────────────────────────────
    #[error("Failed to resolve the local system account: {reason}")]
    CredentialResolution { reason: String },

    #[error("Missing or incorrect password: {reason}")]
    MissingOrIncorrectPassword { reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Device query failed: {message}")]
    Device { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Activation failed: {message}")]
    Activation { message: String },

    #[error("Remote provisioning failed: {message}")]
    Remote { message: String },

    #[error("Server certificate verification failed: {message}")]
    ServerCertificate { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Re-label a device-side failure as an activation/configuration failure.
    ///
    /// Connection and authentication failures keep their own kind.
    pub fn into_activation(self) -> Self {
        match self {
            Self::Device { message } | Self::Transport { message } => Self::Activation { message },
            Self::Unsupported { operation } => Self::Activation {
                message: format!("{operation} is not supported"),
            },
            other => other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<amtctl_api::Error> for CoreError {
    fn from(err: amtctl_api::Error) -> Self {
        use amtctl_api::Error as Api;
        match err {
            Api::Connection { endpoint, source } => CoreError::Connection {
                endpoint,
                reason: source.to_string(),
            },
            Api::NotConnected => CoreError::Connection {
                endpoint: String::new(),
                reason: "no connection to LMS".into(),
            },
            Api::Transport(e) => CoreError::Transport {
                message: e.to_string(),
            },
            Api::Truncated { .. } | Api::Http(_) => CoreError::Transport {
                message: err.to_string(),
            },
            Api::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            Api::Authentication { message } => CoreError::Authentication { message },
            Api::Wsman { message } => CoreError::Device { message },
            Api::ReturnValue { .. } => CoreError::Device {
                message: err.to_string(),
            },
            Api::Unsupported(operation) => CoreError::Unsupported {
                operation: operation.to_string(),
            },
            Api::Mei { .. } | Api::HostInterface(_) => CoreError::Transport {
                message: err.to_string(),
            },
            Api::Pthi { .. } | Api::PthiStatus { .. } => CoreError::Device {
                message: err.to_string(),
            },
            Api::Rps { message } => CoreError::Remote { message },
            Api::WebSocket(message) => CoreError::Remote { message },
            Api::Tls(message) => CoreError::ServerCertificate { message },
            Api::Deserialization { message } => CoreError::Internal(format!("Deserialization error: {message}")),
        }
    }
}
