//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help
//! text and a stable exit status.

use miette::Diagnostic;
use thiserror::Error;

use amtctl_config::ConfigError;
use amtctl_core::CoreError;

/// Process exit statuses.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AMT_UNAVAILABLE: i32 = 3;
    pub const CREDENTIAL_RESOLUTION: i32 = 4;
    pub const MISSING_PASSWORD: i32 = 5;
    pub const ACTIVATION: i32 = 6;
    pub const REMOTE: i32 = 7;
    pub const SERVER_CERTIFICATE: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach AMT through LMS at {endpoint}")]
    #[diagnostic(
        code(amtctl::lms_unavailable),
        help(
            "Check that the Intel AMT driver and the LMS service are running.\n\
             Override the endpoint with --lms-host / --lms-port.\n\
             Cause: {reason}"
        )
    )]
    AmtUnavailable { endpoint: String, reason: String },

    #[error("LMS exchange failed: {message}")]
    #[diagnostic(code(amtctl::transport))]
    Transport { message: String },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("Failed to resolve the local system account")]
    #[diagnostic(
        code(amtctl::credential_resolution),
        help("Run without --lsa and supply the AMT password instead.\nCause: {reason}")
    )]
    CredentialResolution { reason: String },

    #[error("Missing or incorrect password")]
    #[diagnostic(
        code(amtctl::missing_password),
        help("Pass --password or set AMT_PASSWORD.\nCause: {reason}")
    )]
    MissingOrIncorrectPassword { reason: String },

    // ── Operations ───────────────────────────────────────────────────
    #[error("Activation or configuration failed: {message}")]
    #[diagnostic(code(amtctl::activation))]
    Activation { message: String },

    #[error("Remote provisioning failed: {message}")]
    #[diagnostic(code(amtctl::remote))]
    Remote { message: String },

    #[error("Could not establish a secure session with the provisioning server")]
    #[diagnostic(
        code(amtctl::server_certificate),
        help("Check the RPS URL and that its certificate chains to a public root.\nCause: {message}")
    )]
    ServerCertificate { message: String },

    // ── Usage / configuration ────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(amtctl::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(amtctl::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(amtctl::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(amtctl::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AmtUnavailable { .. } | Self::Transport { .. } => exit_code::AMT_UNAVAILABLE,
            Self::CredentialResolution { .. } => exit_code::CREDENTIAL_RESOLUTION,
            Self::MissingOrIncorrectPassword { .. } => exit_code::MISSING_PASSWORD,
            Self::Activation { .. } => exit_code::ACTIVATION,
            Self::Remote { .. } => exit_code::REMOTE,
            Self::ServerCertificate { .. } => exit_code::SERVER_CERTIFICATE,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(ConfigError::Validation { .. } | ConfigError::MissingSecret { .. }) => exit_code::USAGE,
            Self::Config(ConfigError::Figment(_)) | Self::Io(_) | Self::Json(_) | Self::Internal(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Connection { endpoint, reason } => CliError::AmtUnavailable { endpoint, reason },

            CoreError::Transport { message } => CliError::Transport { message },

            CoreError::Timeout { .. } => CliError::Transport {
                message: err.to_string(),
            },

            // The firmware rejected the digest credentials.
            CoreError::Authentication { message } => CliError::MissingOrIncorrectPassword { reason: message },

            CoreError::CredentialResolution { reason } => CliError::CredentialResolution { reason },

            CoreError::MissingOrIncorrectPassword { reason } => CliError::MissingOrIncorrectPassword { reason },

            CoreError::Device { .. } | CoreError::Unsupported { .. } | CoreError::Activation { .. } => {
                match err.into_activation() {
                    CoreError::Activation { message } => CliError::Activation { message },
                    other => CliError::Internal(other.to_string()),
                }
            }

            CoreError::Remote { message } => CliError::Remote { message },

            CoreError::ServerCertificate { message } => CliError::ServerCertificate { message },

            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
