// amtctl-api: Transport for Intel AMT (LMS session channel, WS-Management, RPS, MEI host interface)

pub mod error;
pub mod heci;
pub mod http;
pub mod lms;
pub mod models;
pub mod rps;
pub mod wsman;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_support;

pub use error::Error;
pub use heci::{LocalSystemAccount, PthiClient};
pub use lms::{DrainEnd, ListenHandle, ListenOutcome, LmsConfig, LmsConnection, RawFrame};
pub use rps::{ActivationPayload, RemoteSession, RpsMessage, RpsOutcome};
pub use wsman::{DigestCredentials, WsmanClient};
