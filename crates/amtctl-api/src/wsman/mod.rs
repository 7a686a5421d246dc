//! WS-Management over the LMS session channel.
//!
//! The firmware's management web service sits behind LMS on the same
//! loopback port. [`WsmanClient`] posts SOAP envelopes there, answers the
//! HTTP Digest challenge, and exposes typed queries and method invocations
//! as inherent methods split across `queries` and `setup`.

mod client;
pub mod digest;
pub mod envelope;
mod queries;
mod setup;
pub mod xml;

pub use client::{DEFAULT_RESPONSE_BUDGET, DigestCredentials, WsmanClient};
pub use envelope::Resource;
