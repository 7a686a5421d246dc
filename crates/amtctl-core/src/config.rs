// ── Runtime operation settings ──
//
// What a local configuration or remote provisioning run needs beyond
// credentials. The CLI builds these from flags and the config file; core
// never reads files itself.

use std::time::Duration;

use amtctl_api::models::WifiSettings;
use amtctl_api::rps::DEFAULT_EXCHANGE_TIMEOUT;
use secrecy::SecretString;
use url::Url;

/// An 802.1x Wi-Fi profile and the EAP password that goes with it.
#[derive(Debug, Clone)]
pub struct WifiProfile {
    pub settings: WifiSettings,
    pub password: SecretString,
}

/// Where and how to run remote provisioning.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// RPS WebSocket endpoint (`wss://...`).
    pub url: Url,
    /// Provisioning profile name known to RPS.
    pub profile: String,
    /// Reported as `appVersion` and the payload's `client`.
    pub app_version: String,
    /// Outer deadline for each LMS exchange relayed for RPS.
    pub exchange_timeout: Duration,
}

impl RemoteSettings {
    pub fn new(url: Url, profile: impl Into<String>) -> Self {
        Self {
            url,
            profile: profile.into(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }
}
