//! Configuration for the amtctl agent.
//!
//! A TOML file in the platform config directory, overlaid with `AMTCTL_*`
//! environment variables, translated into the runtime settings structs of
//! `amtctl_core`. Secrets never live in the file: the Wi-Fi EAP password is
//! looked up through the environment variable the file names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use amtctl_core::{
    EapProtocol, HostInterfaceAccounts, LmsConfig, MeiDevice, RemoteSettings, WifiProfile, WifiSettings,
    WsmanSettings,
};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const ENV_PREFIX: &str = "AMTCTL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("environment variable {var} holding the Wi-Fi password is not set")]
    MissingSecret { var: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub lms: LmsSection,

    #[serde(default)]
    pub rps: RpsSection,

    #[serde(default)]
    pub mei: MeiSection,

    /// 802.1x Wi-Fi profile; absent unless configured.
    #[serde(default)]
    pub wifi: Option<WifiSection>,
}

/// Where LMS listens.
#[derive(Debug, Deserialize, Serialize)]
pub struct LmsSection {
    #[serde(default = "default_lms_host")]
    pub host: String,

    #[serde(default = "default_lms_port")]
    pub port: u16,

    /// Per-read deadline of one listen call.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// How long one WS-Management response may take to arrive in full.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for LmsSection {
    fn default() -> Self {
        Self {
            host: default_lms_host(),
            port: default_lms_port(),
            read_timeout_ms: default_read_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

fn default_lms_host() -> String {
    "localhost".into()
}
fn default_lms_port() -> u16 {
    16992
}
fn default_read_timeout_ms() -> u64 {
    1000
}
fn default_response_timeout_ms() -> u64 {
    15_000
}

/// The host interface the local system account is read from.
#[derive(Debug, Deserialize, Serialize)]
pub struct MeiSection {
    #[serde(default = "default_mei_device")]
    pub device: PathBuf,

    #[serde(default = "default_mei_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MeiSection {
    fn default() -> Self {
        Self {
            device: default_mei_device(),
            timeout_ms: default_mei_timeout_ms(),
        }
    }
}

fn default_mei_device() -> PathBuf {
    MeiDevice::default().path
}
fn default_mei_timeout_ms() -> u64 {
    5000
}

/// Remote provisioning server.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RpsSection {
    /// `wss://` endpoint.
    pub url: Option<String>,

    /// Profile name known to the server.
    pub profile: Option<String>,

    /// Deadline for each LMS exchange relayed for the server.
    pub exchange_timeout_ms: Option<u64>,
}

/// An 802.1x Wi-Fi profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct WifiSection {
    #[serde(default = "default_wifi_profile_name")]
    pub profile_name: String,

    pub ssid: String,

    #[serde(default = "default_wifi_priority")]
    pub priority: u32,

    pub username: String,

    /// EAP method: `peap-mschapv2`, `ttls-mschapv2`, `gtc`, `fast-mschapv2`
    /// or `fast-gtc`.
    #[serde(default = "default_auth_protocol")]
    pub auth_protocol: String,

    /// Environment variable holding the EAP password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl WifiSection {
    /// A section with defaults for everything but the network and identity.
    pub fn new(ssid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            profile_name: default_wifi_profile_name(),
            ssid: ssid.into(),
            priority: default_wifi_priority(),
            username: username.into(),
            auth_protocol: default_auth_protocol(),
            password_env: default_password_env(),
        }
    }
}

fn default_wifi_profile_name() -> String {
    "wifi-8021x".into()
}
fn default_wifi_priority() -> u32 {
    1
}
fn default_auth_protocol() -> String {
    "peap-mschapv2".into()
}
fn default_password_env() -> String {
    "AMT_WIFI_PASSWORD".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "amtctl", "amtctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("amtctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` and the environment.
///
/// A missing file is not an error. Nested keys use a double underscore,
/// e.g. `AMTCTL_LMS__PORT=16993`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Translation to runtime settings ─────────────────────────────────

impl Config {
    pub fn lms_config(&self) -> LmsConfig {
        LmsConfig {
            host: self.lms.host.clone(),
            port: self.lms.port,
            read_timeout: Duration::from_millis(self.lms.read_timeout_ms),
        }
    }

    pub fn wsman_settings(&self) -> WsmanSettings {
        WsmanSettings {
            lms: self.lms_config(),
            response_budget: Duration::from_millis(self.lms.response_timeout_ms),
        }
    }

    /// Local system account source backed by the `[mei]` device.
    pub fn system_accounts(&self) -> HostInterfaceAccounts<MeiDevice> {
        HostInterfaceAccounts::new(MeiDevice {
            path: self.mei.device.clone(),
        })
        .with_timeout(Duration::from_millis(self.mei.timeout_ms))
    }

    /// Remote settings from the `[rps]` section, with optional overrides.
    ///
    /// Returns `None` when no URL is known.
    pub fn remote_settings(
        &self,
        url_override: Option<&str>,
        profile_override: Option<&str>,
    ) -> Result<Option<RemoteSettings>, ConfigError> {
        let Some(raw) = url_override.or(self.rps.url.as_deref()) else {
            return Ok(None);
        };
        let url = parse_rps_url(raw)?;
        let profile = profile_override.or(self.rps.profile.as_deref()).unwrap_or_default();

        let mut settings = RemoteSettings::new(url, profile);
        if let Some(ms) = self.rps.exchange_timeout_ms {
            settings.exchange_timeout = Duration::from_millis(ms);
        }
        Ok(Some(settings))
    }

    /// The `[wifi]` profile with its password resolved from the environment.
    pub fn wifi_profile(&self) -> Result<Option<WifiProfile>, ConfigError> {
        let Some(wifi) = &self.wifi else {
            return Ok(None);
        };
        let auth_protocol = parse_auth_protocol(&wifi.auth_protocol)?;
        let password = std::env::var(&wifi.password_env)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingSecret {
                var: wifi.password_env.clone(),
            })?;

        Ok(Some(WifiProfile {
            settings: WifiSettings {
                profile_name: wifi.profile_name.clone(),
                ssid: wifi.ssid.clone(),
                priority: wifi.priority,
                auth_protocol,
                username: wifi.username.clone(),
            },
            password,
        }))
    }
}

fn parse_rps_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: "rps.url".into(),
        reason: format!("{raw}: {e}"),
    })?;
    match url.scheme() {
        "wss" | "ws" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "rps.url".into(),
            reason: format!("expected a wss:// URL, got scheme '{other}'"),
        }),
    }
}

/// Parse an EAP method name. Certificate-based methods are accepted here
/// and rejected by the device layer.
pub fn parse_auth_protocol(name: &str) -> Result<EapProtocol, ConfigError> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "tls" | "eap-tls" => EapProtocol::Tls,
        "ttls-mschapv2" => EapProtocol::TtlsMschapV2,
        "peap-mschapv2" => EapProtocol::PeapMschapV2,
        "gtc" | "eap-gtc" => EapProtocol::Gtc,
        "fast-mschapv2" => EapProtocol::FastMschapV2,
        "fast-gtc" => EapProtocol::FastGtc,
        "fast-tls" => EapProtocol::FastTls,
        other => {
            return Err(ConfigError::Validation {
                field: "wifi.auth_protocol".into(),
                reason: format!("unknown EAP method '{other}'"),
            });
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const FULL: &str = r#"
        [lms]
        host = "127.0.0.1"
        read_timeout_ms = 2500

        [rps]
        url = "wss://rps.example.com/activate"
        profile = "acm-profile"

        [wifi]
        ssid = "CorpNet"
        username = "agent"
        auth_protocol = "ttls-mschapv2"
        password_env = "TEST_WIFI_SECRET"
    "#;

    #[test]
    fn defaults_without_a_file() {
        Jail::expect_with(|jail| {
            let config = load_config_from(&jail.directory().join("missing.toml")).unwrap();
            assert_eq!(config.lms_config(), LmsConfig::default());
            assert!(config.wifi.is_none());
            assert!(config.remote_settings(None, None).unwrap().is_none());
            Ok(())
        });
    }

    #[test]
    fn file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", FULL)?;
            jail.set_env("AMTCTL_LMS__PORT", "16993");
            let config = load_config_from(&jail.directory().join("config.toml")).unwrap();

            let lms = config.lms_config();
            assert_eq!(lms.host, "127.0.0.1");
            assert_eq!(lms.port, 16993);
            assert_eq!(lms.read_timeout, Duration::from_millis(2500));
            assert_eq!(config.wsman_settings().response_budget, Duration::from_secs(15));
            Ok(())
        });
    }

    #[test]
    fn flags_override_rps_section() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", FULL)?;
            let config = load_config_from(&jail.directory().join("config.toml")).unwrap();

            let from_file = config.remote_settings(None, None).unwrap().unwrap();
            assert_eq!(from_file.profile, "acm-profile");

            let overridden = config
                .remote_settings(Some("wss://other.example.com/"), Some("ccm"))
                .unwrap()
                .unwrap();
            assert_eq!(overridden.url.host_str(), Some("other.example.com"));
            assert_eq!(overridden.profile, "ccm");
            Ok(())
        });
    }

    #[test]
    fn mei_device_defaults_and_overrides() {
        Jail::expect_with(|jail| {
            let config = load_config_from(&jail.directory().join("missing.toml")).unwrap();
            assert_eq!(config.mei.device, PathBuf::from("/dev/mei0"));

            jail.create_file("config.toml", "[mei]\ndevice = \"/dev/mei1\"\n")?;
            jail.set_env("AMTCTL_MEI__TIMEOUT_MS", "750");
            let config = load_config_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(config.mei.device, PathBuf::from("/dev/mei1"));
            assert_eq!(config.mei.timeout_ms, 750);
            Ok(())
        });
    }

    #[test]
    fn rps_url_must_be_websocket() {
        let config = Config::default();
        let err = config.remote_settings(Some("https://rps.example.com"), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn wifi_password_comes_from_the_named_variable() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", FULL)?;
            let config = load_config_from(&jail.directory().join("config.toml")).unwrap();
            assert!(matches!(
                config.wifi_profile().unwrap_err(),
                ConfigError::MissingSecret { .. }
            ));

            jail.set_env("TEST_WIFI_SECRET", "eap-pass");
            let profile = config.wifi_profile().unwrap().unwrap();
            assert_eq!(profile.password.expose_secret(), "eap-pass");
            assert_eq!(profile.settings.auth_protocol, EapProtocol::TtlsMschapV2);
            assert_eq!(profile.settings.profile_name, "wifi-8021x");
            Ok(())
        });
    }

    #[test]
    fn unknown_eap_method_is_rejected() {
        assert!(parse_auth_protocol("leap").is_err());
        assert_eq!(parse_auth_protocol("PEAP-MSCHAPv2").unwrap(), EapProtocol::PeapMschapV2);
    }
}
