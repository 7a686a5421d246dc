// ── WS-Management backend ──
//
// Implements the collaborator traits on top of `amtctl_api::WsmanClient`.
// Each operation that needs different credentials gets its own client.

use std::sync::OnceLock;
use std::time::Duration;

use amtctl_api::models::{
    CertHash, ControlMode, LanSettings, PublicKeyCertificate, RemoteAccessStatus, VersionData,
};
use amtctl_api::wsman::DEFAULT_RESPONSE_BUDGET;
use amtctl_api::{DigestCredentials, LmsConfig, WsmanClient};
use secrecy::SecretString;

use crate::config::WifiProfile;
use crate::credentials::Credentials;
use crate::device::{AmtDevice, ConfiguratorFactory, LocalConfigurator};
use crate::error::CoreError;

/// Where the firmware web service is and how long a response may take.
#[derive(Debug, Clone)]
pub struct WsmanSettings {
    pub lms: LmsConfig,
    pub response_budget: Duration,
}

impl Default for WsmanSettings {
    fn default() -> Self {
        Self {
            lms: LmsConfig::default(),
            response_budget: DEFAULT_RESPONSE_BUDGET,
        }
    }
}

impl WsmanSettings {
    fn client(&self, credentials: Option<&Credentials>) -> WsmanClient {
        let digest = credentials.map(|c| DigestCredentials {
            username: c.username.clone(),
            password: c.password.clone(),
        });
        WsmanClient::new(self.lms.clone(), digest).with_response_budget(self.response_budget)
    }
}

// ── Queries ──────────────────────────────────────────────────────────

/// Read-only device access, optionally authenticated as `admin`.
///
/// The client is fixed by the first password supplied or, failing that,
/// by the first query, which then goes out unauthenticated.
pub struct WsmanDevice {
    settings: WsmanSettings,
    client: OnceLock<WsmanClient>,
}

impl WsmanDevice {
    pub fn new(settings: WsmanSettings, admin_password: Option<SecretString>) -> Self {
        let device = Self {
            settings,
            client: OnceLock::new(),
        };
        if let Some(password) = admin_password {
            device.use_password(&password);
        }
        device
    }

    fn client(&self) -> &WsmanClient {
        self.client.get_or_init(|| self.settings.client(None))
    }
}

impl AmtDevice for WsmanDevice {
    /// The firmware answers every WS-Management request with a digest
    /// challenge.
    fn requires_password(&self) -> bool {
        self.client.get().is_none()
    }

    fn use_password(&self, password: &SecretString) {
        let admin = Credentials::admin(password.clone());
        let _ = self.client.set(self.settings.client(Some(&admin)));
    }

    async fn version_data(&self) -> Result<VersionData, CoreError> {
        Ok(self.client().version_data().await?)
    }

    async fn uuid(&self) -> Result<String, CoreError> {
        Ok(self.client().uuid().await?)
    }

    async fn control_mode(&self) -> Result<ControlMode, CoreError> {
        Ok(self.client().control_mode().await?)
    }

    async fn dns_suffix(&self) -> Result<String, CoreError> {
        Ok(self.client().general_settings().await?.domain_name)
    }

    async fn lan_settings(&self, wireless: bool) -> Result<LanSettings, CoreError> {
        Ok(self.client().lan_settings(wireless).await?)
    }

    async fn remote_access_status(&self) -> Result<RemoteAccessStatus, CoreError> {
        Ok(self.client().remote_access_status().await?)
    }

    async fn certificate_hashes(&self) -> Result<Vec<CertHash>, CoreError> {
        Ok(self.client().certificate_hashes().await?)
    }

    async fn user_certificates(&self, password: &SecretString) -> Result<Vec<PublicKeyCertificate>, CoreError> {
        let admin = Credentials::admin(password.clone());
        Ok(self.settings.client(Some(&admin)).public_key_certificates().await?)
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Opens authenticated configuration sessions.
pub struct WsmanConfigurators {
    settings: WsmanSettings,
}

impl WsmanConfigurators {
    pub fn new(settings: WsmanSettings) -> Self {
        Self { settings }
    }
}

pub struct WsmanConfigurator {
    client: WsmanClient,
}

impl ConfiguratorFactory for WsmanConfigurators {
    type Configurator = WsmanConfigurator;

    fn open(&self, credentials: &Credentials) -> WsmanConfigurator {
        WsmanConfigurator {
            client: self.settings.client(Some(credentials)),
        }
    }
}

impl LocalConfigurator for WsmanConfigurator {
    async fn activate_ccm(&self, admin_password: &SecretString) -> Result<(), CoreError> {
        Ok(self.client.host_based_setup(admin_password).await?)
    }

    async fn configure_8021x_wifi(&self, profile: &WifiProfile) -> Result<(), CoreError> {
        Ok(self
            .client
            .add_wifi_settings(&profile.settings, &profile.password)
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn unreachable() -> WsmanSettings {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        WsmanSettings {
            lms: LmsConfig {
                host: "127.0.0.1".into(),
                port,
                ..LmsConfig::default()
            },
            response_budget: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn unreachable_lms_is_a_connection_error() {
        let device = WsmanDevice::new(unreachable(), None);
        let err = device.control_mode().await.unwrap_err();
        assert!(matches!(err, CoreError::Connection { .. }), "{err:?}");
    }

    #[test]
    fn password_is_needed_until_one_is_supplied() {
        let device = WsmanDevice::new(WsmanSettings::default(), None);
        assert!(device.requires_password());
        device.use_password(&SecretString::from("pw".to_string()));
        assert!(!device.requires_password());

        let device = WsmanDevice::new(WsmanSettings::default(), Some(SecretString::from("pw".to_string())));
        assert!(!device.requires_password());
    }

    #[tokio::test]
    async fn configuration_errors_pass_through_untouched() {
        let configurator = WsmanConfigurators::new(unreachable())
            .open(&Credentials::admin(SecretString::from("pw".to_string())));
        let err = configurator
            .activate_ccm(&SecretString::from("new".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Connection { .. }));
    }
}
