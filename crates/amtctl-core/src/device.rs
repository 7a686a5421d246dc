// ── Collaborator seams ──
//
// The collector and dispatcher talk to the firmware, the operator and the
// host only through these traits. The CLI wires in the WS-Man backend, a
// terminal password prompt and the real host; tests wire in fakes.

use amtctl_api::models::{
    CertHash, ControlMode, LanSettings, PublicKeyCertificate, RemoteAccessStatus, VersionData,
};
use secrecy::SecretString;

use crate::config::WifiProfile;
use crate::credentials::Credentials;
use crate::error::CoreError;

/// Read-only firmware queries used by the info collector and the
/// activation payload builder.
#[allow(async_fn_in_trait)]
pub trait AmtDevice {
    /// Whether queries are refused until an admin password is supplied.
    fn requires_password(&self) -> bool;
    /// Authenticate later queries as `admin` with `password`.
    fn use_password(&self, password: &SecretString);

    async fn version_data(&self) -> Result<VersionData, CoreError>;
    async fn uuid(&self) -> Result<String, CoreError>;
    async fn control_mode(&self) -> Result<ControlMode, CoreError>;
    /// DNS suffix configured in the firmware.
    async fn dns_suffix(&self) -> Result<String, CoreError>;
    async fn lan_settings(&self, wireless: bool) -> Result<LanSettings, CoreError>;
    async fn remote_access_status(&self) -> Result<RemoteAccessStatus, CoreError>;
    async fn certificate_hashes(&self) -> Result<Vec<CertHash>, CoreError>;
    /// Certificates in the public key store; needs the admin password.
    async fn user_certificates(&self, password: &SecretString) -> Result<Vec<PublicKeyCertificate>, CoreError>;
}

/// Source of the device-local system account.
#[allow(async_fn_in_trait)]
pub trait SystemAccountSource {
    async fn local_system_account(&self) -> Result<Credentials, CoreError>;
}

/// Interactive password entry.
pub trait PasswordReader {
    fn read_password(&self) -> Result<SecretString, CoreError>;
}

/// Facts the host OS knows about itself.
pub trait HostFacts {
    fn os_dns_suffix(&self) -> Option<String>;
    fn os_hostname(&self) -> Option<String>;
}

/// State-changing operations on a management session opened with
/// resolved credentials.
#[allow(async_fn_in_trait)]
pub trait LocalConfigurator {
    /// Activate in client control mode, setting `admin_password`.
    async fn activate_ccm(&self, admin_password: &SecretString) -> Result<(), CoreError>;
    async fn configure_8021x_wifi(&self, profile: &WifiProfile) -> Result<(), CoreError>;
}

/// Opens a [`LocalConfigurator`] for a set of credentials.
pub trait ConfiguratorFactory {
    type Configurator: LocalConfigurator;

    fn open(&self, credentials: &Credentials) -> Self::Configurator;
}
