// Fakes for the collaborator seams in `device`.

use std::cell::{Cell, RefCell};
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use amtctl_api::PthiClient;
use amtctl_api::models::{
    CertHash, ControlMode, LanSettings, PublicKeyCertificate, RemoteAccessStatus, VersionData,
};
use secrecy::{ExposeSecret, SecretString};

use crate::config::WifiProfile;
use crate::credentials::Credentials;
use crate::device::{
    AmtDevice, ConfiguratorFactory, HostFacts, LocalConfigurator, PasswordReader, SystemAccountSource,
};
use crate::error::CoreError;
use crate::system_account::HostInterface;

fn mock_failure() -> CoreError {
    CoreError::Device {
        message: "mock failure".into(),
    }
}

pub fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

// ── Device ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDevice {
    pub control_mode: Option<ControlMode>,
    pub fail_all: bool,
    pub mode_queries: Cell<u32>,
    pub seen_password: RefCell<Option<String>>,
    /// Refuse every query until `use_password` was called.
    pub locked: bool,
    pub session_password: RefCell<Option<String>>,
}

impl FakeDevice {
    pub fn in_mode(mode: ControlMode) -> Self {
        Self {
            control_mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn locked(mode: ControlMode) -> Self {
        Self {
            locked: true,
            ..Self::in_mode(mode)
        }
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.locked && self.session_password.borrow().is_none() {
            return Err(CoreError::Authentication {
                message: "AMT requires credentials for this request".into(),
            });
        }
        if self.fail_all { Err(mock_failure()) } else { Ok(()) }
    }
}

impl AmtDevice for FakeDevice {
    fn requires_password(&self) -> bool {
        self.locked
    }

    fn use_password(&self, password: &SecretString) {
        *self.session_password.borrow_mut() = Some(password.expose_secret().to_string());
    }

    async fn version_data(&self) -> Result<VersionData, CoreError> {
        self.check()?;
        Ok(VersionData {
            version: "16.1.25".into(),
            build: "2049".into(),
            sku: "16392".into(),
        })
    }

    async fn uuid(&self) -> Result<String, CoreError> {
        self.check()?;
        Ok("33221100-5544-7766-8899-aabbccddeeff".into())
    }

    async fn control_mode(&self) -> Result<ControlMode, CoreError> {
        self.mode_queries.set(self.mode_queries.get() + 1);
        self.check()?;
        self.control_mode.ok_or_else(mock_failure)
    }

    async fn dns_suffix(&self) -> Result<String, CoreError> {
        self.check()?;
        Ok("vpro.example.com".into())
    }

    async fn lan_settings(&self, wireless: bool) -> Result<LanSettings, CoreError> {
        self.check()?;
        Ok(LanSettings {
            is_enabled: true,
            link_status: if wireless { "down" } else { "up" }.into(),
            dhcp_enabled: true,
            dhcp_mode: "passive".into(),
            ip_address: "10.0.0.7".into(),
            mac_address: "a4:bb:6d:01:02:03".into(),
        })
    }

    async fn remote_access_status(&self) -> Result<RemoteAccessStatus, CoreError> {
        self.check()?;
        Ok(RemoteAccessStatus {
            network_status: "unknown".into(),
            remote_status: "not configured".into(),
            remote_trigger: "none".into(),
            mps_hostname: String::new(),
        })
    }

    async fn certificate_hashes(&self) -> Result<Vec<CertHash>, CoreError> {
        self.check()?;
        Ok(vec![CertHash {
            name: "VeriSign Universal Root Certification Authority".into(),
            algorithm: "SHA256".into(),
            hash: "2399561127a57125de8cefea610ddf2fa078b5c8067f4e828290bfb860e84b3c".into(),
            is_default: true,
            is_active: true,
        }])
    }

    async fn user_certificates(&self, password: &SecretString) -> Result<Vec<PublicKeyCertificate>, CoreError> {
        *self.seen_password.borrow_mut() = Some(password.expose_secret().to_string());
        self.check()?;
        Ok(vec![])
    }
}

// ── Host and operator ────────────────────────────────────────────────

pub struct FakeHost {
    pub dns_suffix: Option<String>,
    pub hostname: Option<String>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            dns_suffix: Some("corp.example.com".into()),
            hostname: Some("workstation".into()),
        }
    }
}

impl HostFacts for FakeHost {
    fn os_dns_suffix(&self) -> Option<String> {
        self.dns_suffix.clone()
    }

    fn os_hostname(&self) -> Option<String> {
        self.hostname.clone()
    }
}

/// Answers with a fixed password, or fails when `None`. Counts prompts.
#[derive(Default)]
pub struct FakeReader {
    pub password: Option<&'static str>,
    pub prompts: Cell<u32>,
}

impl FakeReader {
    pub fn answering(password: &'static str) -> Self {
        Self {
            password: Some(password),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

impl PasswordReader for FakeReader {
    fn read_password(&self) -> Result<SecretString, CoreError> {
        self.prompts.set(self.prompts.get() + 1);
        self.password
            .map(secret)
            .ok_or_else(|| CoreError::Internal("Read password failed".into()))
    }
}

pub struct FakeAccounts(pub Option<(&'static str, &'static str)>);

impl SystemAccountSource for FakeAccounts {
    async fn local_system_account(&self) -> Result<Credentials, CoreError> {
        self.0
            .map(|(user, password)| Credentials::new(user, secret(password)))
            .ok_or_else(|| CoreError::Unsupported {
                operation: "local system account".into(),
            })
    }
}

// ── Host interface ───────────────────────────────────────────────────

/// A PTHI client that answers `GetLocalSystemAccount` from memory.
pub struct FakeMei {
    reply: Vec<u8>,
    delay: Duration,
}

fn account_field(value: &str) -> [u8; 33] {
    let mut out = [0u8; 33];
    out[..value.len()].copy_from_slice(value.as_bytes());
    out
}

fn account_reply(status: u32, username: &str, password: &str) -> Vec<u8> {
    let mut out = vec![1, 1, 0, 0];
    out.extend_from_slice(&0x0480_0067u32.to_le_bytes());
    out.extend_from_slice(&70u32.to_le_bytes());
    out.extend_from_slice(&status.to_le_bytes());
    out.extend_from_slice(&account_field(username));
    out.extend_from_slice(&account_field(password));
    out
}

impl FakeMei {
    pub fn answering(username: &str, password: &str) -> Self {
        Self {
            reply: account_reply(0, username, password),
            delay: Duration::ZERO,
        }
    }

    pub fn refusing(status: u32) -> Self {
        Self {
            reply: account_reply(status, "", ""),
            delay: Duration::ZERO,
        }
    }

    pub fn stalled(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::answering("$$OsAdmin", "pw")
        }
    }
}

pub struct FakeMeiTransport {
    reply: Cursor<Vec<u8>>,
    delay: Duration,
}

impl Read for FakeMeiTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(self.delay);
        self.reply.read(buf)
    }
}

impl Write for FakeMeiTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl HostInterface for FakeMei {
    type Transport = FakeMeiTransport;

    fn open(&self) -> Result<PthiClient<FakeMeiTransport>, amtctl_api::Error> {
        let transport = FakeMeiTransport {
            reply: Cursor::new(self.reply.clone()),
            delay: self.delay,
        };
        Ok(PthiClient::new(transport, 512))
    }
}

// ── Configurator ─────────────────────────────────────────────────────

/// Records `(username, operation, secret)` for each call.
pub type CallLog = Rc<RefCell<Vec<(String, &'static str, String)>>>;

#[derive(Default)]
pub struct FakeFactory {
    pub calls: CallLog,
    pub fail: bool,
}

pub struct FakeConfigurator {
    username: String,
    calls: CallLog,
    fail: bool,
}

impl ConfiguratorFactory for FakeFactory {
    type Configurator = FakeConfigurator;

    fn open(&self, credentials: &Credentials) -> FakeConfigurator {
        FakeConfigurator {
            username: credentials.username.clone(),
            calls: Rc::clone(&self.calls),
            fail: self.fail,
        }
    }
}

impl FakeConfigurator {
    fn record(&self, operation: &'static str, secret: &SecretString) -> Result<(), CoreError> {
        self.calls
            .borrow_mut()
            .push((self.username.clone(), operation, secret.expose_secret().to_string()));
        if self.fail {
            Err(CoreError::Device {
                message: "Setup returned 2".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl LocalConfigurator for FakeConfigurator {
    async fn activate_ccm(&self, admin_password: &SecretString) -> Result<(), CoreError> {
        self.record("activate_ccm", admin_password)
    }

    async fn configure_8021x_wifi(&self, profile: &WifiProfile) -> Result<(), CoreError> {
        self.record("configure_8021x_wifi", &profile.password)
    }
}
