// ── Device info collector ──
//
// Runs one query per requested field and records either its value or its
// error. A single failed query never aborts the report; the only fatal
// outcome is a missing password, either for a device that refuses
// unauthenticated queries or when user certificates are requested.

use amtctl_api::models::{
    CertHash, ControlMode, LanSettings, PublicKeyCertificate, RemoteAccessStatus, VersionData,
};
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Serialize;
use strum::{Display, EnumIter};
use tracing::{debug, warn};

use crate::decode;
use crate::device::{AmtDevice, HostFacts, PasswordReader};
use crate::error::CoreError;

/// Which fields to collect. `user_cert` may be switched off by the
/// collector when the device is not provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct InfoFlags {
    pub ver: bool,
    pub bld: bool,
    pub sku: bool,
    pub uuid: bool,
    pub mode: bool,
    pub dns: bool,
    pub hostname: bool,
    pub ras: bool,
    pub lan: bool,
    pub cert: bool,
    pub user_cert: bool,
}

impl InfoFlags {
    /// Everything, user certificates included.
    pub fn all() -> Self {
        Self {
            user_cert: true,
            ..Self::standard()
        }
    }

    /// Everything except user certificates, which need a password.
    pub fn standard() -> Self {
        Self {
            ver: true,
            bld: true,
            sku: true,
            uuid: true,
            mode: true,
            dns: true,
            hostname: true,
            ras: true,
            lan: true,
            cert: true,
            user_cert: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether any selected field is read from the firmware.
    pub fn queries_device(&self) -> bool {
        let host_only = Self {
            hostname: self.hostname,
            ..Self::default()
        };
        *self != host_only
    }
}

/// One reported field. Display is the text label; the serde name is the JSON key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum InfoField {
    #[strum(to_string = "Version")]
    #[serde(rename = "amt")]
    Version,
    #[strum(to_string = "Build Number")]
    #[serde(rename = "buildNumber")]
    Build,
    #[strum(to_string = "SKU")]
    #[serde(rename = "sku")]
    Sku,
    #[strum(to_string = "Features")]
    #[serde(rename = "features")]
    Features,
    #[strum(to_string = "UUID")]
    #[serde(rename = "uuid")]
    Uuid,
    #[strum(to_string = "Control Mode")]
    #[serde(rename = "controlMode")]
    ControlMode,
    #[strum(to_string = "DNS Suffix")]
    #[serde(rename = "dnsSuffix")]
    DnsSuffix,
    #[strum(to_string = "DNS Suffix (OS)")]
    #[serde(rename = "dnsSuffixOS")]
    DnsSuffixOs,
    #[strum(to_string = "Hostname (OS)")]
    #[serde(rename = "hostnameOS")]
    HostnameOs,
    #[strum(to_string = "RAS")]
    #[serde(rename = "ras")]
    RemoteAccess,
    #[strum(to_string = "Wired Adapter")]
    #[serde(rename = "wiredAdapter")]
    WiredAdapter,
    #[strum(to_string = "Wireless Adapter")]
    #[serde(rename = "wirelessAdapter")]
    WirelessAdapter,
    #[strum(to_string = "Certificate Hashes")]
    #[serde(rename = "certificateHashes")]
    CertificateHashes,
    #[strum(to_string = "Public Key Certs")]
    #[serde(rename = "userCertificates")]
    UserCertificates,
}

/// A collected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InfoValue {
    Text(String),
    RemoteAccess(RemoteAccessStatus),
    Lan(LanSettings),
    CertificateHashes(Vec<CertHash>),
    UserCertificates(Vec<PublicKeyCertificate>),
}

impl From<String> for InfoValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Values and per-field errors, in collection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoReport {
    #[serde(flatten)]
    values: IndexMap<InfoField, InfoValue>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    errors: IndexMap<InfoField, String>,
}

impl InfoReport {
    pub fn insert(&mut self, field: InfoField, value: impl Into<InfoValue>) {
        self.values.insert(field, value.into());
    }

    pub fn record_error(&mut self, field: InfoField, error: &CoreError) {
        warn!(%field, %error, "query failed");
        self.errors.insert(field, error.to_string());
    }

    pub fn value(&self, field: InfoField) -> Option<&InfoValue> {
        self.values.get(&field)
    }

    pub fn error(&self, field: InfoField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = (InfoField, &InfoValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn errors(&self) -> impl Iterator<Item = (InfoField, &str)> {
        self.errors.iter().map(|(field, error)| (*field, error.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.errors.is_empty()
    }

    fn record<T>(&mut self, field: InfoField, result: Result<T, CoreError>)
    where
        T: Into<InfoValue>,
    {
        match result {
            Ok(value) => self.insert(field, value),
            Err(e) => self.record_error(field, &e),
        }
    }
}

impl From<RemoteAccessStatus> for InfoValue {
    fn from(status: RemoteAccessStatus) -> Self {
        Self::RemoteAccess(status)
    }
}

impl From<LanSettings> for InfoValue {
    fn from(settings: LanSettings) -> Self {
        Self::Lan(settings)
    }
}

impl From<Vec<CertHash>> for InfoValue {
    fn from(hashes: Vec<CertHash>) -> Self {
        Self::CertificateHashes(hashes)
    }
}

impl From<Vec<PublicKeyCertificate>> for InfoValue {
    fn from(certs: Vec<PublicKeyCertificate>) -> Self {
        Self::UserCertificates(certs)
    }
}

// ── Collector ────────────────────────────────────────────────────────

/// Gathers an [`InfoReport`] from a device and the host.
pub struct InfoCollector<'a, D, H, P> {
    device: &'a D,
    host: &'a H,
    reader: &'a P,
}

impl<'a, D, H, P> InfoCollector<'a, D, H, P>
where
    D: AmtDevice,
    H: HostFacts,
    P: PasswordReader,
{
    pub fn new(device: &'a D, host: &'a H, reader: &'a P) -> Self {
        Self { device, host, reader }
    }

    /// Collect every field set in `flags`.
    ///
    /// The password is settled once, before any field is queried. A device
    /// that refuses unauthenticated queries gets `password`, or a prompted
    /// one when `password` is `None`, for the whole collection. Otherwise,
    /// if user certificates are requested the control mode is checked first
    /// and `flags.user_cert` is cleared when the check fails or the device is
    /// still pre-provisioned; if the flag survives without a password the
    /// operator is prompted. A failed prompt aborts with
    /// [`CoreError::MissingOrIncorrectPassword`] and leaves `flags` as given.
    pub async fn collect(
        &self,
        flags: &mut InfoFlags,
        password: Option<&SecretString>,
    ) -> Result<InfoReport, CoreError> {
        let mut report = InfoReport::default();

        let upfront = if password.is_none() && flags.queries_device() && self.device.requires_password() {
            Some(self.prompt()?)
        } else {
            None
        };
        let supplied = password.or(upfront.as_ref());
        if let Some(password) = supplied {
            self.device.use_password(password);
        }

        let mut checked_mode = None;
        if flags.user_cert {
            let mode = self.device.control_mode().await;
            match &mode {
                Ok(ControlMode::PreProvisioning) => {
                    debug!("device is not provisioned, skipping user certificates");
                    flags.user_cert = false;
                }
                Err(e) => {
                    warn!(error = %e, "control mode check failed, skipping user certificates");
                    flags.user_cert = false;
                }
                Ok(_) => {}
            }
            checked_mode = Some(mode);
        }

        let late = if flags.user_cert && supplied.is_none() {
            Some(self.prompt()?)
        } else {
            None
        };
        let password = supplied.or(late.as_ref());

        if flags.ver || flags.bld || flags.sku {
            match self.device.version_data().await {
                Ok(data) => record_version(&mut report, flags, &data),
                Err(e) => {
                    for (wanted, field) in [
                        (flags.ver, InfoField::Version),
                        (flags.bld, InfoField::Build),
                        (flags.sku, InfoField::Sku),
                    ] {
                        if wanted {
                            report.record_error(field, &e);
                        }
                    }
                }
            }
        }

        if flags.uuid {
            report.record(InfoField::Uuid, self.device.uuid().await);
        }

        if flags.mode {
            let mode = match checked_mode {
                Some(mode) => mode,
                None => self.device.control_mode().await,
            };
            report.record(InfoField::ControlMode, mode.map(|m| m.to_string()));
        }

        if flags.dns {
            report.record(InfoField::DnsSuffix, self.device.dns_suffix().await);
            report.record(
                InfoField::DnsSuffixOs,
                self.host.os_dns_suffix().ok_or_else(|| CoreError::Device {
                    message: "no DNS suffix configured on the host".into(),
                }),
            );
        }

        if flags.hostname {
            report.record(
                InfoField::HostnameOs,
                self.host.os_hostname().ok_or_else(|| CoreError::Device {
                    message: "host name unavailable".into(),
                }),
            );
        }

        if flags.ras {
            report.record(InfoField::RemoteAccess, self.device.remote_access_status().await);
        }

        if flags.lan {
            report.record(InfoField::WiredAdapter, self.device.lan_settings(false).await);
            report.record(InfoField::WirelessAdapter, self.device.lan_settings(true).await);
        }

        if flags.cert {
            report.record(InfoField::CertificateHashes, self.device.certificate_hashes().await);
        }

        if flags.user_cert {
            if let Some(password) = password {
                report.record(
                    InfoField::UserCertificates,
                    self.device.user_certificates(password).await,
                );
            }
        }

        Ok(report)
    }

    fn prompt(&self) -> Result<SecretString, CoreError> {
        self.reader
            .read_password()
            .map_err(|e| CoreError::MissingOrIncorrectPassword { reason: e.to_string() })
    }
}

fn record_version(report: &mut InfoReport, flags: &InfoFlags, data: &VersionData) {
    if flags.ver {
        report.insert(InfoField::Version, data.version.clone());
    }
    if flags.bld {
        report.insert(InfoField::Build, data.build.clone());
    }
    if flags.sku {
        report.insert(InfoField::Sku, data.sku.clone());
        report.insert(InfoField::Features, decode::describe(&data.version, &data.sku));
    }
}
