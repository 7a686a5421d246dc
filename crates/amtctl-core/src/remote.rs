// ── Remote provisioning ──
//
// Builds the opening RPS message from device and host facts, then hands the
// device to the server through a `RemoteProvisioner`.

use amtctl_api::models::ControlMode;
use amtctl_api::{ActivationPayload, LmsConfig, RemoteSession, RpsMessage, RpsOutcome};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RemoteSettings;
use crate::credentials::ADMIN_USERNAME;
use crate::device::{AmtDevice, HostFacts, PasswordReader};
use crate::error::CoreError;

/// Build the `activation` message for `settings.profile`.
///
/// The AMT password is required: it is taken from `password` or prompted
/// for once, and a failed prompt is [`CoreError::MissingOrIncorrectPassword`].
/// Device facts are best effort; a failed query leaves its field empty.
pub async fn prepare_initial_message<D, H, P>(
    device: &D,
    host: &H,
    reader: &P,
    settings: &RemoteSettings,
    password: Option<&SecretString>,
) -> Result<RpsMessage, CoreError>
where
    D: AmtDevice,
    H: HostFacts,
    P: PasswordReader,
{
    let password = match password {
        Some(p) => p.clone(),
        None => reader
            .read_password()
            .map_err(|e| CoreError::MissingOrIncorrectPassword {
                reason: e.to_string(),
            })?,
    };
    device.use_password(&password);

    let version = best_effort("version", device.version_data().await).unwrap_or_default();
    let uuid = best_effort("uuid", device.uuid().await).unwrap_or_default();
    let mode = best_effort("control mode", device.control_mode().await).unwrap_or(ControlMode::PreProvisioning);
    let cert_hashes = best_effort("certificate hashes", device.certificate_hashes().await)
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.hash)
        .collect();
    let fqdn = match best_effort("dns suffix", device.dns_suffix().await) {
        Some(suffix) if !suffix.is_empty() => suffix,
        _ => host.os_dns_suffix().unwrap_or_default(),
    };

    let payload = ActivationPayload {
        ver: version.version,
        build: version.build,
        sku: version.sku,
        uuid,
        username: ADMIN_USERNAME.into(),
        password,
        current_mode: mode.code(),
        hostname: host.os_hostname().unwrap_or_default(),
        fqdn,
        client: settings.app_version.clone(),
        cert_hashes,
        profile: settings.profile.clone(),
    };
    debug!(?payload, "activation payload");
    Ok(RpsMessage::activation(&payload, &settings.app_version)?)
}

fn best_effort<T>(what: &str, result: Result<T, CoreError>) -> Option<T> {
    result
        .inspect_err(|e| warn!(field = what, error = %e, "device query failed, sending empty value"))
        .ok()
}

// ── Provisioner seam ─────────────────────────────────────────────────

/// Runs a provisioning session that starts with `initial`.
#[allow(async_fn_in_trait)]
pub trait RemoteProvisioner {
    async fn provision(&self, settings: &RemoteSettings, initial: &RpsMessage) -> Result<RpsOutcome, CoreError>;
}

/// Talks to a real RPS over WebSocket and relays its traffic to LMS.
pub struct RpsProvisioner {
    lms: LmsConfig,
    cancel: CancellationToken,
}

impl RpsProvisioner {
    /// `cancel` aborts a running session, e.g. on Ctrl-C.
    pub fn new(lms: LmsConfig, cancel: CancellationToken) -> Self {
        Self { lms, cancel }
    }
}

impl RemoteProvisioner for RpsProvisioner {
    /// A failure to establish the session is reported as a server
    /// certificate failure; anything after that as a remote failure.
    async fn provision(&self, settings: &RemoteSettings, initial: &RpsMessage) -> Result<RpsOutcome, CoreError> {
        let session = RemoteSession::connect(&settings.url, self.lms.clone())
            .await
            .map_err(|e| CoreError::ServerCertificate { message: e.to_string() })?
            .with_exchange_timeout(settings.exchange_timeout);
        info!(url = %settings.url, profile = %settings.profile, "connected to RPS");

        let outcome = session
            .run(initial, &self.cancel)
            .await
            .map_err(|e| CoreError::Remote { message: e.to_string() })?;
        info!(status = %outcome.status, message = %outcome.message, "remote provisioning finished");
        Ok(outcome)
    }
}
