// ── Mode dispatcher ──
//
// Drives `credentials::next_step` until it yields an action, then runs
// exactly one of: CCM activation, 802.1x Wi-Fi configuration or remote
// provisioning.

use amtctl_api::RpsOutcome;
use secrecy::SecretString;
use tracing::{debug, error, info};

use crate::config::{RemoteSettings, WifiProfile};
use crate::credentials::{Action, CredentialState, Credentials, Mode, Step, next_step};
use crate::device::{
    AmtDevice, ConfiguratorFactory, HostFacts, LocalConfigurator, PasswordReader, SystemAccountSource,
};
use crate::error::CoreError;
use crate::remote::{RemoteProvisioner, prepare_initial_message};

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: Mode,
    /// Authenticate with the local system account (CCM and ACM only).
    pub use_lsa: bool,
    pub password: Option<SecretString>,
    pub wifi: Option<WifiProfile>,
    pub remote: Option<RemoteSettings>,
}

impl RunRequest {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            use_lsa: false,
            password: None,
            wifi: None,
            remote: None,
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Activated,
    WifiConfigured { profile: String },
    Provisioned(RpsOutcome),
}

/// The collaborators a run talks to.
pub struct Dispatcher<'a, D, A, H, P, F, R> {
    pub device: &'a D,
    pub accounts: &'a A,
    pub host: &'a H,
    pub reader: &'a P,
    pub configurators: &'a F,
    pub provisioner: &'a R,
}

impl<D, A, H, P, F, R> Dispatcher<'_, D, A, H, P, F, R>
where
    D: AmtDevice,
    A: SystemAccountSource,
    H: HostFacts,
    P: PasswordReader,
    F: ConfiguratorFactory,
    R: RemoteProvisioner,
{
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome, CoreError> {
        let mut operator_password = request.password.clone();
        let mut state = CredentialState::Unresolved;

        loop {
            let step = next_step(request.mode, request.use_lsa, &state);
            debug!(mode = ?request.mode, ?step, "dispatch step");
            state = match step {
                Step::FetchSystemAccount => {
                    let account = self.accounts.local_system_account().await.map_err(|e| {
                        error!(error = %e, "failed to fetch the local system account");
                        CoreError::CredentialResolution { reason: e.to_string() }
                    })?;
                    CredentialState::LocalSystemAccount(account)
                }
                Step::UseOperatorPassword => {
                    let password = self.operator_password(&mut operator_password)?;
                    CredentialState::LocalPassword(Credentials::admin(password))
                }
                Step::PrepareRemoteMessage => {
                    let settings = remote_settings(&request)?;
                    let message = prepare_initial_message(
                        self.device,
                        self.host,
                        self.reader,
                        settings,
                        operator_password.as_ref(),
                    )
                    .await
                    .map_err(|e| match e {
                        CoreError::MissingOrIncorrectPassword { .. } => e,
                        other => CoreError::MissingOrIncorrectPassword {
                            reason: other.to_string(),
                        },
                    })?;
                    CredentialState::RemoteDelegated(Box::new(message))
                }
                Step::Run(action) => {
                    return self.perform(action, &state, &request, &mut operator_password).await;
                }
            };
        }
    }

    async fn perform(
        &self,
        action: Action,
        state: &CredentialState,
        request: &RunRequest,
        operator_password: &mut Option<SecretString>,
    ) -> Result<RunOutcome, CoreError> {
        match (action, state) {
            (Action::ExecuteRemote, CredentialState::RemoteDelegated(message)) => {
                let settings = remote_settings(request)?;
                let outcome = self.provisioner.provision(settings, message).await?;
                Ok(RunOutcome::Provisioned(outcome))
            }
            (Action::ActivateCcm, _) => {
                let credentials = session_credentials(state)?;
                // With the system account the new admin password still comes from the operator.
                let admin_password = self.operator_password(operator_password)?;
                info!(username = %credentials.username, "activating in client control mode");
                self.configurators
                    .open(credentials)
                    .activate_ccm(&admin_password)
                    .await
                    .map_err(CoreError::into_activation)?;
                Ok(RunOutcome::Activated)
            }
            (Action::Configure8021xWifi, _) => {
                let credentials = session_credentials(state)?;
                let profile = request.wifi.as_ref().ok_or_else(|| CoreError::Config {
                    message: "no 802.1x Wi-Fi profile configured".into(),
                })?;
                info!(
                    username = %credentials.username,
                    profile = %profile.settings.profile_name,
                    "configuring 802.1x wifi"
                );
                self.configurators
                    .open(credentials)
                    .configure_8021x_wifi(profile)
                    .await
                    .map_err(CoreError::into_activation)?;
                Ok(RunOutcome::WifiConfigured {
                    profile: profile.settings.profile_name.clone(),
                })
            }
            (Action::ExecuteRemote, _) => Err(CoreError::Internal(
                "remote execution without a prepared message".into(),
            )),
        }
    }

    /// The operator password, prompting once if it was not supplied.
    fn operator_password(&self, cached: &mut Option<SecretString>) -> Result<SecretString, CoreError> {
        if let Some(password) = cached {
            return Ok(password.clone());
        }
        let password = self
            .reader
            .read_password()
            .map_err(|e| CoreError::MissingOrIncorrectPassword { reason: e.to_string() })?;
        *cached = Some(password.clone());
        Ok(password)
    }
}

fn remote_settings(request: &RunRequest) -> Result<&RemoteSettings, CoreError> {
    request.remote.as_ref().ok_or_else(|| CoreError::Config {
        message: "remote provisioning needs an RPS URL".into(),
    })
}

fn session_credentials(state: &CredentialState) -> Result<&Credentials, CoreError> {
    state
        .credentials()
        .ok_or_else(|| CoreError::Internal("local action without resolved credentials".into()))
}
