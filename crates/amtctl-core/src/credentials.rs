// ── Credential resolution ──
//
// The run mode and the `--lsa` choice decide where credentials come from
// and which action runs with them. `next_step` is the pure decision
// function; `dispatch::Dispatcher` drives it against real collaborators.

use std::fmt;

use amtctl_api::RpsMessage;
use secrecy::SecretString;

/// Digest username for operator-supplied passwords.
pub const ADMIN_USERNAME: &str = "admin";

/// Username and password for an AMT management session.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// The built-in admin account with an operator-supplied password.
    pub fn admin(password: SecretString) -> Self {
        Self::new(ADMIN_USERNAME, password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// What a run is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Local activation in client control mode.
    LocalCcm,
    /// Local admin control mode request; applies the Wi-Fi profile.
    LocalAcm,
    /// Local 802.1x Wi-Fi configuration.
    Local8021x,
    /// Hand the device to a remote provisioning server.
    RemoteProvision,
}

impl Mode {
    /// Local modes that can authenticate with the system account.
    pub fn accepts_system_account(self) -> bool {
        matches!(self, Self::LocalCcm | Self::LocalAcm)
    }
}

/// Credentials resolved so far in a run.
#[derive(Debug, Default)]
pub enum CredentialState {
    #[default]
    Unresolved,
    LocalPassword(Credentials),
    LocalSystemAccount(Credentials),
    RemoteDelegated(Box<RpsMessage>),
}

impl CredentialState {
    /// Session credentials for local modes.
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::LocalPassword(c) | Self::LocalSystemAccount(c) => Some(c),
            Self::Unresolved | Self::RemoteDelegated(_) => None,
        }
    }
}

/// The action a run finally performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ActivateCcm,
    Configure8021xWifi,
    ExecuteRemote,
}

impl Action {
    fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::LocalCcm => Self::ActivateCcm,
            Mode::LocalAcm | Mode::Local8021x => Self::Configure8021xWifi,
            Mode::RemoteProvision => Self::ExecuteRemote,
        }
    }
}

/// What the dispatcher must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchSystemAccount,
    UseOperatorPassword,
    PrepareRemoteMessage,
    Run(Action),
}

/// Decide the next step for `mode` given the credentials resolved so far.
///
/// The system account is only consulted for the CCM and ACM modes and only
/// when `use_system_account` is set; every other local run authenticates as
/// `admin` with the operator password.
pub fn next_step(mode: Mode, use_system_account: bool, state: &CredentialState) -> Step {
    match (mode, state) {
        (Mode::RemoteProvision, CredentialState::RemoteDelegated(_)) => Step::Run(Action::ExecuteRemote),
        (Mode::RemoteProvision, _) => Step::PrepareRemoteMessage,
        (_, CredentialState::LocalPassword(_) | CredentialState::LocalSystemAccount(_)) => {
            Step::Run(Action::for_mode(mode))
        }
        _ if use_system_account && mode.accepts_system_account() => Step::FetchSystemAccount,
        _ => Step::UseOperatorPassword,
    }
}
