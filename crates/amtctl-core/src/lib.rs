// amtctl-core: Capability decoding, info collection and mode dispatch on top of amtctl-api.

pub mod config;
pub mod credentials;
pub mod decode;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod info;
pub mod remote;
pub mod system_account;
pub mod wsman_device;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{RemoteSettings, WifiProfile};
pub use credentials::{Action, CredentialState, Credentials, Mode, Step, next_step};
pub use decode::{DecodeError, decode, describe};
pub use device::{
    AmtDevice, ConfiguratorFactory, HostFacts, LocalConfigurator, PasswordReader, SystemAccountSource,
};
pub use dispatch::{Dispatcher, RunOutcome, RunRequest};
pub use error::CoreError;
pub use host::SystemHost;
pub use info::{InfoCollector, InfoField, InfoFlags, InfoReport, InfoValue};
pub use remote::{RemoteProvisioner, RpsProvisioner, prepare_initial_message};
pub use system_account::{HostInterface, HostInterfaceAccounts, MeiDevice};
pub use wsman_device::{WsmanConfigurator, WsmanConfigurators, WsmanDevice, WsmanSettings};

// Model types callers render or build.
pub use amtctl_api::models::{
    CertHash, ControlMode, EapProtocol, LanSettings, PublicKeyCertificate, RemoteAccessStatus,
    VersionData, WifiSettings,
};
pub use amtctl_api::rps::PROTOCOL_VERSION;
pub use amtctl_api::{LmsConfig, RpsOutcome};
