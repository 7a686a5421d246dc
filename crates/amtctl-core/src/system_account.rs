// ── Local system account over the host interface ──
//
// The firmware hands the local system account only to software on the
// host, through the MEI character device. Reads block, so they run on the
// blocking pool under an outer deadline.

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use amtctl_api::PthiClient;
use amtctl_api::heci::{self, DEFAULT_MEI_DEVICE};
use tracing::debug;

use crate::credentials::Credentials;
use crate::device::SystemAccountSource;
use crate::error::CoreError;

pub const DEFAULT_HOST_INTERFACE_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that can hand out a connected PTHI client.
pub trait HostInterface: Send + Sync + 'static {
    type Transport: Read + Write + Send + 'static;

    fn open(&self) -> Result<PthiClient<Self::Transport>, amtctl_api::Error>;
}

/// The MEI character device, `/dev/mei0` unless configured otherwise.
#[derive(Debug, Clone)]
pub struct MeiDevice {
    pub path: PathBuf,
}

impl Default for MeiDevice {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MEI_DEVICE),
        }
    }
}

impl HostInterface for MeiDevice {
    type Transport = File;

    fn open(&self) -> Result<PthiClient<File>, amtctl_api::Error> {
        heci::open_pthi(&self.path)
    }
}

/// Reads the local system account through a [`HostInterface`].
pub struct HostInterfaceAccounts<H> {
    interface: Arc<H>,
    timeout: Duration,
}

impl<H: HostInterface> HostInterfaceAccounts<H> {
    pub fn new(interface: H) -> Self {
        Self {
            interface: Arc::new(interface),
            timeout: DEFAULT_HOST_INTERFACE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<H: HostInterface> SystemAccountSource for HostInterfaceAccounts<H> {
    async fn local_system_account(&self) -> Result<Credentials, CoreError> {
        let interface = Arc::clone(&self.interface);
        let task = tokio::task::spawn_blocking(move || interface.open()?.local_system_account());

        let account = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join)) => return Err(CoreError::Internal(format!("host interface task failed: {join}"))),
            Err(_) => {
                return Err(CoreError::Timeout {
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };
        debug!(username = %account.username, "using local system account");
        Ok(Credentials::new(account.username, account.password))
    }
}
