//! CLI configuration: thin wrapper around `amtctl_config`.
//!
//! Loads the shared config and applies `GlobalOpts` and per-command flag
//! overrides on top of it.

use secrecy::SecretString;

use crate::cli::{GlobalOpts, WifiArgs};
use crate::error::CliError;

pub use amtctl_config::{Config, WifiSection, load_config};

/// Load the config and apply the global LMS overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut config = load_config()?;
    apply_global(&mut config, global);
    Ok(config)
}

fn apply_global(config: &mut Config, global: &GlobalOpts) {
    if let Some(host) = &global.lms_host {
        config.lms.host.clone_from(host);
    }
    if let Some(port) = global.lms_port {
        config.lms.port = port;
    }
    if let Some(ms) = global.lms_timeout_ms {
        config.lms.read_timeout_ms = ms;
    }
}

/// The operator password from `--password` / `AMT_PASSWORD`.
pub fn operator_password(global: &GlobalOpts) -> Option<SecretString> {
    global
        .password
        .as_ref()
        .filter(|p| !p.is_empty())
        .map(|p| SecretString::from(p.clone()))
}

/// Merge `configure wifi-8021x` flags into the `[wifi]` section.
///
/// Without a `[wifi]` section both `--ssid` and `--username` are required.
pub fn apply_wifi_args(config: &mut Config, args: &WifiArgs) -> Result<(), CliError> {
    let wifi = match config.wifi.take() {
        Some(existing) => existing,
        None => {
            let (Some(ssid), Some(username)) = (&args.ssid, &args.username) else {
                return Err(CliError::Validation {
                    field: "wifi".into(),
                    reason: "no [wifi] section configured; pass --ssid and --username".into(),
                });
            };
            WifiSection::new(ssid.clone(), username.clone())
        }
    };

    config.wifi = Some(WifiSection {
        profile_name: args.profile_name.clone().unwrap_or(wifi.profile_name),
        ssid: args.ssid.clone().unwrap_or(wifi.ssid),
        priority: args.priority.unwrap_or(wifi.priority),
        username: args.username.clone().unwrap_or(wifi.username),
        auth_protocol: args.auth_protocol.clone().unwrap_or(wifi.auth_protocol),
        password_env: args.password_env.clone().unwrap_or(wifi.password_env),
    });
    Ok(())
}
