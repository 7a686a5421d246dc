//! Command handlers, one module per top-level command.

pub mod activate;
pub mod configure;
pub mod info;

use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use amtctl_core::{
    Dispatcher, RpsProvisioner, RunOutcome, RunRequest, SystemHost, WsmanConfigurators, WsmanDevice,
};

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;
use crate::prompt::TerminalPasswordReader;

/// Route a device command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts, config: Config) -> Result<(), CliError> {
    match cmd {
        Command::Info(args) => info::handle(&args, global, &config).await,
        Command::Activate(args) => activate::handle(&args, global, &config).await,
        Command::Configure(args) => configure::handle(args, global, config).await,
        Command::Version | Command::Completions(_) => Err(CliError::Internal(
            "command does not talk to the device".into(),
        )),
    }
}

// ── Shared run plumbing ──────────────────────────────────────────────

/// Run one activation or configuration request against the live device.
pub(crate) async fn run_request(request: RunRequest, global: &GlobalOpts, config: &Config) -> Result<(), CliError> {
    let spinner = spinner(global, "Talking to AMT...");
    let reader = spinner
        .clone()
        .map_or_else(TerminalPasswordReader::default, TerminalPasswordReader::with_spinner);

    let wsman = config.wsman_settings();
    let device = WsmanDevice::new(wsman.clone(), config::operator_password(global));
    let accounts = config.system_accounts();
    let host = SystemHost::default();
    let configurators = WsmanConfigurators::new(wsman);
    let provisioner = RpsProvisioner::new(config.lms_config(), cancel_on_ctrl_c());

    let result = Dispatcher {
        device: &device,
        accounts: &accounts,
        host: &host,
        reader: &reader,
        configurators: &configurators,
        provisioner: &provisioner,
    }
    .run(request)
    .await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    print_outcome(&result?, global.json)
}

fn print_outcome(outcome: &RunOutcome, as_json: bool) -> Result<(), CliError> {
    let (value, text) = match outcome {
        RunOutcome::Activated => (
            json!({ "result": "activated", "controlMode": "client control mode" }),
            "Activated in client control mode".to_string(),
        ),
        RunOutcome::WifiConfigured { profile } => (
            json!({ "result": "wifi-configured", "profile": profile }),
            format!("Wi-Fi profile '{profile}' added"),
        ),
        RunOutcome::Provisioned(rps) => (
            json!({ "result": "provisioned", "status": rps.status, "message": rps.message }),
            format!("Remote provisioning finished: {} {}", rps.status, rps.message),
        ),
    };
    let rendered = if as_json { output::render_json(&value)? } else { text };
    output::print_output(&rendered);
    Ok(())
}

/// A steady spinner on interactive stderr, unless JSON output was requested.
fn spinner(global: &GlobalOpts, message: &'static str) -> Option<ProgressBar> {
    if global.json || !io::stderr().is_terminal() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

/// A token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping");
            child.cancel();
        }
    });
    token
}
