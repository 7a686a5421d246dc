//! `activate` command handler.

use amtctl_core::{Mode, RunRequest};

use crate::cli::{ActivateArgs, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

pub async fn handle(args: &ActivateArgs, global: &GlobalOpts, config: &Config) -> Result<(), CliError> {
    let request = build_request(args, global, config)?;
    tracing::debug!(mode = ?request.mode, use_lsa = request.use_lsa, "activation requested");
    super::run_request(request, global, config).await
}

fn build_request(args: &ActivateArgs, global: &GlobalOpts, config: &Config) -> Result<RunRequest, CliError> {
    let password = config::operator_password(global);

    if args.local {
        let mode = match (args.ccm, args.acm) {
            (true, _) => Mode::LocalCcm,
            (_, true) => Mode::LocalAcm,
            _ => {
                return Err(CliError::Validation {
                    field: "activate".into(),
                    reason: "--local needs --ccm or --acm".into(),
                });
            }
        };
        let wifi = if mode == Mode::LocalAcm { config.wifi_profile()? } else { None };
        return Ok(RunRequest {
            use_lsa: args.lsa,
            password,
            wifi,
            ..RunRequest::new(mode)
        });
    }

    let remote = config
        .remote_settings(args.url.as_deref(), args.profile.as_deref())?
        .ok_or_else(|| CliError::Validation {
            field: "activate".into(),
            reason: "pass --local, or --url (or set [rps] url in the config)".into(),
        })?;
    Ok(RunRequest {
        password,
        remote: Some(remote),
        ..RunRequest::new(Mode::RemoteProvision)
    })
}
