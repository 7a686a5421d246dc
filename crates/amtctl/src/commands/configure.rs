//! `configure` command handlers.

use amtctl_core::{Mode, RunRequest};

use crate::cli::{ConfigureArgs, ConfigureCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

pub async fn handle(args: ConfigureArgs, global: &GlobalOpts, mut config: Config) -> Result<(), CliError> {
    match args.command {
        ConfigureCommand::Wifi8021x(wifi) => {
            config::apply_wifi_args(&mut config, &wifi)?;
            let request = RunRequest {
                password: config::operator_password(global),
                wifi: config.wifi_profile()?,
                ..RunRequest::new(Mode::Local8021x)
            };
            super::run_request(request, global, &config).await
        }
    }
}
