//! `info` command handler.

use amtctl_core::{InfoCollector, SystemHost, WsmanDevice};

use crate::cli::{GlobalOpts, InfoArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;
use crate::prompt::TerminalPasswordReader;

pub async fn handle(args: &InfoArgs, global: &GlobalOpts, config: &Config) -> Result<(), CliError> {
    let mut flags = args.flags();
    let password = config::operator_password(global);

    let device = WsmanDevice::new(config.wsman_settings(), password.clone());
    let host = SystemHost::default();
    let reader = TerminalPasswordReader::default();

    let report = InfoCollector::new(&device, &host, &reader)
        .collect(&mut flags, password.as_ref())
        .await?;

    let rendered = if global.json {
        output::render_json(&report)?
    } else {
        output::render_info_text(&report, output::should_color())
    };
    output::print_output(&rendered);
    Ok(())
}
