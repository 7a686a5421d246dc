mod cli;
mod commands;
mod config;
mod error;
mod output;
mod prompt;

use std::str::FromStr;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing(global: &GlobalOpts) {
    let (level, rejected) = match log_level(global.verbose, &global.log_level) {
        Ok(level) => (level, None),
        Err(requested) => (LevelFilter::INFO, Some(requested)),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if global.json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }

    if let Some(level) = rejected {
        tracing::warn!(%level, "unknown log level, using info");
    }
}

/// `-v` forces trace; otherwise `--log-level` must name a level.
fn log_level(verbose: u8, requested: &str) -> Result<LevelFilter, String> {
    if verbose > 0 {
        return Ok(LevelFilter::TRACE);
    }
    LevelFilter::from_str(requested.trim()).map_err(|_| requested.to_owned())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "amtctl", &mut std::io::stdout());
            Ok(())
        }

        Command::Version => {
            let version = env!("CARGO_PKG_VERSION");
            let rendered = if cli.global.json {
                output::render_json(&json!({
                    "version": version,
                    "protocolVersion": amtctl_core::PROTOCOL_VERSION,
                }))?
            } else {
                format!("amtctl {version}\nRPS protocol {}", amtctl_core::PROTOCOL_VERSION)
            };
            output::print_output(&rendered);
            Ok(())
        }

        // Everything else talks to the device through LMS
        cmd => {
            let config = config::resolve(&cli.global)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &cli.global, config).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_parse() {
        assert_eq!(log_level(0, "warn").unwrap(), LevelFilter::WARN);
        assert_eq!(log_level(0, "DEBUG").unwrap(), LevelFilter::DEBUG);
        assert_eq!(log_level(0, "off").unwrap(), LevelFilter::OFF);
    }

    #[test]
    fn unknown_level_is_rejected() {
        assert_eq!(log_level(0, "bogus").unwrap_err(), "bogus");
        assert!(log_level(0, "info,amtctl=debug").is_err());
    }

    #[test]
    fn verbose_wins_over_log_level() {
        assert_eq!(log_level(1, "bogus").unwrap(), LevelFilter::TRACE);
    }
}
