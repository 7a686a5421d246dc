//! Clap derive structures for the `amtctl` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use amtctl_core::InfoFlags;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// amtctl -- host agent for Intel AMT
#[derive(Debug, Parser)]
#[command(
    name = "amtctl",
    version,
    about = "Inspect, activate and provision Intel AMT devices",
    long_about = "Talks to the Intel AMT firmware through the Local Manageability Service (LMS).\n\n\
        Reports device information, activates locally in client control mode,\n\
        pushes 802.1x Wi-Fi profiles, or hands the device to a remote provisioning server.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Emit JSON output and JSON logs
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log everything (trace level)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// AMT admin password
    #[arg(long, env = "AMT_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// LMS host (overrides config)
    #[arg(long, global = true)]
    pub lms_host: Option<String>,

    /// LMS port (overrides config)
    #[arg(long, global = true)]
    pub lms_port: Option<u16>,

    /// LMS per-read timeout in milliseconds (overrides config)
    #[arg(long, global = true)]
    pub lms_timeout_ms: Option<u64>,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show device information
    Info(InfoArgs),

    /// Activate locally or through a remote provisioning server
    Activate(ActivateArgs),

    /// Apply local configuration
    Configure(ConfigureArgs),

    /// Show the agent version
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── info ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct InfoArgs {
    /// AMT version
    #[arg(long)]
    pub ver: bool,
    /// Firmware build number
    #[arg(long)]
    pub bld: bool,
    /// SKU and decoded features
    #[arg(long)]
    pub sku: bool,
    /// Platform UUID
    #[arg(long)]
    pub uuid: bool,
    /// Control mode
    #[arg(long)]
    pub mode: bool,
    /// DNS suffix (firmware and OS)
    #[arg(long)]
    pub dns: bool,
    /// OS host name
    #[arg(long)]
    pub hostname: bool,
    /// Remote access status
    #[arg(long)]
    pub ras: bool,
    /// Wired and wireless adapter settings
    #[arg(long)]
    pub lan: bool,
    /// Trusted root certificate hashes
    #[arg(long)]
    pub cert: bool,
    /// Certificates in the public key store (needs the admin password)
    #[arg(long)]
    pub user_cert: bool,
    /// Everything, user certificates included
    #[arg(long)]
    pub all: bool,
}

impl InfoArgs {
    /// Selected fields; no selection means everything but user certificates.
    pub fn flags(&self) -> InfoFlags {
        if self.all {
            return InfoFlags::all();
        }
        let flags = InfoFlags {
            ver: self.ver,
            bld: self.bld,
            sku: self.sku,
            uuid: self.uuid,
            mode: self.mode,
            dns: self.dns,
            hostname: self.hostname,
            ras: self.ras,
            lan: self.lan,
            cert: self.cert,
            user_cert: self.user_cert,
        };
        if flags.is_empty() { InfoFlags::standard() } else { flags }
    }
}

// ── activate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ActivateArgs {
    /// Activate through LMS on this machine
    #[arg(long, conflicts_with_all = ["url", "profile"])]
    pub local: bool,

    /// Client control mode
    #[arg(long, requires = "local", conflicts_with = "acm")]
    pub ccm: bool,

    /// Admin control mode (applies the configured 802.1x Wi-Fi profile)
    #[arg(long, requires = "local")]
    pub acm: bool,

    /// Authenticate with the local system account read from the MEI host interface
    #[arg(long, requires = "local")]
    pub lsa: bool,

    /// Remote provisioning server WebSocket URL (overrides config)
    #[arg(long, short = 'u')]
    pub url: Option<String>,

    /// Remote provisioning profile (overrides config)
    #[arg(long)]
    pub profile: Option<String>,
}

// ── configure ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigureArgs {
    #[command(subcommand)]
    pub command: ConfigureCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigureCommand {
    /// Add an 802.1x Wi-Fi profile
    #[command(name = "wifi-8021x")]
    Wifi8021x(WifiArgs),
}

/// Overrides for the `[wifi]` config section.
#[derive(Debug, Args)]
pub struct WifiArgs {
    /// Profile name stored in the firmware
    #[arg(long)]
    pub profile_name: Option<String>,

    /// Network SSID
    #[arg(long)]
    pub ssid: Option<String>,

    /// Profile priority
    #[arg(long)]
    pub priority: Option<u32>,

    /// EAP identity
    #[arg(long)]
    pub username: Option<String>,

    /// EAP method (peap-mschapv2, ttls-mschapv2, gtc, fast-mschapv2, fast-gtc)
    #[arg(long)]
    pub auth_protocol: Option<String>,

    /// Environment variable holding the EAP password
    #[arg(long)]
    pub password_env: Option<String>,
}

// ── completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
