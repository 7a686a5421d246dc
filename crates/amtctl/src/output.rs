//! Output formatting: aligned text or JSON.
//!
//! Text output is one `Label : value` line per field, with adapter blocks
//! and certificate tables. JSON output serializes the report via serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::{Table, Tabled, settings::Style};

use amtctl_core::{CertHash, InfoField, InfoReport, InfoValue, LanSettings, PublicKeyCertificate, RemoteAccessStatus};

use crate::error::CliError;

const LABEL_WIDTH: usize = 24;

// ── Color helpers ────────────────────────────────────────────────────

/// Color only interactive stdout, honoring `NO_COLOR`.
pub fn should_color() -> bool {
    io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct CertHashRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Algorithm")]
    algorithm: String,
    #[tabled(rename = "Default")]
    is_default: bool,
    #[tabled(rename = "Active")]
    is_active: bool,
    #[tabled(rename = "Hash")]
    hash: String,
}

impl From<&CertHash> for CertHashRow {
    fn from(h: &CertHash) -> Self {
        Self {
            name: h.name.clone(),
            algorithm: h.algorithm.clone(),
            is_default: h.is_default,
            is_active: h.is_active,
            hash: h.hash.clone(),
        }
    }
}

#[derive(Tabled)]
struct UserCertRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Issuer")]
    issuer: String,
    #[tabled(rename = "Trusted Root")]
    trusted_root: bool,
    #[tabled(rename = "SHA-256")]
    fingerprint: String,
}

impl From<&PublicKeyCertificate> for UserCertRow {
    fn from(c: &PublicKeyCertificate) -> Self {
        Self {
            name: c.element_name.clone(),
            subject: c.subject.clone(),
            issuer: c.issuer.clone(),
            trusted_root: c.trusted_root,
            fingerprint: c.fingerprint.clone(),
        }
    }
}

// ── Renderers ────────────────────────────────────────────────────────

/// Pretty-printed JSON.
pub fn render_json<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Aligned text for an info report, fields in their canonical order.
pub fn render_info_text(report: &InfoReport, color: bool) -> String {
    let mut out = Vec::new();
    for field in InfoField::iter() {
        if let Some(error) = report.error(field) {
            let message = format!("error: {error}");
            let message = if color { message.red().to_string() } else { message };
            out.push(line(&field.to_string(), &message, color));
            continue;
        }
        let Some(value) = report.value(field) else {
            continue;
        };
        match value {
            InfoValue::Text(text) => out.push(line(&field.to_string(), text, color)),
            InfoValue::RemoteAccess(ras) => render_ras(&mut out, ras, color),
            InfoValue::Lan(lan) => render_lan(&mut out, field, lan, color),
            InfoValue::CertificateHashes(hashes) => {
                out.push(line(&field.to_string(), &hashes.len().to_string(), color));
                if !hashes.is_empty() {
                    out.push(render_table(&hashes.iter().map(CertHashRow::from).collect::<Vec<_>>()));
                }
            }
            InfoValue::UserCertificates(certs) => {
                out.push(line(&field.to_string(), &certs.len().to_string(), color));
                if !certs.is_empty() {
                    out.push(render_table(&certs.iter().map(UserCertRow::from).collect::<Vec<_>>()));
                }
            }
        }
    }
    out.join("\n")
}

fn render_ras(out: &mut Vec<String>, ras: &RemoteAccessStatus, color: bool) {
    out.push(line("RAS Network", &ras.network_status, color));
    out.push(line("RAS Remote Status", &ras.remote_status, color));
    out.push(line("RAS Trigger", &ras.remote_trigger, color));
    out.push(line("RAS MPS Hostname", &ras.mps_hostname, color));
}

fn render_lan(out: &mut Vec<String>, field: InfoField, lan: &LanSettings, color: bool) {
    let header = format!("---{field}---");
    out.push(if color { header.bold().to_string() } else { header });
    out.push(line("DHCP Enabled", &lan.dhcp_enabled.to_string(), color));
    out.push(line("DHCP Mode", &lan.dhcp_mode, color));
    out.push(line("Link Status", &lan.link_status, color));
    out.push(line("IP Address", &lan.ip_address, color));
    out.push(line("MAC Address", &lan.mac_address, color));
}

fn line(label: &str, value: &str, color: bool) -> String {
    let label = format!("{label:<LABEL_WIDTH$}");
    if color {
        format!("{} : {value}", label.cyan())
    } else {
        format!("{label} : {value}")
    }
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
