// ── Host facts ──
//
// DNS suffix and host name as the operating system sees them.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::device::HostFacts;

const RESOLV_CONF: &str = "/etc/resolv.conf";
const KERNEL_HOSTNAME: &str = "/proc/sys/kernel/hostname";
const ETC_HOSTNAME: &str = "/etc/hostname";

/// Reads host facts from the usual system files.
#[derive(Debug, Clone)]
pub struct SystemHost {
    resolv_conf: PathBuf,
    hostname_files: Vec<PathBuf>,
}

impl Default for SystemHost {
    fn default() -> Self {
        Self {
            resolv_conf: RESOLV_CONF.into(),
            hostname_files: vec![KERNEL_HOSTNAME.into(), ETC_HOSTNAME.into()],
        }
    }
}

impl SystemHost {
    /// Read from alternative locations, e.g. a container's bind mounts.
    pub fn with_paths(resolv_conf: impl Into<PathBuf>, hostname_files: Vec<PathBuf>) -> Self {
        Self {
            resolv_conf: resolv_conf.into(),
            hostname_files,
        }
    }
}

impl HostFacts for SystemHost {
    fn os_dns_suffix(&self) -> Option<String> {
        read(&self.resolv_conf).and_then(|content| dns_suffix(&content))
    }

    fn os_hostname(&self) -> Option<String> {
        self.hostname_files
            .iter()
            .filter_map(|path| read(path))
            .find_map(|content| first_line(&content))
    }
}

fn read(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .inspect_err(|e| debug!(path = %path.display(), error = %e, "host file unreadable"))
        .ok()
}

/// The `domain` entry if present, otherwise the first `search` domain.
fn dns_suffix(resolv_conf: &str) -> Option<String> {
    let mut search = None;
    for line in resolv_conf.lines() {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("domain"), Some(domain)) => return Some(trim_root(domain)),
            (Some("search"), Some(first)) if search.is_none() => search = Some(trim_root(first)),
            _ => {}
        }
    }
    search
}

fn trim_root(domain: &str) -> String {
    domain.trim_end_matches('.').to_string()
}

fn first_line(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}
