// Typed views of the firmware data the agent reads.
//
// Field names serialize in camelCase to match what downstream JSON
// consumers of the info report and the RPS activation payload expect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Firmware version triple as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionData {
    /// Dotted AMT version, e.g. `16.1.25`.
    pub version: String,
    pub build: String,
    /// Decimal SKU bitmask.
    pub sku: String,
}

/// Activation state of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    PreProvisioning,
    ClientControl,
    AdminControl,
    Unknown(u32),
}

impl ControlMode {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::PreProvisioning,
            1 => Self::ClientControl,
            2 => Self::AdminControl,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::PreProvisioning => 0,
            Self::ClientControl => 1,
            Self::AdminControl => 2,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_provisioned(self) -> bool {
        matches!(self, Self::ClientControl | Self::AdminControl)
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreProvisioning => "pre-provisioning state",
            Self::ClientControl => "activated in client control mode",
            Self::AdminControl => "activated in admin control mode",
            Self::Unknown(_) => "unknown state",
        })
    }
}

/// Remote access (CIRA) state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccessStatus {
    pub network_status: String,
    pub remote_status: String,
    pub remote_trigger: String,
    pub mps_hostname: String,
}

/// Settings of one AMT network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanSettings {
    pub is_enabled: bool,
    pub link_status: String,
    pub dhcp_enabled: bool,
    pub dhcp_mode: String,
    pub ip_address: String,
    pub mac_address: String,
}

/// A trusted root hash used for remote-configuration certificate matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertHash {
    pub name: String,
    pub algorithm: String,
    /// Lowercase hex.
    pub hash: String,
    pub is_default: bool,
    pub is_active: bool,
}

/// A certificate stored in the firmware's public key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCertificate {
    pub element_name: String,
    pub instance_id: String,
    pub subject: String,
    pub issuer: String,
    pub trusted_root: bool,
    pub read_only: bool,
    /// Lowercase hex SHA-256 of the DER encoding.
    pub fingerprint: String,
}

/// An 802.1x Wi-Fi profile pushed to the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiSettings {
    pub profile_name: String,
    pub ssid: String,
    pub priority: u32,
    pub auth_protocol: EapProtocol,
    pub username: String,
}

/// EAP methods the firmware accepts (`CIM_IEEE8021xSettings.AuthenticationProtocol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapProtocol {
    Tls,
    TtlsMschapV2,
    PeapMschapV2,
    Gtc,
    FastMschapV2,
    FastGtc,
    FastTls,
}

impl EapProtocol {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Tls,
            1 => Self::TtlsMschapV2,
            2 => Self::PeapMschapV2,
            3 => Self::Gtc,
            4 => Self::FastMschapV2,
            5 => Self::FastGtc,
            10 => Self::FastTls,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Tls => 0,
            Self::TtlsMschapV2 => 1,
            Self::PeapMschapV2 => 2,
            Self::Gtc => 3,
            Self::FastMschapV2 => 4,
            Self::FastGtc => 5,
            Self::FastTls => 10,
        }
    }

    /// Certificate-based methods need client credentials this agent does not manage.
    pub fn needs_client_certificate(self) -> bool {
        matches!(self, Self::Tls | Self::FastTls)
    }
}

/// `AMT_GeneralSettings` fields the agent uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneralSettings {
    pub host_name: String,
    pub domain_name: String,
    /// Digest realm; also salts the admin password hash during host-based setup.
    pub digest_realm: String,
}
