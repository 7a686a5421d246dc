// Read-only WS-Management queries
//
// Each method fetches one class and maps the fields the agent reports.
// Field lookups are by local element name; absent fields map to empty
// strings or `false` rather than errors, since firmware versions differ
// in which properties they populate.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::client::WsmanClient;
use super::envelope::Resource;
use super::xml;
use crate::error::Error;
use crate::models::{
    CertHash, ControlMode, GeneralSettings, LanSettings, PublicKeyCertificate, RemoteAccessStatus,
    VersionData,
};

const GENERAL_SETTINGS: Resource = Resource::amt("AMT_GeneralSettings");
pub(super) const HOST_BASED_SETUP: Resource = Resource::ips("IPS_HostBasedSetupService");
const SOFTWARE_IDENTITY: Resource = Resource::cim("CIM_SoftwareIdentity");
const COMPUTER_SYSTEM_PACKAGE: Resource = Resource::cim("CIM_ComputerSystemPackage");
const ETHERNET_PORT_SETTINGS: Resource = Resource::amt("AMT_EthernetPortSettings");
const REMOTE_SAP: Resource = Resource::amt("AMT_ManagementPresenceRemoteSAP");
const POLICY_RULE: Resource = Resource::amt("AMT_RemoteAccessPolicyRule");
const CERTIFICATE_HASH: Resource = Resource::amt("AMT_ProvisioningCertificateHash");
const PUBLIC_KEY_CERTIFICATE: Resource = Resource::amt("AMT_PublicKeyCertificate");

const WIRED_PORT: &str = "Intel(r) AMT Ethernet Port Settings 0";
const WIRELESS_PORT: &str = "Intel(r) AMT Ethernet Port Settings 1";

impl WsmanClient {
    /// AMT version, build number and SKU.
    ///
    /// `CIM_SoftwareIdentity` instances keyed by `InstanceID` `AMT`,
    /// `Build Number` and `Sku`, each carrying a `VersionString`.
    pub async fn version_data(&self) -> Result<VersionData, Error> {
        let items = self.enumerate(SOFTWARE_IDENTITY).await?;
        let mut data = VersionData::default();
        for item in &items {
            let version = field(item, "VersionString");
            match field(item, "InstanceID").as_str() {
                "AMT" => data.version = version,
                "Build Number" => data.build = version,
                "Sku" => data.sku = version,
                _ => {}
            }
        }
        if data.version.is_empty() {
            return Err(Error::Wsman {
                message: "firmware did not report an AMT version".into(),
            });
        }
        debug!(version = %data.version, build = %data.build, sku = %data.sku, "version data");
        Ok(data)
    }

    /// Platform UUID in canonical hyphenated form.
    pub async fn uuid(&self) -> Result<String, Error> {
        let item = self.get(COMPUTER_SYSTEM_PACKAGE, &[]).await?;
        platform_guid_to_uuid(&field(&item, "PlatformGUID"))
    }

    pub async fn control_mode(&self) -> Result<ControlMode, Error> {
        let item = self.get(HOST_BASED_SETUP, &[]).await?;
        let raw = field(&item, "CurrentControlMode");
        let code = raw.parse::<u32>().map_err(|_| Error::Wsman {
            message: format!("unexpected CurrentControlMode {raw:?}"),
        })?;
        Ok(ControlMode::from_code(code))
    }

    pub async fn general_settings(&self) -> Result<GeneralSettings, Error> {
        let item = self.get(GENERAL_SETTINGS, &[]).await?;
        Ok(GeneralSettings {
            host_name: field(&item, "HostName"),
            domain_name: field(&item, "DomainName"),
            digest_realm: field(&item, "DigestRealm"),
        })
    }

    /// Settings of the wired (`false`) or wireless (`true`) adapter.
    pub async fn lan_settings(&self, wireless: bool) -> Result<LanSettings, Error> {
        let port = if wireless { WIRELESS_PORT } else { WIRED_PORT };
        let item = self.get(ETHERNET_PORT_SETTINGS, &[("InstanceID", port)]).await?;
        Ok(parse_lan_settings(&item))
    }

    /// CIRA configuration: the first MPS and the first policy trigger.
    pub async fn remote_access_status(&self) -> Result<RemoteAccessStatus, Error> {
        let servers = self.enumerate(REMOTE_SAP).await?;
        let rules = self.enumerate(POLICY_RULE).await?;

        let mps_hostname = servers
            .first()
            .map(|sap| field(sap, "AccessInfo"))
            .unwrap_or_default();
        let remote_trigger = rules
            .first()
            .map_or("none", |rule| trigger_name(&field(rule, "Trigger")))
            .to_string();

        Ok(RemoteAccessStatus {
            // Live connection state is only visible through the host interface.
            network_status: "unknown".into(),
            remote_status: if mps_hostname.is_empty() {
                "not configured".into()
            } else {
                "configured".into()
            },
            remote_trigger,
            mps_hostname,
        })
    }

    /// Trusted root hashes for remote configuration.
    pub async fn certificate_hashes(&self) -> Result<Vec<CertHash>, Error> {
        let items = self.enumerate(CERTIFICATE_HASH).await?;
        items.iter().map(String::as_str).map(parse_cert_hash).collect()
    }

    /// Certificates in the firmware's public key store.
    pub async fn public_key_certificates(&self) -> Result<Vec<PublicKeyCertificate>, Error> {
        let items = self.enumerate(PUBLIC_KEY_CERTIFICATE).await?;
        items
            .iter()
            .map(String::as_str)
            .map(parse_public_key_certificate)
            .collect()
    }
}

// ── Field mapping ────────────────────────────────────────────────────

fn field(item: &str, name: &str) -> String {
    xml::text(item, name).unwrap_or_default()
}

fn flag(item: &str, name: &str) -> bool {
    field(item, name).eq_ignore_ascii_case("true")
}

/// `PlatformGUID` is the raw SMBIOS UUID, first three groups little-endian.
fn platform_guid_to_uuid(guid: &str) -> Result<String, Error> {
    let bytes = hex::decode(guid.trim()).map_err(|e| Error::Deserialization {
        message: format!("invalid PlatformGUID: {e}"),
    })?;
    let bytes: [u8; 16] = bytes.try_into().map_err(|_| Error::Deserialization {
        message: "PlatformGUID is not 16 bytes".into(),
    })?;
    Ok(uuid::Uuid::from_bytes_le(bytes).hyphenated().to_string())
}

fn parse_lan_settings(item: &str) -> LanSettings {
    let dhcp_enabled = flag(item, "DHCPEnabled");
    LanSettings {
        is_enabled: !item.is_empty(),
        link_status: if flag(item, "LinkIsUp") { "up" } else { "down" }.into(),
        dhcp_enabled,
        dhcp_mode: match (dhcp_enabled, flag(item, "IpSyncEnabled")) {
            (true, true) => "passive",
            (true, false) => "active",
            (false, _) => "",
        }
        .into(),
        ip_address: field(item, "IPAddress"),
        mac_address: field(item, "MACAddress").replace('-', ":").to_ascii_lowercase(),
    }
}

fn trigger_name(code: &str) -> &'static str {
    match code {
        "0" => "user initiated",
        "1" => "alert",
        "2" => "periodic",
        "3" => "provisioning",
        _ => "unknown",
    }
}

fn hash_algorithm(code: &str) -> &'static str {
    match code {
        "0" => "MD5",
        "1" => "SHA1",
        "2" => "SHA256",
        "3" => "SHA512",
        _ => "unknown",
    }
}

fn parse_cert_hash(item: &str) -> Result<CertHash, Error> {
    let raw = STANDARD.decode(field(item, "HashData"))?;
    Ok(CertHash {
        name: field(item, "ElementName"),
        algorithm: hash_algorithm(&field(item, "HashType")).into(),
        hash: hex::encode(raw),
        is_default: flag(item, "IsDefault"),
        is_active: flag(item, "Enabled"),
    })
}

fn parse_public_key_certificate(item: &str) -> Result<PublicKeyCertificate, Error> {
    let der = STANDARD.decode(field(item, "X509Certificate"))?;
    Ok(PublicKeyCertificate {
        element_name: field(item, "ElementName"),
        instance_id: field(item, "InstanceID"),
        subject: field(item, "Subject"),
        issuer: field(item, "Issuer"),
        // The firmware schema spells this property without the second "i".
        trusted_root: flag(item, "TrustedRootCertficate"),
        read_only: flag(item, "ReadOnlyCertificate"),
        fingerprint: hex::encode(Sha256::digest(&der)),
    })
}
