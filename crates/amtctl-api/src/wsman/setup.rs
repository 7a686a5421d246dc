// State-changing WS-Management invocations
//
// Host-based setup (client control mode activation) and 802.1x Wi-Fi
// profile provisioning. Both return an error for any non-zero ReturnValue.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::client::WsmanClient;
use super::digest::md5_hex;
use super::envelope::{self, Resource};
use super::queries::HOST_BASED_SETUP;
use super::xml::{self, escape};
use crate::error::Error;
use crate::models::WifiSettings;

const WIFI_PORT_SERVICE: Resource = Resource::amt("AMT_WiFiPortConfigurationService");
const WIFI_ENDPOINT: Resource = Resource::cim("CIM_WiFiEndpoint");
const WIFI_ENDPOINT_SETTINGS: Resource = Resource::cim("CIM_WiFiEndpointSettings");
const IEEE8021X_SETTINGS: Resource = Resource::cim("CIM_IEEE8021xSettings");

/// `NetAdminPassEncryptionType`: HTTP digest MD5(A1).
const DIGEST_MD5_A1: &str = "2";
/// `CIM_WiFiEndpointSettings.AuthenticationMethod`: WPA2 IEEE 802.1x.
const WPA2_8021X: u32 = 7;
/// `CIM_WiFiEndpointSettings.EncryptionMethod`: CCMP.
const CCMP: u32 = 4;

impl WsmanClient {
    /// Activate in client control mode, setting the admin password.
    ///
    /// The password travels as `MD5("admin:" + DigestRealm + ":" + password)`.
    pub async fn host_based_setup(&self, admin_password: &SecretString) -> Result<(), Error> {
        let realm = self.general_settings().await?.digest_realm;
        if realm.is_empty() {
            return Err(Error::Wsman {
                message: "firmware did not report a digest realm".into(),
            });
        }
        let hash = admin_password_hash(&realm, admin_password);
        let input = envelope::simple_input(
            HOST_BASED_SETUP,
            "Setup",
            &[
                ("NetAdminPassEncryptionType", DIGEST_MD5_A1),
                ("NetworkAdminPassword", hash.as_str()),
            ],
        );

        debug!(%realm, "invoking host based setup");
        let output = self.invoke(HOST_BASED_SETUP, "Setup", &input).await?;
        check_return_value("Setup", &output)?;
        info!("activated in client control mode");
        Ok(())
    }

    /// Add an 802.1x-secured Wi-Fi profile to the wireless endpoint.
    pub async fn add_wifi_settings(&self, settings: &WifiSettings, password: &SecretString) -> Result<(), Error> {
        if settings.auth_protocol.needs_client_certificate() {
            return Err(Error::Unsupported("certificate-based 802.1x authentication"));
        }
        let input = wifi_input(settings, password);
        debug!(profile = %settings.profile_name, ssid = %settings.ssid, "adding wifi settings");
        let output = self.invoke(WIFI_PORT_SERVICE, "AddWiFiSettings", &input).await?;
        check_return_value("AddWiFiSettings", &output)?;
        info!(profile = %settings.profile_name, "wifi profile added");
        Ok(())
    }
}

fn admin_password_hash(realm: &str, password: &SecretString) -> String {
    md5_hex(&format!("admin:{realm}:{}", password.expose_secret()))
}

fn check_return_value(method: &'static str, output: &str) -> Result<(), Error> {
    let raw = xml::text(output, "ReturnValue").ok_or_else(|| Error::Wsman {
        message: format!("{method} response carried no ReturnValue"),
    })?;
    match raw.parse::<u32>() {
        Ok(0) => Ok(()),
        Ok(code) => Err(Error::ReturnValue { method, code }),
        Err(_) => Err(Error::Wsman {
            message: format!("{method} returned {raw:?}"),
        }),
    }
}

fn wifi_input(settings: &WifiSettings, password: &SecretString) -> String {
    let service = WIFI_PORT_SERVICE.uri();
    let endpoint = envelope::endpoint_reference(WIFI_ENDPOINT, &[("Name", "WiFi Endpoint 0")]);
    let name = escape(&settings.profile_name);
    format!(
        "<h:AddWiFiSettings_INPUT xmlns:h=\"{service}\">\
         <h:WiFiEndpoint>{endpoint}</h:WiFiEndpoint>\
         <h:WiFiEndpointSettingsInput xmlns:q=\"{settings_uri}\">\
         <q:ElementName>{name}</q:ElementName>\
         <q:InstanceID>Intel(r) AMT:WiFi Endpoint Settings {name}</q:InstanceID>\
         <q:AuthenticationMethod>{WPA2_8021X}</q:AuthenticationMethod>\
         <q:EncryptionMethod>{CCMP}</q:EncryptionMethod>\
         <q:SSID>{ssid}</q:SSID>\
         <q:Priority>{priority}</q:Priority>\
         </h:WiFiEndpointSettingsInput>\
         <h:IEEE8021xSettingsInput xmlns:r=\"{ieee_uri}\">\
         <r:ElementName>{name}</r:ElementName>\
         <r:InstanceID>Intel(r) AMT:IEEE 802.1x Settings {name}</r:InstanceID>\
         <r:AuthenticationProtocol>{protocol}</r:AuthenticationProtocol>\
         <r:Username>{username}</r:Username>\
         <r:Password>{secret}</r:Password>\
         </h:IEEE8021xSettingsInput>\
         </h:AddWiFiSettings_INPUT>",
        settings_uri = WIFI_ENDPOINT_SETTINGS.uri(),
        ssid = escape(&settings.ssid),
        priority = settings.priority,
        ieee_uri = IEEE8021X_SETTINGS.uri(),
        protocol = settings.auth_protocol.code(),
        username = escape(&settings.username),
        secret = escape(password.expose_secret()),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::EapProtocol;
    use crate::test_support::{ok, serve, soap};

    fn profile(protocol: EapProtocol) -> WifiSettings {
        WifiSettings {
            profile_name: "corp".into(),
            ssid: "CorpNet".into(),
            priority: 1,
            auth_protocol: protocol,
            username: "host\\agent".into(),
        }
    }

    #[test]
    fn admin_hash_is_salted_with_realm() {
        let password = SecretString::from("P@ssw0rd".to_string());
        assert_eq!(
            admin_password_hash("Digest:ABCD", &password),
            md5_hex("admin:Digest:ABCD:P@ssw0rd")
        );
    }

    #[test]
    fn non_zero_return_value_is_an_error() {
        let err = check_return_value("Setup", "<g:ReturnValue>2</g:ReturnValue>").unwrap_err();
        assert!(matches!(err, Error::ReturnValue { method: "Setup", code: 2 }));
        assert!(check_return_value("Setup", "<g:ReturnValue>0</g:ReturnValue>").is_ok());
    }

    #[tokio::test]
    async fn host_based_setup_sends_hash_not_password() {
        let general = soap("<g:AMT_GeneralSettings><g:DigestRealm>Digest:ABCD</g:DigestRealm></g:AMT_GeneralSettings>");
        let output = soap("<g:Setup_OUTPUT><g:ReturnValue>0</g:ReturnValue></g:Setup_OUTPUT>");
        let (config, log) = serve(vec![ok(&general), ok(&output)]).await;
        let client = WsmanClient::new(config, None);
        let password = SecretString::from("P@ssw0rd".to_string());

        client.host_based_setup(&password).await.unwrap();

        let requests = log.lock().unwrap();
        let setup = &requests[1];
        assert!(setup.contains("IPS_HostBasedSetupService/Setup"));
        assert!(setup.contains(&md5_hex("admin:Digest:ABCD:P@ssw0rd")));
        assert!(!setup.contains("P@ssw0rd"));
    }

    #[tokio::test]
    async fn tls_profiles_are_rejected_before_any_request() {
        let (config, log) = serve(vec![]).await;
        let client = WsmanClient::new(config, None);
        let password = SecretString::from("x".to_string());
        let err = client
            .add_wifi_settings(&profile(EapProtocol::Tls), &password)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn wifi_input_escapes_values() {
        let input = wifi_input(&profile(EapProtocol::PeapMschapV2), &SecretString::from("a&b".to_string()));
        assert!(input.contains("<r:AuthenticationProtocol>2</r:AuthenticationProtocol>"));
        assert!(input.contains("<r:Password>a&amp;b</r:Password>"));
        assert!(input.contains("<w:Selector Name=\"Name\">WiFi Endpoint 0</w:Selector>"));
    }
}
