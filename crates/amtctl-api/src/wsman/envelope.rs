// WS-Management SOAP envelope builders.

use super::xml::escape;

pub const AMT_SCHEMA: &str = "http://intel.com/wbem/wscim/1/amt-schema/1/";
pub const CIM_SCHEMA: &str = "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/";
pub const IPS_SCHEMA: &str = "http://intel.com/wbem/wscim/1/ips-schema/1/";

const ACTION_GET: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";
const ACTION_ENUMERATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration/Enumerate";
const ACTION_PULL: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration/Pull";
const ENUMERATION_NS: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration";
const ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";

/// A WS-Management class, addressed by schema + class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub schema: &'static str,
    pub class: &'static str,
}

impl Resource {
    pub const fn amt(class: &'static str) -> Self {
        Self {
            schema: AMT_SCHEMA,
            class,
        }
    }

    pub const fn cim(class: &'static str) -> Self {
        Self {
            schema: CIM_SCHEMA,
            class,
        }
    }

    pub const fn ips(class: &'static str) -> Self {
        Self {
            schema: IPS_SCHEMA,
            class,
        }
    }

    pub fn uri(&self) -> String {
        format!("{}{}", self.schema, self.class)
    }
}

/// `(name, value)` selector pairs narrowing a Get to one instance.
pub type Selectors<'a> = &'a [(&'a str, &'a str)];

pub fn get(resource: Resource, selectors: Selectors<'_>, message_id: u32) -> String {
    envelope(ACTION_GET, &resource.uri(), selectors, message_id, "")
}

pub fn enumerate(resource: Resource, message_id: u32) -> String {
    let body = format!("<Enumerate xmlns=\"{ENUMERATION_NS}\" />");
    envelope(ACTION_ENUMERATE, &resource.uri(), &[], message_id, &body)
}

pub fn pull(resource: Resource, context: &str, message_id: u32) -> String {
    let body = format!(
        "<Pull xmlns=\"{ENUMERATION_NS}\"><EnumerationContext>{}</EnumerationContext>\
         <MaxElements>999</MaxElements><MaxCharacters>99999</MaxCharacters></Pull>",
        escape(context)
    );
    envelope(ACTION_PULL, &resource.uri(), &[], message_id, &body)
}

/// Invoke `method` with a pre-rendered `<h:{method}_INPUT>` body.
pub fn invoke(resource: Resource, method: &str, input: &str, message_id: u32) -> String {
    let uri = resource.uri();
    let action = format!("{uri}/{method}");
    envelope(&action, &uri, &[], message_id, input)
}

/// Render `<h:{method}_INPUT>` from simple `(name, value)` parameters.
pub fn simple_input(resource: Resource, method: &str, params: &[(&str, &str)]) -> String {
    let mut body = format!("<h:{method}_INPUT xmlns:h=\"{}\">", resource.uri());
    for (name, value) in params {
        body.push_str(&format!("<h:{name}>{}</h:{name}>", escape(value)));
    }
    body.push_str(&format!("</h:{method}_INPUT>"));
    body
}

/// An endpoint reference to another instance, for invoke inputs.
pub fn endpoint_reference(resource: Resource, selectors: Selectors<'_>) -> String {
    format!(
        "<a:Address>/wsman</a:Address><a:ReferenceParameters><w:ResourceURI>{}</w:ResourceURI>{}</a:ReferenceParameters>",
        resource.uri(),
        selector_set(selectors)
    )
}

fn envelope(action: &str, resource_uri: &str, selectors: Selectors<'_>, message_id: u32, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <Envelope xmlns=\"http://www.w3.org/2003/05/soap-envelope\" \
         xmlns:a=\"http://schemas.xmlsoap.org/ws/2004/08/addressing\" \
         xmlns:w=\"http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd\">\
         <Header><a:Action>{action}</a:Action><a:To>/wsman</a:To>\
         <w:ResourceURI>{resource_uri}</w:ResourceURI>\
         <a:MessageID>{message_id}</a:MessageID>\
         <a:ReplyTo><a:Address>{ANONYMOUS}</a:Address></a:ReplyTo>\
         <w:OperationTimeout>PT60S</w:OperationTimeout>{}</Header>\
         <Body>{body}</Body></Envelope>",
        selector_set(selectors)
    )
}

fn selector_set(selectors: Selectors<'_>) -> String {
    if selectors.is_empty() {
        return String::new();
    }
    let mut set = String::from("<w:SelectorSet>");
    for (name, value) in selectors {
        set.push_str(&format!("<w:Selector Name=\"{name}\">{}</w:Selector>", escape(value)));
    }
    set.push_str("</w:SelectorSet>");
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsman::xml;

    #[test]
    fn get_carries_resource_and_selectors() {
        let env = get(
            Resource::amt("AMT_EthernetPortSettings"),
            &[("InstanceID", "Intel(r) AMT Ethernet Port Settings 0")],
            7,
        );
        assert_eq!(
            xml::text(&env, "ResourceURI").as_deref(),
            Some("http://intel.com/wbem/wscim/1/amt-schema/1/AMT_EthernetPortSettings")
        );
        assert_eq!(xml::text(&env, "MessageID").as_deref(), Some("7"));
        assert!(env.contains("<w:Selector Name=\"InstanceID\">Intel(r) AMT Ethernet Port Settings 0</w:Selector>"));
    }

    #[test]
    fn invoke_action_is_resource_slash_method() {
        let resource = Resource::ips("IPS_HostBasedSetupService");
        let input = simple_input(resource, "Setup", &[("NetAdminPassEncryptionType", "2")]);
        let env = invoke(resource, "Setup", &input, 1);
        assert_eq!(
            xml::text(&env, "Action").as_deref(),
            Some("http://intel.com/wbem/wscim/1/ips-schema/1/IPS_HostBasedSetupService/Setup")
        );
        assert_eq!(xml::text(&env, "NetAdminPassEncryptionType").as_deref(), Some("2"));
    }
}
