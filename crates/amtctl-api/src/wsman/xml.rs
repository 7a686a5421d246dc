// Just enough XML for WS-Management responses: find elements by local name
// (ignoring namespace prefixes), return their inner text, escape outgoing text.

/// Inner XML of every element with local name `name`, in document order.
pub fn elements<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(found) = next_open_tag(xml, cursor, name) {
        match found {
            OpenTag::SelfClosing { end } => {
                out.push("");
                cursor = end;
            }
            OpenTag::Open { qualified, body_start } => {
                let close = format!("</{qualified}>");
                let Some(rel) = xml[body_start..].find(&close) else {
                    break;
                };
                out.push(&xml[body_start..body_start + rel]);
                cursor = body_start + rel + close.len();
            }
        }
    }
    out
}

/// Unescaped text of the first element named `name`.
pub fn text(xml: &str, name: &str) -> Option<String> {
    elements(xml, name).first().map(|inner| unescape(inner.trim()))
}

/// Unescaped text of every element named `name`.
pub fn texts(xml: &str, name: &str) -> Vec<String> {
    elements(xml, name)
        .into_iter()
        .map(|inner| unescape(inner.trim()))
        .collect()
}

/// Escape text for inclusion in an element body.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolve the predefined entities and numeric character references
/// (`&#13;`, `&#xD;`) in one pass. Unknown or malformed references are
/// kept as written.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let resolved = rest
            .find(';')
            .and_then(|semi| Some((entity(&rest[1..semi])?, semi)));
        match resolved {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}

enum OpenTag<'a> {
    SelfClosing { end: usize },
    Open { qualified: &'a str, body_start: usize },
}

fn next_open_tag<'a>(xml: &'a str, mut cursor: usize, name: &str) -> Option<OpenTag<'a>> {
    loop {
        let lt = cursor + xml.get(cursor..)?.find('<')?;
        let gt = lt + xml[lt..].find('>')?;
        let tag = &xml[lt + 1..gt];
        cursor = gt + 1;

        if tag.starts_with(['/', '?', '!']) {
            continue;
        }
        let qualified = tag
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        let local = qualified.rsplit(':').next().unwrap_or(qualified);
        if local != name {
            continue;
        }
        return Some(if tag.ends_with('/') {
            OpenTag::SelfClosing { end: cursor }
        } else {
            OpenTag::Open {
                qualified,
                body_start: cursor,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"<a:Envelope xmlns:a="x"><a:Body><g:AMT_GeneralSettings><g:HostName>amt-host</g:HostName><g:DomainName>corp.example.com</g:DomainName><g:Empty/></g:AMT_GeneralSettings></a:Body></a:Envelope>"#;

    #[test]
    fn finds_text_by_local_name() {
        assert_eq!(text(BODY, "HostName").as_deref(), Some("amt-host"));
        assert_eq!(text(BODY, "DomainName").as_deref(), Some("corp.example.com"));
        assert_eq!(text(BODY, "Empty").as_deref(), Some(""));
        assert_eq!(text(BODY, "Missing"), None);
    }

    #[test]
    fn collects_repeated_elements_in_order() {
        let xml = "<r><i><n>1</n></i><i><n>2</n></i><x:i><n>3</n></x:i></r>";
        assert_eq!(texts(xml, "n"), vec!["1", "2", "3"]);
        assert_eq!(elements(xml, "i").len(), 3);
    }

    #[test]
    fn escape_and_unescape_are_inverse() {
        let raw = r#"a<b>&"c'"#;
        assert_eq!(unescape(&escape(raw)), raw);
        assert_eq!(escape("Tom & Jerry"), "Tom &amp; Jerry");
    }

    #[test]
    fn numeric_references_are_decoded() {
        assert_eq!(unescape("line&#xD;&#10;end"), "line\r\nend");
        assert_eq!(unescape("caf&#233; &#X41;"), "café A");
    }

    #[test]
    fn entities_are_resolved_once() {
        assert_eq!(unescape("&amp;lt;"), "&lt;");
        assert_eq!(unescape("a & b &bogus; &#xZZ; &"), "a & b &bogus; &#xZZ; &");
    }
}
