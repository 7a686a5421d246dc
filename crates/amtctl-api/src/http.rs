// Minimal HTTP/1.1 framing over the LMS socket.
//
// LMS speaks plain HTTP on its loopback port, but the session channel only
// hands back drained byte runs. These helpers build requests and decide
// whether a drained run holds a whole response before anyone parses it.

use crate::error::Error;

const HEADER_END: &[u8] = b"\r\n\r\n";
const CHUNKED_END: &[u8] = b"0\r\n\r\n";

/// Whether a drained byte run holds a complete HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCompleteness {
    /// Headers and the full body (per its framing) are present.
    Complete,
    /// Looks like HTTP but the header block or body is cut short.
    Incomplete,
    /// Not an HTTP response at all.
    NotHttp,
}

/// Inspect HTTP/1.1 framing of `raw`.
pub fn completeness(raw: &[u8]) -> HttpCompleteness {
    if raw.is_empty() {
        return HttpCompleteness::Incomplete;
    }
    if !raw.starts_with(b"HTTP/") && !b"HTTP/".starts_with(raw) {
        return HttpCompleteness::NotHttp;
    }
    let Some(split) = find(raw, HEADER_END) else {
        return HttpCompleteness::Incomplete;
    };
    let head = String::from_utf8_lossy(&raw[..split]);
    let body = &raw[split + HEADER_END.len()..];

    if let Some(len) = header_value(&head, "content-length").and_then(|v| v.parse::<usize>().ok()) {
        return if body.len() >= len {
            HttpCompleteness::Complete
        } else {
            HttpCompleteness::Incomplete
        };
    }
    if header_value(&head, "transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        return if body.ends_with(CHUNKED_END) {
            HttpCompleteness::Complete
        } else {
            HttpCompleteness::Incomplete
        };
    }
    // No length framing: body runs until the peer closes.
    HttpCompleteness::Complete
}

/// Build a `POST` request carrying `body`.
pub fn post(host: &str, path: &str, content_type: &str, body: &str, authorization: Option<&str>) -> Vec<u8> {
    let mut req = format!(
        "POST {path} HTTP/1.1\r\nHost: {host}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n",
        body.len()
    );
    if let Some(auth) = authorization {
        req.push_str("Authorization: ");
        req.push_str(auth);
        req.push_str("\r\n");
    }
    req.push_str("\r\n");
    req.push_str(body);
    req.into_bytes()
}

/// A parsed HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse a complete response. Chunked bodies are de-chunked.
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        let split = find(raw, HEADER_END).ok_or_else(|| Error::Http("missing header terminator".into()))?;
        let head = String::from_utf8_lossy(&raw[..split]);
        let rest = &raw[split + HEADER_END.len()..];

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| Error::Http(format!("bad status line: {status_line}")))?;

        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        let mut response = Self {
            status,
            headers,
            body: Vec::new(),
        };

        response.body = if response
            .header("transfer-encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
        {
            dechunk(rest)?
        } else if let Some(len) = response.header("content-length").and_then(|v| v.parse::<usize>().ok()) {
            rest.get(..len)
                .ok_or_else(|| Error::Http(format!("body shorter than Content-Length {len}")))?
                .to_vec()
        } else {
            rest.to_vec()
        };
        Ok(response)
    }

    /// Case-insensitive header lookup (first occurrence).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn dechunk(mut rest: &[u8]) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    loop {
        let line_end = find(rest, b"\r\n").ok_or_else(|| Error::Http("truncated chunk header".into()))?;
        let size_field = String::from_utf8_lossy(&rest[..line_end]);
        let size_hex = size_field.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| Error::Http(format!("bad chunk size: {size_hex}")))?;
        rest = &rest[line_end + 2..];
        if size == 0 {
            return Ok(body);
        }
        let chunk = rest
            .get(..size)
            .ok_or_else(|| Error::Http("truncated chunk body".into()))?;
        body.extend_from_slice(chunk);
        rest = rest.get(size + 2..).unwrap_or_default();
    }
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn content_length_framing() {
        let partial = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhello";
        assert_eq!(completeness(partial), HttpCompleteness::Incomplete);

        let full = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhelloworld";
        assert_eq!(completeness(full), HttpCompleteness::Complete);
    }

    #[test]
    fn chunked_framing() {
        let partial = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n";
        assert_eq!(completeness(partial), HttpCompleteness::Incomplete);

        let full = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        assert_eq!(completeness(full), HttpCompleteness::Complete);
        let parsed = HttpResponse::parse(full).unwrap();
        assert_eq!(parsed.body, b"hello");
    }

    #[test]
    fn headers_cut_short_are_incomplete() {
        assert_eq!(completeness(b"HTTP/1.1 200 OK\r\nContent-"), HttpCompleteness::Incomplete);
        assert_eq!(completeness(b"HTT"), HttpCompleteness::Incomplete);
        assert_eq!(completeness(b""), HttpCompleteness::Incomplete);
    }

    #[test]
    fn non_http_bytes_are_flagged() {
        assert_eq!(completeness(b"\x00\x01binary"), HttpCompleteness::NotHttp);
    }

    #[test]
    fn parse_reads_status_and_headers() {
        let raw = b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Digest realm=\"r\"\r\nContent-Length: 0\r\n\r\n";
        let parsed = HttpResponse::parse(raw).unwrap();
        assert_eq!(parsed.status, 401);
        assert_eq!(parsed.header("www-authenticate"), Some("Digest realm=\"r\""));
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn post_includes_length_and_auth() {
        let req = post("localhost:16992", "/wsman", "text/xml", "<a/>", Some("Digest x"));
        let text = String::from_utf8(req).unwrap();
        assert!(text.starts_with("POST /wsman HTTP/1.1\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Authorization: Digest x\r\n"));
        assert!(text.ends_with("\r\n\r\n<a/>"));
    }
}
