// Loopback stand-in for LMS used by unit tests.
//
// Each queued response answers exactly one accepted connection, matching
// the one-request-per-session pattern of the WS-Man client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::lms::LmsConfig;

pub type RequestLog = Arc<Mutex<Vec<String>>>;

/// Serve `responses` in order, one per connection, recording each request.
pub async fn serve(responses: Vec<String>) -> (LmsConfig, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = LmsConfig {
        host: "127.0.0.1".into(),
        port: listener.local_addr().unwrap().port(),
        read_timeout: Duration::from_millis(200),
    };
    let log: RequestLog = Arc::default();
    let seen = Arc::clone(&log);
    tokio::spawn(async move {
        for response in responses {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            seen.lock().unwrap().push(request);
            sock.write_all(response.as_bytes()).await.unwrap();
        }
    });
    (config, log)
}

/// `200 OK` carrying `body` with a Content-Length.
pub fn ok(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/soap+xml\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

/// Wrap instance XML in a SOAP body.
pub fn soap(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a:Envelope xmlns:a=\"http://www.w3.org/2003/05/soap-envelope\"><a:Header></a:Header><a:Body>{body}</a:Body></a:Envelope>"
    )
}

async fn read_request(sock: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = sock.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if body.len() >= len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
