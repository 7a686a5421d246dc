// WS-Management HTTP client
//
// Posts SOAP envelopes to `/wsman` through a fresh LMS session per request
// and handles the digest challenge. Typed queries live in `queries.rs` and
// method invocations in `setup.rs` as inherent methods, keeping this module
// focused on transport mechanics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use secrecy::SecretString;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::digest::DigestChallenge;
use super::envelope::{self, Resource, Selectors};
use super::xml;
use crate::error::Error;
use crate::http::{self, HttpCompleteness, HttpResponse};
use crate::lms::{DrainEnd, LmsConfig, LmsConnection, RawFrame};

const WSMAN_PATH: &str = "/wsman";
const CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// How long one request may keep listening for the rest of a response.
pub const DEFAULT_RESPONSE_BUDGET: Duration = Duration::from_secs(15);

/// Digest credentials for the firmware web service.
#[derive(Debug, Clone)]
pub struct DigestCredentials {
    pub username: String,
    pub password: SecretString,
}

/// WS-Management client speaking through LMS.
///
/// Every request opens its own [`LmsConnection`], so the client itself
/// holds no socket and can be shared by reference across sequential calls.
pub struct WsmanClient {
    lms: LmsConfig,
    credentials: Option<DigestCredentials>,
    /// Last digest challenge; reused until the firmware rejects its nonce.
    challenge: Mutex<Option<DigestChallenge>>,
    nonce_count: AtomicU32,
    message_id: AtomicU32,
    response_budget: Duration,
}

impl WsmanClient {
    pub fn new(lms: LmsConfig, credentials: Option<DigestCredentials>) -> Self {
        Self {
            lms,
            credentials,
            challenge: Mutex::new(None),
            nonce_count: AtomicU32::new(0),
            message_id: AtomicU32::new(0),
            response_budget: DEFAULT_RESPONSE_BUDGET,
        }
    }

    #[must_use]
    pub fn with_response_budget(mut self, budget: Duration) -> Self {
        self.response_budget = budget;
        self
    }

    // ── WS-Management verbs ──────────────────────────────────────────

    /// `Get` one instance and return its inner XML.
    pub async fn get(&self, resource: Resource, selectors: Selectors<'_>) -> Result<String, Error> {
        debug!(class = resource.class, "wsman get");
        let body = self
            .post_envelope(&envelope::get(resource, selectors, self.next_message_id()))
            .await?;
        instance(&body, resource)
    }

    /// `Enumerate` then `Pull` until the sequence ends; returns each instance's inner XML.
    pub async fn enumerate(&self, resource: Resource) -> Result<Vec<String>, Error> {
        debug!(class = resource.class, "wsman enumerate");
        let body = self
            .post_envelope(&envelope::enumerate(resource, self.next_message_id()))
            .await?;
        let mut context = xml::text(&body, "EnumerationContext").ok_or_else(|| Error::Wsman {
            message: format!("{} enumeration returned no context", resource.class),
        })?;

        let mut items = Vec::new();
        loop {
            let body = self
                .post_envelope(&envelope::pull(resource, &context, self.next_message_id()))
                .await?;
            items.extend(xml::elements(&body, resource.class).into_iter().map(str::to_owned));

            if !xml::elements(&body, "EndOfSequence").is_empty() {
                break;
            }
            match xml::text(&body, "EnumerationContext") {
                Some(next) => context = next,
                None => break,
            }
        }
        trace!(class = resource.class, count = items.len(), "enumeration complete");
        Ok(items)
    }

    /// Invoke a method and return the `{method}_OUTPUT` inner XML.
    pub async fn invoke(&self, resource: Resource, method: &str, input: &str) -> Result<String, Error> {
        debug!(class = resource.class, method, "wsman invoke");
        let body = self
            .post_envelope(&envelope::invoke(resource, method, input, self.next_message_id()))
            .await?;
        let output = format!("{method}_OUTPUT");
        xml::elements(&body, &output)
            .first()
            .map(|inner| (*inner).to_owned())
            .ok_or_else(|| Error::Wsman {
                message: format!("{method} response carried no output"),
            })
    }

    // ── Transport ────────────────────────────────────────────────────

    fn next_message_id(&self) -> u32 {
        self.message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// POST one envelope, answering a digest challenge at most once.
    async fn post_envelope(&self, envelope: &str) -> Result<String, Error> {
        let mut challenged = false;
        loop {
            let authorization = self.authorization();
            let request = http::post(
                &self.lms.endpoint(),
                WSMAN_PATH,
                CONTENT_TYPE,
                envelope,
                authorization.as_deref(),
            );
            let response = self.round_trip(&request).await?;

            if response.status == 401 {
                if challenged {
                    return Err(Error::Authentication {
                        message: "AMT rejected the supplied credentials".into(),
                    });
                }
                if self.credentials.is_none() {
                    return Err(Error::Authentication {
                        message: "AMT requires credentials for this request".into(),
                    });
                }
                let challenge = response
                    .header("www-authenticate")
                    .and_then(DigestChallenge::parse)
                    .ok_or_else(|| Error::Authentication {
                        message: "AMT did not offer digest authentication".into(),
                    })?;
                debug!(realm = %challenge.realm, "received digest challenge");
                self.store_challenge(challenge);
                challenged = true;
                continue;
            }

            let body = response.body_text();
            if let Some(reason) = fault_reason(&body) {
                return Err(Error::Wsman { message: reason });
            }
            if !(200..300).contains(&response.status) {
                return Err(Error::Http(format!("unexpected status {}", response.status)));
            }
            return Ok(body);
        }
    }

    fn authorization(&self) -> Option<String> {
        let credentials = self.credentials.as_ref()?;
        let guard = self.challenge.lock().unwrap_or_else(PoisonError::into_inner);
        let challenge = guard.as_ref()?;
        let nonce_count = self.nonce_count.fetch_add(1, Ordering::Relaxed) + 1;
        let cnonce = uuid::Uuid::new_v4().simple().to_string();
        Some(challenge.authorization(
            &credentials.username,
            &credentials.password,
            "POST",
            WSMAN_PATH,
            nonce_count,
            &cnonce,
        ))
    }

    fn store_challenge(&self, challenge: DigestChallenge) {
        *self.challenge.lock().unwrap_or_else(PoisonError::into_inner) = Some(challenge);
        self.nonce_count.store(0, Ordering::Relaxed);
    }

    /// One request on its own LMS session.
    async fn round_trip(&self, request: &[u8]) -> Result<HttpResponse, Error> {
        let mut conn = LmsConnection::new(self.lms.clone());
        conn.connect().await?;
        let result = self.read_response(&mut conn, request).await;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "closing wsman session");
        }
        result
    }

    /// Keep draining until the HTTP framing says the response is whole.
    async fn read_response(&self, conn: &mut LmsConnection, request: &[u8]) -> Result<HttpResponse, Error> {
        conn.send(request).await?;
        let started = Instant::now();
        let mut frame = RawFrame::default();
        loop {
            let outcome = conn.listen().await;
            if let Some(err) = outcome.error {
                return Err(err);
            }
            frame.extend(outcome.frame);

            match frame.http_completeness() {
                HttpCompleteness::Complete => return HttpResponse::parse(frame.as_bytes()),
                HttpCompleteness::NotHttp => {
                    return Err(Error::Http("LMS returned a non-HTTP response".into()));
                }
                HttpCompleteness::Incomplete
                    if outcome.end == DrainEnd::EndOfStream || started.elapsed() >= self.response_budget =>
                {
                    return Err(Error::Truncated { received: frame.len() });
                }
                HttpCompleteness::Incomplete => {
                    trace!(bytes = frame.len(), "response incomplete, listening again");
                }
            }
        }
    }
}

/// First instance element of `resource` in a response body.
fn instance(body: &str, resource: Resource) -> Result<String, Error> {
    xml::elements(body, resource.class)
        .first()
        .map(|inner| (*inner).to_owned())
        .ok_or_else(|| Error::Wsman {
            message: format!("response carried no {} instance", resource.class),
        })
}

/// Human-readable reason of a SOAP fault, if the body is one.
fn fault_reason(body: &str) -> Option<String> {
    let fault = *xml::elements(body, "Fault").first()?;
    Some(
        xml::text(fault, "Text")
            .or_else(|| xml::texts(fault, "Value").pop())
            .unwrap_or_else(|| "unspecified SOAP fault".into()),
    )
}
