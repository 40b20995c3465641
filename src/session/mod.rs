//! Per-run server session.
//!
//! A [`Session`] owns one HTTP transport, the current bearer credential and
//! two append-only logs (outgoing requests, incoming responses) keyed by a
//! caller-chosen step name. It is created for a single reconciliation run
//! and never shared; independent runs get independent sessions.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{KanidmConfig, USER_AGENT};
use crate::error::{KanidmResult, TransportError};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, ReqwestTransport};

/// Body marker the server returns for lookups that matched no entries,
/// even under a nominally successful status code.
const NO_MATCHING_ENTRIES: &str = "nomatchingentries";

/// Outcome of one HTTP step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The step name used to index the session logs.
    pub step: String,
    /// Whether the step succeeded (2xx status and no missing-entry marker).
    pub ok: bool,
    /// HTTP status code.
    pub status: u16,
    /// HTTP reason phrase.
    pub reason: String,
    /// Best-effort decoded JSON body; [`Value::Null`] when not JSON.
    pub json: Value,
    /// Raw body text.
    pub text: String,
}

/// A captured outgoing request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// Step name.
    pub step: String,
    /// HTTP method.
    pub method: &'static str,
    /// Absolute URL.
    pub url: String,
    /// Headers as sent, with the bearer credential redacted.
    pub headers: HashMap<String, String>,
    /// Best-effort decoded body.
    pub body: Value,
}

/// A captured incoming response.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    /// Step name.
    pub step: String,
    /// HTTP status code.
    pub status: u16,
    /// HTTP reason phrase.
    pub reason: String,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Best-effort decoded body.
    pub body: Value,
}

/// Append-only capture of every request/response pair of a run.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    requests: Vec<RequestRecord>,
    responses: Vec<ResponseRecord>,
}

impl SessionLog {
    /// All captured requests, in send order.
    pub fn requests(&self) -> &[RequestRecord] {
        &self.requests
    }

    /// All captured responses, in receive order.
    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    /// The most recent request recorded under the given step name.
    pub fn request(&self, step: &str) -> Option<&RequestRecord> {
        self.requests.iter().rev().find(|r| r.step == step)
    }

    /// The most recent response recorded under the given step name.
    pub fn response(&self, step: &str) -> Option<&ResponseRecord> {
        self.responses.iter().rev().find(|r| r.step == step)
    }

    /// Number of requests whose step name starts with the given prefix.
    pub fn requests_matching(&self, prefix: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.step.starts_with(prefix))
            .count()
    }
}

/// A single reconciliation run's connection to the server.
pub struct Session {
    config: Arc<KanidmConfig>,
    transport: Arc<dyn HttpTransport>,
    bearer: Option<SecretString>,
    log: SessionLog,
    last: Option<StepResult>,
}

impl Session {
    /// Create a session with its own HTTP client built from the config.
    pub fn new(config: Arc<KanidmConfig>) -> KanidmResult<Self> {
        let transport = Arc::new(ReqwestTransport::from_config(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a session over an injected transport (used by tests).
    pub fn with_transport(config: Arc<KanidmConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            bearer: None,
            log: SessionLog::default(),
            last: None,
        }
    }

    /// The connection configuration this session was built from.
    pub fn config(&self) -> &KanidmConfig {
        &self.config
    }

    /// The transport this session sends through.
    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Attach a bearer credential; replaces any previous credential.
    ///
    /// Attaching the same token again is a no-op.
    pub fn attach_bearer(&mut self, token: SecretString) {
        match &self.bearer {
            Some(current) if current.expose_secret() == token.expose_secret() => {}
            _ => self.bearer = Some(token),
        }
    }

    /// Whether a bearer credential is currently attached.
    pub fn bearer_attached(&self) -> bool {
        self.bearer.is_some()
    }

    /// The captured request/response log.
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Consume the session, keeping only its log.
    pub fn into_log(self) -> SessionLog {
        self.log
    }

    /// The most recent step result.
    pub fn last(&self) -> Option<&StepResult> {
        self.last.as_ref()
    }

    /// Status/reason/body summary of the most recent response.
    pub fn last_error(&self) -> String {
        match &self.last {
            Some(last) => format!("{} {} {}", last.status, last.reason, last.text),
            None => "no response recorded".to_string(),
        }
    }

    /// Perform a GET step.
    pub async fn get(&mut self, step: &str, path: &str) -> KanidmResult<StepResult> {
        self.send(step, HttpMethod::Get, path, "application/json", None)
            .await
    }

    /// Perform a POST step with a JSON body.
    pub async fn post_json<T: Serialize>(
        &mut self,
        step: &str,
        path: &str,
        body: &T,
    ) -> KanidmResult<StepResult> {
        let body = encode_json(body)?;
        self.send(step, HttpMethod::Post, path, "application/json", Some(body))
            .await
    }

    /// Perform a PATCH step with a JSON body.
    pub async fn patch_json<T: Serialize>(
        &mut self,
        step: &str,
        path: &str,
        body: &T,
    ) -> KanidmResult<StepResult> {
        let body = encode_json(body)?;
        self.send(step, HttpMethod::Patch, path, "application/json", Some(body))
            .await
    }

    /// Perform a POST step with a pre-encoded body and content type
    /// (multipart uploads).
    pub async fn post_bytes(
        &mut self,
        step: &str,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> KanidmResult<StepResult> {
        self.send(step, HttpMethod::Post, path, content_type, Some(body))
            .await
    }

    async fn send(
        &mut self,
        step: &str,
        method: HttpMethod,
        path: &str,
        content_type: &str,
        body: Option<Bytes>,
    ) -> KanidmResult<StepResult> {
        let url = format!(
            "{}{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path
        );
        let headers = self.build_headers(content_type);

        self.log.requests.push(RequestRecord {
            step: step.to_string(),
            method: method.as_str(),
            url: url.clone(),
            headers: redact_authorization(&headers),
            body: body_to_value(body.as_deref()),
        });

        debug!(step, method = method.as_str(), %url, "sending request");
        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                headers,
                body,
            })
            .await?;

        let text = String::from_utf8_lossy(&response.body).to_string();
        let json: Value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);
        let ok = (200..300).contains(&response.status) && !text.contains(NO_MATCHING_ENTRIES);

        self.log.responses.push(ResponseRecord {
            step: step.to_string(),
            status: response.status,
            reason: response.reason.clone(),
            headers: response.headers,
            body: if json.is_null() {
                Value::String(text.clone())
            } else {
                json.clone()
            },
        });
        debug!(step, status = response.status, ok, "received response");

        let result = StepResult {
            step: step.to_string(),
            ok,
            status: response.status,
            reason: response.reason,
            json,
            text,
        };
        self.last = Some(result.clone());
        Ok(result)
    }

    fn build_headers(&self, content_type: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert("Content-Type".to_string(), content_type.to_string());
        headers.insert("Cache-Control".to_string(), "no-cache".to_string());
        headers.insert("Accept".to_string(), "*/*".to_string());
        headers.insert("Accept-Encoding".to_string(), "gzip, deflate, br".to_string());
        headers.insert("Connection".to_string(), "keep-alive".to_string());
        if let Some(bearer) = &self.bearer {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", bearer.expose_secret()),
            );
        }
        headers
    }
}

fn encode_json<T: Serialize>(body: &T) -> Result<Bytes, TransportError> {
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(|e| TransportError::Request(e.to_string()))
}

fn redact_authorization(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("authorization") {
                (k.clone(), "Bearer [REDACTED]".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

fn body_to_value(body: Option<&[u8]>) -> Value {
    match body {
        None => Value::String(String::new()),
        Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|_| {
            match std::str::from_utf8(bytes) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::String(format!("<{} bytes>", bytes.len())),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_decoding_falls_back_to_text() {
        assert_eq!(
            body_to_value(Some(&br#"{"a":1}"#[..])),
            serde_json::json!({"a": 1})
        );
        assert_eq!(
            body_to_value(Some(&b"plain"[..])),
            Value::String("plain".into())
        );
        assert_eq!(
            body_to_value(Some(&[0xFF, 0xFE][..])),
            Value::String("<2 bytes>".into())
        );
    }

    #[test]
    fn authorization_is_redacted_in_log() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());
        headers.insert("Accept".to_string(), "*/*".to_string());
        let redacted = redact_authorization(&headers);
        assert_eq!(redacted["Authorization"], "Bearer [REDACTED]");
        assert_eq!(redacted["Accept"], "*/*");
    }
}
