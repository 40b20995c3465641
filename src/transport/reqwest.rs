//! Reqwest-based HTTP transport implementation.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Certificate, Client};
use std::collections::HashMap;

use super::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::config::KanidmConfig;
use crate::error::{ConfigurationError, KanidmError, TransportError};

/// Reqwest-based HTTP transport.
///
/// Built per reconciliation run from a [`KanidmConfig`]; the CA trust
/// material, verification flag and timeouts are baked into the client.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport from the connection configuration.
    pub fn from_config(config: &KanidmConfig) -> Result<Self, KanidmError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout);

        if !config.verify_ca {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &config.ca_path {
            let pem = std::fs::read(path).map_err(|e| ConfigurationError::CaTrust {
                message: format!("{}: {e}", path.display()),
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| ConfigurationError::CaTrust {
                message: e.to_string(),
            })?;
            builder = builder.add_root_certificate(cert);
        } else if let Some(pem) = &config.ca_cert_data {
            let cert =
                Certificate::from_pem(pem.as_bytes()).map_err(|e| ConfigurationError::CaTrust {
                    message: e.to_string(),
                })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|e| ConfigurationError::HttpClient {
            message: e.to_string(),
        })?;

        Ok(Self { client })
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }

    fn convert_headers(headers: HashMap<String, String>) -> reqwest::header::HeaderMap {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                reqwest::header::HeaderValue::from_str(&value),
            ) {
                header_map.insert(name, val);
            }
        }
        header_map
    }

    fn extract_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect()
    }

    fn convert_error(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connection(e.to_string())
        } else if e.is_builder() || e.is_request() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = Self::convert_method(request.method);
        let headers = Self::convert_headers(request.headers);

        let mut req_builder = self.client.request(method, &request.url).headers(headers);
        if let Some(body) = request.body {
            req_builder = req_builder.body(body.to_vec());
        }

        let response = req_builder.send().await.map_err(Self::convert_error)?;

        let status = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string();
        let headers = Self::extract_headers(response.headers());
        let body: Bytes = response.bytes().await.map_err(Self::convert_error)?;

        Ok(HttpResponse {
            status,
            reason,
            headers,
            body,
        })
    }
}
