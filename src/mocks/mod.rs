//! Mock implementations for testing.
//!
//! [`MockHttpTransport`] lets tests enqueue responses and inspect the
//! requests a workflow sent, in send order, without a network.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Mock HTTP transport backed by a response queue and a request log.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse, TransportError>>>>,
    default_response: Arc<Mutex<Option<HttpResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttpTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a response for the next request.
    pub fn enqueue_response(&self, response: Result<HttpResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Enqueue a JSON response with the given status and body.
    pub fn enqueue_json_response(&self, status: u16, body: &str) {
        self.enqueue_response(Ok(json_response(status, body)));
    }

    /// Enqueue a transport-level error.
    pub fn enqueue_error(&self, error: TransportError) {
        self.enqueue_response(Err(error));
    }

    /// Serve this response whenever the queue is empty.
    pub fn set_default_response(&self, status: u16, body: &str) {
        *self.default_response.lock().unwrap() = Some(json_response(status, body));
    }

    /// All requests received so far, in send order.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The most recent request, if any.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests whose URL contains the given fragment.
    pub fn requests_to(&self, url_fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(url_fragment))
            .cloned()
            .collect()
    }

    /// Assert the number of requests received.
    pub fn verify_request_count(&self, expected: usize) {
        let actual = self.request_count();
        assert_eq!(actual, expected, "expected {expected} requests, saw {actual}");
    }
}

fn json_response(status: u16, body: &str) -> HttpResponse {
    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    HttpResponse {
        status,
        reason: reason_for(status).to_string(),
        headers,
        body: Bytes::from(body.to_string()),
    }
}

fn reason_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);

        let queued = self.responses.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => self
                .default_response
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| {
                    TransportError::Connection("no mock response available".to_string())
                }),
        }
    }
}
