//! # Mock Transport
//!
//! A scripted [`Transport`] for testing code that uses a [`Potion`](crate::Potion)
//! client without a server.
//!
//! Register what requests you expect and what each should return, hand a clone
//! of the mock to the client, then call [`MockTransport::verify`] to make sure
//! every expectation was used.
//!
//! ```ignore
//! let transport = MockTransport::new();
//! transport.expect_get("/user/1").return_ok(json!({"$uri": "/user/1"}));
//! transport.expect_delete("/user/1").return_err(403, "forbidden");
//!
//! let potion = Potion::new(transport.clone());
//! // ...
//! transport.verify();
//! ```
//!
//! An incoming request is matched against the oldest expectation with the same
//! method and URI. A request nothing matches panics, as does `verify` with
//! expectations left over.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as Json;

use crate::error::TransportError;
use crate::transport::{Headers, Method, Request, Response, Transport};

// =============================================================================
// EXPECTATIONS
// =============================================================================

struct Expectation {
    method: Method,
    uri: String,
    headers: Headers,
    delay: Option<Duration>,
    response: Result<Json, TransportError>,
}

#[derive(Default)]
struct MockState {
    expectations: Mutex<VecDeque<Expectation>>,
    requests: Mutex<Vec<(String, Request)>>,
}

/// A transport that answers from a list of expectations.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Creates a mock with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects a request with `method` to `uri` (as the transport sees it,
    /// including the global prefix).
    pub fn expect(&self, method: Method, uri: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            state: self.state.clone(),
            method,
            uri: uri.into(),
            headers: Headers::new(),
            delay: None,
        }
    }

    pub fn expect_get(&self, uri: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Get, uri)
    }

    pub fn expect_post(&self, uri: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Post, uri)
    }

    pub fn expect_put(&self, uri: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Put, uri)
    }

    pub fn expect_patch(&self, uri: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Patch, uri)
    }

    pub fn expect_delete(&self, uri: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Delete, uri)
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<(String, Request)> {
        self.state.requests.lock().clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.state.expectations.lock();
        if !remaining.is_empty() {
            let pending: Vec<String> = remaining
                .iter()
                .map(|e| format!("{} {}", e.method, e.uri))
                .collect();
            panic!(
                "Not all expectations were met. {} remaining: {:?}",
                remaining.len(),
                pending
            );
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, uri: &str, request: Request) -> Result<Response, TransportError> {
        let method = request.method;
        self.state
            .requests
            .lock()
            .push((uri.to_string(), request));

        let expectation = {
            let mut expectations = self.state.expectations.lock();
            let position = expectations
                .iter()
                .position(|e| e.method == method && e.uri == uri);
            position.and_then(|i| expectations.remove(i))
        };
        let Some(expectation) = expectation else {
            panic!("Unexpected request: {method} {uri}");
        };

        if let Some(delay) = expectation.delay {
            tokio::time::sleep(delay).await;
        }

        expectation.response.map(|body| Response {
            headers: expectation.headers,
            body,
        })
    }
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// Builder for one expected request.
pub struct ExpectationBuilder {
    state: Arc<MockState>,
    method: Method,
    uri: String,
    headers: Headers,
    delay: Option<Duration>,
}

impl ExpectationBuilder {
    /// Adds a response header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Holds the response back for `delay`.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the expectation to return `body`.
    pub fn return_ok(self, body: Json) {
        self.push(Ok(body));
    }

    /// Sets the expectation to fail with an HTTP status.
    pub fn return_err(self, status: u16, message: impl Into<String>) {
        self.push(Err(TransportError::status(status, message)));
    }

    /// Sets the expectation to fail without any detail.
    pub fn return_opaque_err(self) {
        self.push(Err(TransportError::opaque()));
    }

    fn push(self, response: Result<Json, TransportError>) {
        self.state.expectations.lock().push_back(Expectation {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            delay: self.delay,
            response,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_with_expectations() {
        let mock = MockTransport::new();
        mock.expect_get("/user/1")
            .with_header("X-Total-Count", "3")
            .return_ok(json!({"$uri": "/user/1"}));
        mock.expect_delete("/user/1").return_err(403, "forbidden");

        let response = mock.request("/user/1", Request::get()).await.unwrap();
        assert_eq!(response.headers.get("x-total-count"), Some("3"));
        assert_eq!(response.body, json!({"$uri": "/user/1"}));

        let err = mock
            .request("/user/1", Request::new(Method::Delete))
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(403));

        assert_eq!(mock.request_count(), 2);
        mock.verify();
    }

    #[tokio::test]
    #[should_panic(expected = "Unexpected request")]
    async fn test_unexpected_request_panics() {
        let mock = MockTransport::new();
        let _ = mock.request("/user/1", Request::get()).await;
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_panics_on_leftovers() {
        let mock = MockTransport::new();
        mock.expect_get("/user/1").return_ok(json!(null));
        mock.verify();
    }
}
