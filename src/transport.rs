//! # Transport
//!
//! The client never talks to the network itself. Applications supply a
//! [`Transport`] that performs the HTTP request and hands back headers and a
//! decoded JSON body. Retries, timeouts, cancellation and authentication all
//! belong to the transport.
//!
//! Non-2xx responses must be reported as a [`TransportError`].

use std::collections::HashMap;
use std::fmt::{self, Display};

use async_trait::async_trait;
use serde_json::{Map, Value as Json};

use crate::error::TransportError;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// GET passes parameters as the query string, everything else as the body.
    pub fn takes_body(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the client asks the transport to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Query parameters, already in wire form.
    pub search: Option<Map<String, Json>>,
    /// Request body, already in wire form.
    pub body: Option<Json>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            search: None,
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }
}

/// Response headers with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub headers: Headers,
    pub body: Json,
}

impl Response {
    pub fn new(body: Json) -> Self {
        Self {
            headers: Headers::new(),
            body,
        }
    }
}

/// Performs HTTP requests on behalf of the client.
///
/// ```
/// use async_trait::async_trait;
/// use potion::transport::{Request, Response, Transport};
/// use potion::TransportError;
///
/// struct Offline;
///
/// #[async_trait]
/// impl Transport for Offline {
///     async fn request(&self, uri: &str, _: Request) -> Result<Response, TransportError> {
///         Err(TransportError::status(503, format!("offline: {uri}")))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` to `uri` (already carrying the global prefix).
    async fn request(&self, uri: &str, request: Request) -> Result<Response, TransportError>;
}
