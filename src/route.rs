//! # Routes
//!
//! Custom endpoints bound to a collection or an instance, such as
//! `GET /user/names` or `POST /user/1/readStatus`. Responses are resolved like
//! any other payload. GET parameters go in the query string; every other
//! method sends them as the body.

use serde_json::Value as Json;
use tracing::instrument;

use crate::error::Result;
use crate::pagination::{Pagination, Query};
use crate::transport::{Method, Request};
use crate::value::{Properties, Value};
use crate::Potion;

/// A bound custom endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    potion: Potion,
    uri: String,
}

impl Route {
    pub fn new(potion: Potion, uri: String) -> Self {
        Self { potion, uri }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn get(&self) -> Result<Value> {
        self.potion.fetch(&self.uri, Request::get(), true).await
    }

    pub async fn get_with(&self, params: Properties) -> Result<Value> {
        self.call(Method::Get, Some(params)).await
    }

    pub async fn paginate(&self, query: Query) -> Result<Pagination> {
        self.potion.fetch_page(&self.uri, query, None).await
    }

    pub async fn post(&self, body: Properties) -> Result<Value> {
        self.call(Method::Post, Some(body)).await
    }

    pub async fn put(&self, body: Properties) -> Result<Value> {
        self.call(Method::Put, Some(body)).await
    }

    pub async fn patch(&self, body: Properties) -> Result<Value> {
        self.call(Method::Patch, Some(body)).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.call(Method::Delete, None).await
    }

    #[instrument(skip(self, params), fields(uri = %self.uri))]
    async fn call(&self, method: Method, params: Option<Properties>) -> Result<Value> {
        let mut request = Request::new(method);
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            let encoded = self.potion.encoder().encode_properties(&params);
            if method.takes_body() {
                request.body = Some(Json::Object(encoded));
            } else {
                request.search = Some(encoded);
            }
        }
        self.potion.fetch(&self.uri, request, true).await
    }
}
