//! # Client
//!
//! [`Potion`] ties everything together: the resource registry, the entity
//! cache, the transport and the configuration. It is a cheap `Clone` handle;
//! stores, routes, lazy values and paginations all keep one.
//!
//! ## Fetch pipeline
//!
//! Every request the client makes goes through the same steps:
//!
//! 1. Normalize the URI (strip the global prefix) to get the cache key.
//! 2. For a plain GET (no query parameters, not paginated): return the cached
//!    entity when caching is on, and join any fetch already in flight.
//! 3. Otherwise send the request through the transport, with the prefix added.
//! 4. Resolve the response body (see [`crate::resolve`]).
//! 5. For paginated requests, wrap the resolved list in a [`Pagination`].

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as Json;
use tracing::{debug, info, instrument, warn};

use crate::cache::EntityCache;
use crate::config::PotionConfig;
use crate::error::{PotionError, Result};
use crate::pagination::{Pagination, Query};
use crate::registry::{EntityId, Registry, Resource, ResolvedUri, ResourceOptions, ResourceType};
use crate::resolve::Resolver;
use crate::store::Store;
use crate::transport::{Method, Request, Response, Transport};
use crate::value::Value;
use crate::wire::WireEncoder;

/// A Potion API client.
#[derive(Clone)]
pub struct Potion(Arc<PotionInner>);

struct PotionInner {
    config: PotionConfig,
    registry: RwLock<Registry>,
    cache: EntityCache,
    transport: Arc<dyn Transport>,
}

impl Potion {
    /// A client with the default configuration.
    pub fn new(transport: impl Transport) -> Self {
        Self::with_config(PotionConfig::default(), transport)
    }

    pub fn with_config(config: PotionConfig, transport: impl Transport) -> Self {
        info!(prefix = %config.prefix, per_page = config.per_page, "Potion client created");
        Self(Arc::new(PotionInner {
            config,
            registry: RwLock::new(Registry::new()),
            cache: EntityCache::new(),
            transport: Arc::new(transport),
        }))
    }

    pub fn config(&self) -> &PotionConfig {
        &self.0.config
    }

    pub fn cache(&self) -> &EntityCache {
        &self.0.cache
    }

    pub fn encoder(&self) -> WireEncoder<'_> {
        WireEncoder::new(&self.0.config)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a resource type under `prefix`.
    ///
    /// Registering the same prefix again replaces the earlier registration.
    pub fn register(&self, prefix: &str, options: ResourceOptions) -> Result<Arc<ResourceType>> {
        self.0.registry.write().register(prefix, options)
    }

    /// Registers `R` under its declared prefix.
    pub fn register_resource<R: Resource>(&self) -> Result<Arc<ResourceType>> {
        self.register(R::PREFIX, R::options())
    }

    /// The resource type registered at exactly `prefix`.
    pub fn resource(&self, prefix: &str) -> Option<Arc<ResourceType>> {
        self.0.registry.read().get(prefix)
    }

    /// The store for the resource registered at `prefix`.
    pub fn store(&self, prefix: &str) -> Result<Store> {
        self.resource(prefix)
            .map(|resource| Store::new(self.clone(), resource))
            .ok_or_else(|| PotionError::UnknownResource {
                uri: prefix.to_string(),
            })
    }

    pub fn store_for<R: Resource>(&self) -> Result<Store> {
        self.store(R::PREFIX)
    }

    /// Resolves a URI, with or without the global prefix.
    pub fn resolve_uri(&self, uri: &str) -> Result<ResolvedUri> {
        let normalized = self.0.config.normalize(uri);
        self.0.registry.read().resolve(normalized)
    }

    pub fn resolve_type_and_id(&self, type_name: &str, id: &EntityId) -> Result<ResolvedUri> {
        self.0.registry.read().resolve_type_and_id(type_name, id)
    }

    // =========================================================================
    // Resolution and fetching
    // =========================================================================

    /// Resolves a Potion JSON payload into live values.
    ///
    /// Resources in the payload are registered in the cache, so resolving the
    /// same URI twice yields the same [`Entity`](crate::Entity).
    pub async fn resolve(&self, json: &Json) -> Result<Value> {
        Resolver::new(self.clone()).resolve(json).await
    }

    /// GETs `uri`, served from the cache when possible.
    pub async fn get(&self, uri: &str) -> Result<Value> {
        self.fetch(uri, Request::get(), true).await
    }

    /// Drops every cached entity.
    pub fn clear_cache(&self) {
        self.0.cache.clear();
        info!("Cache cleared");
    }

    /// Runs `request` against `uri`.
    ///
    /// Plain GETs are deduplicated against in-flight fetches of the same key,
    /// and answered from the cache if `cache` is set.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub(crate) async fn fetch(&self, uri: &str, request: Request, cache: bool) -> Result<Value> {
        let key = self.0.config.normalize(uri).to_string();
        if request.method != Method::Get || request.search.is_some() {
            return self.request(&key, request).await;
        }

        if cache {
            if let Some(entity) = self.0.cache.entity(&key) {
                debug!(%key, "Cache hit");
                return Ok(Value::Entity(entity));
            }
        }

        let potion = self.clone();
        let target = key.clone();
        self.0
            .cache
            .get_or_fetch(&key, move || async move { potion.request(&target, request).await })
            .await
    }

    /// Sends `request` and resolves the response body, bypassing the cache.
    pub(crate) async fn request(&self, uri: &str, request: Request) -> Result<Value> {
        let response = self.send(uri, request).await?;
        self.resolve(&response.body).await
    }

    /// Paginated GET of `uri`.
    ///
    /// With a `target`, the existing pagination is updated in place and
    /// returned; otherwise a new one is created.
    #[instrument(skip(self, query, target), fields(page = query.page, per_page = query.per_page))]
    pub(crate) async fn fetch_page(
        &self,
        uri: &str,
        query: Query,
        target: Option<&Pagination>,
    ) -> Result<Pagination> {
        let key = self.0.config.normalize(uri).to_string();
        let query = query.with_defaults(self.0.config.per_page);

        let mut request = Request::get();
        request.search = query.to_search(&self.encoder());
        let response = self.send(&key, request).await?;

        let items = self
            .resolve(&response.body)
            .await?
            .into_array()
            .ok_or_else(|| {
                PotionError::InvalidPayload(format!("paginated response from {key} is not a list"))
            })?;
        let total = self.total_count(&response).unwrap_or(items.len());
        debug!(%key, items = items.len(), total, "Page loaded");

        match target {
            Some(pagination) => {
                pagination.update(query, items, total);
                Ok(pagination.clone())
            }
            None => Ok(Pagination::new(self.clone(), key, query, items, total)),
        }
    }

    fn total_count(&self, response: &Response) -> Option<usize> {
        response
            .headers
            .get(&self.0.config.total_count_header)
            .and_then(|count| count.trim().parse().ok())
    }

    async fn send(&self, uri: &str, request: Request) -> Result<Response> {
        let target = self.0.config.with_prefix(uri);
        debug!(
            uri = %target,
            method = %request.method,
            search = ?request.search,
            body = ?request.body,
            "Sending request"
        );
        self.0
            .transport
            .request(&target, request)
            .await
            .map_err(|e| {
                let err = PotionError::transport(&target, e);
                warn!(error = %err, "Request failed");
                err
            })
    }
}

impl std::fmt::Debug for Potion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Potion")
            .field("config", &self.0.config)
            .field("resources", &self.0.registry.read().len())
            .field("cached", &self.0.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_strips_and_adds_prefix() {
        let transport = MockTransport::new();
        transport
            .expect_get("/api/user/1")
            .return_ok(json!({"$uri": "/api/user/1", "name": "John"}));

        let potion = Potion::with_config(PotionConfig::default().prefix("/api"), transport.clone());
        potion.register("/user", ResourceOptions::new()).unwrap();

        let user = potion.get("/api/user/1").await.unwrap().into_entity().unwrap();
        assert_eq!(user.uri(), "/user/1");
        assert!(potion.cache().has("/user/1"));

        // Same entity, no request, with or without prefix.
        let again = potion.get("/user/1").await.unwrap();
        assert_eq!(again.as_entity(), Some(&user));
        transport.verify();
    }

    #[tokio::test]
    async fn test_transport_failure_message() {
        let transport = MockTransport::new();
        transport.expect_get("/user/1").return_err(404, "not found");
        transport.expect_get("/user/1").return_opaque_err();

        let potion = Potion::new(transport.clone());
        potion.register("/user", ResourceOptions::new()).unwrap();

        let err = potion.get("/user/1").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Transport error for /user/1: not found");

        let err = potion.get("/user/1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transport error for /user/1: request to /user/1 failed"
        );
        transport.verify();
    }

    #[test]
    fn test_store_requires_registration() {
        let potion = Potion::new(MockTransport::new());
        assert!(matches!(
            potion.store("/user"),
            Err(PotionError::UnknownResource { .. })
        ));
        potion.register("/user", ResourceOptions::new()).unwrap();
        assert_eq!(potion.store("/user").unwrap().resource().prefix(), "/user");
    }
}
