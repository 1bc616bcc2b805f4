//! # Stores
//!
//! A [`Store`] is the CRUD surface of one registered resource type. The
//! mapping to HTTP is fixed:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`fetch`](Store::fetch) | `GET {prefix}/{id}` (cached) |
//! | [`query`](Store::query) | `GET {prefix}?where=…&sort=…` (never cached) |
//! | [`paginate`](Store::paginate) | `GET {prefix}?page=…&per_page=…` |
//! | [`save`](Store::save) | `POST {prefix}` |
//! | [`update`](Store::update) | `PATCH {uri}` |
//! | [`destroy`](Store::destroy) | `DELETE {uri}` |
//!
//! Anything else the API exposes is reached through [`routes`](crate::route).

use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{debug, info, instrument};

use crate::entity::Entity;
use crate::error::{PotionError, Result};
use crate::pagination::{Pagination, Query};
use crate::registry::{EntityId, ResourceType};
use crate::route::Route;
use crate::transport::{Method, Request};
use crate::value::{Properties, Value};
use crate::Potion;

/// Options for [`Store::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Serve the entity from the cache when it is there.
    pub cache: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { cache: true }
    }
}

impl FetchOptions {
    /// Always go to the network. The response still updates the cache.
    pub fn no_cache() -> Self {
        Self { cache: false }
    }
}

/// CRUD operations for one resource type.
#[derive(Clone)]
pub struct Store {
    potion: Potion,
    resource: Arc<ResourceType>,
}

impl Store {
    pub fn new(potion: Potion, resource: Arc<ResourceType>) -> Self {
        Self { potion, resource }
    }

    pub fn resource(&self) -> &Arc<ResourceType> {
        &self.resource
    }

    pub fn potion(&self) -> &Potion {
        &self.potion
    }

    /// Fetches the instance with `id`.
    ///
    /// Concurrent fetches of the same instance share one request.
    pub async fn fetch(&self, id: impl Into<EntityId>, options: FetchOptions) -> Result<Entity> {
        let uri = self.resource.uri_for(&id.into());
        debug!(%uri, cache = options.cache, "Fetch");
        let value = self.potion.fetch(&uri, Request::get(), options.cache).await?;
        expect_entity(&uri, value)
    }

    /// Fetches the instance with `id`, bypassing the cache.
    pub async fn refresh(&self, id: impl Into<EntityId>) -> Result<Entity> {
        self.fetch(id, FetchOptions::no_cache()).await
    }

    /// Lists the collection.
    #[instrument(skip(self), fields(resource = %self.resource.prefix()))]
    pub async fn query(&self, query: Query) -> Result<Vec<Value>> {
        let mut request = Request::get();
        request.search = query.to_search(&self.potion.encoder());
        let value = self.potion.request(self.resource.prefix(), request).await?;
        match value {
            Value::Array(items) => Ok(items),
            other => Err(PotionError::InvalidPayload(format!(
                "query of {} returned {other:?}",
                self.resource.prefix()
            ))),
        }
    }

    /// Lists one page of the collection.
    pub async fn paginate(&self, query: Query) -> Result<Pagination> {
        self.potion
            .fetch_page(self.resource.prefix(), query, None)
            .await
    }

    /// Creates an instance from `data`.
    #[instrument(skip(self, data), fields(resource = %self.resource.prefix()))]
    pub async fn save(&self, data: Properties) -> Result<Entity> {
        let body = Json::Object(self.potion.encoder().encode_properties(&data));
        let entity = self.send(self.resource.prefix(), Method::Post, body).await?;
        info!(uri = %entity.uri(), "Created");
        Ok(entity)
    }

    /// Patches `entity` with `changes`; the response is merged into it.
    #[instrument(skip(self, changes), fields(uri = %entity.uri()))]
    pub async fn update(&self, entity: &Entity, changes: Properties) -> Result<Entity> {
        let body = Json::Object(self.potion.encoder().encode_properties(&changes));
        let updated = self.send(entity.uri(), Method::Patch, body).await?;
        info!("Updated");
        Ok(updated)
    }

    /// Sends the entity's own writable properties as a PATCH.
    pub async fn persist(&self, entity: &Entity) -> Result<Entity> {
        let body = self.potion.encoder().entity_payload(entity);
        self.send(entity.uri(), Method::Patch, body).await
    }

    /// Deletes `entity` and drops it from the cache.
    #[instrument(skip(self), fields(uri = %entity.uri()))]
    pub async fn destroy(&self, entity: &Entity) -> Result<()> {
        self.potion
            .request(entity.uri(), Request::new(Method::Delete))
            .await?;
        self.potion.cache().remove(entity.uri());
        info!("Deleted");
        Ok(())
    }

    /// A route on the collection, e.g. `/user/names`.
    pub fn route(&self, path: &str) -> Route {
        Route::new(self.potion.clone(), join(self.resource.prefix(), path))
    }

    /// A route on one instance, e.g. `/user/1/readStatus`.
    pub fn instance_route(&self, entity: &Entity, path: &str) -> Route {
        Route::new(self.potion.clone(), join(entity.uri(), path))
    }

    async fn send(&self, uri: &str, method: Method, body: Json) -> Result<Entity> {
        let mut request = Request::new(method);
        request.body = Some(body);
        let value = self.potion.request(uri, request).await?;
        expect_entity(uri, value)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("resource", &self.resource.prefix())
            .finish()
    }
}

fn expect_entity(uri: &str, value: Value) -> Result<Entity> {
    value.into_entity().ok_or_else(|| {
        PotionError::InvalidPayload(format!("response for {uri} is not a resource"))
    })
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base, path.trim_start_matches('/'))
}
