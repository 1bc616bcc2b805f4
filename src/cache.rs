//! # Entity Cache
//!
//! Keyed by normalized URI. The cache holds two kinds of entries:
//!
//! - **resolved** entities, registered by the resolver the moment it first sees
//!   a URI (before the entity's properties are resolved), and
//! - **pending** fetches: shared futures for requests that are still in flight.
//!
//! While a fetch for a key is pending, every caller asking for that key gets
//! the same future, so at most one request per URI is outstanding. A settled
//! fetch removes its pending entry; on failure nothing else is kept, so the
//! next call issues a fresh request.
//!
//! If the transport never completes, the pending entry stays pending. The
//! client defines no timeouts of its own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::entity::Entity;
use crate::error::Result;
use crate::value::Value;

/// Shared handle to an in-flight (or settled) fetch.
pub type PendingFetch = Shared<BoxFuture<'static, Result<Value>>>;

#[derive(Default)]
struct Entries {
    resolved: HashMap<String, Entity>,
    pending: HashMap<String, PendingFetch>,
}

/// Per-client entity cache.
#[derive(Clone, Default)]
pub struct EntityCache {
    entries: Arc<Mutex<Entries>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `key` is resolved or being fetched.
    pub fn has(&self, key: &str) -> bool {
        let entries = self.entries.lock();
        entries.resolved.contains_key(key) || entries.pending.contains_key(key)
    }

    /// The cached value for `key`: the resolved entity if there is one,
    /// otherwise the pending fetch.
    pub fn get(&self, key: &str) -> Option<PendingFetch> {
        let entries = self.entries.lock();
        if let Some(entity) = entries.resolved.get(key) {
            let value = Value::Entity(entity.clone());
            return Some(futures::future::ready(Ok(value)).boxed().shared());
        }
        entries.pending.get(key).cloned()
    }

    /// Stores `fetch` as the pending entry for `key`, replacing any prior one,
    /// and returns the shared future.
    ///
    /// When the fetch settles its pending entry is dropped; a resolved entity
    /// is kept under `key`.
    pub fn put<F>(&self, key: &str, fetch: F) -> PendingFetch
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        let cache = self.clone();
        let owned_key = key.to_string();
        let shared = async move {
            let outcome = fetch.await;
            cache.settle(&owned_key, &outcome);
            outcome
        }
        .boxed()
        .shared();

        self.entries
            .lock()
            .pending
            .insert(key.to_string(), shared.clone());
        shared
    }

    /// Joins the pending fetch for `key`, or starts one with `fetch`.
    pub fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> PendingFetch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        if let Some(pending) = self.entries.lock().pending.get(key).cloned() {
            trace!(key, "Joining pending fetch");
            return pending;
        }
        self.put(key, fetch())
    }

    /// Forgets `key` entirely.
    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        let removed = entries.resolved.remove(key).is_some();
        entries.pending.remove(key);
        debug!(key, removed, "Cache remove");
    }

    /// The resolved entity for `key`, without waiting on pending fetches.
    pub fn entity(&self, key: &str) -> Option<Entity> {
        self.entries.lock().resolved.get(key).cloned()
    }

    /// Registers a resolved entity.
    pub fn insert(&self, key: &str, entity: Entity) {
        self.entries
            .lock()
            .resolved
            .insert(key.to_string(), entity);
    }

    /// Returns the resolved entity for `key`, creating and registering one first
    /// if there is none.
    pub(crate) fn entity_or_insert_with(
        &self,
        key: &str,
        create: impl FnOnce() -> Entity,
    ) -> Entity {
        self.entries
            .lock()
            .resolved
            .entry(key.to_string())
            .or_insert_with(create)
            .clone()
    }

    /// Drops `entity` from the resolved entries, if it is still the one
    /// registered under its URI.
    pub(crate) fn discard(&self, entity: &Entity) {
        let mut entries = self.entries.lock();
        if entries
            .resolved
            .get(entity.uri())
            .is_some_and(|cached| Entity::ptr_eq(cached, entity))
        {
            entries.resolved.remove(entity.uri());
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.entries.lock().pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().resolved.is_empty()
    }

    /// Drops every resolved entity. In-flight fetches are left alone.
    pub fn clear(&self) {
        self.entries.lock().resolved.clear();
    }

    fn settle(&self, key: &str, outcome: &Result<Value>) {
        let mut entries = self.entries.lock();
        entries.pending.remove(key);
        match outcome {
            Ok(Value::Entity(entity)) => {
                entries.resolved.insert(key.to_string(), entity.clone());
            }
            Ok(_) => {}
            Err(e) => debug!(key, error = %e, "Fetch failed, cleared pending entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PotionError;
    use crate::registry::{EntityId, Registry, ResourceOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entity(id: i64) -> Entity {
        let mut registry = Registry::new();
        let resource = registry.register("/user", ResourceOptions::new()).unwrap();
        Entity::new(resource, format!("/user/{id}"), EntityId::Int(id))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = EntityCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let user = entity(1);

        let start = |calls: Arc<AtomicUsize>, user: Entity| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(Value::Entity(user))
            }
        };

        let first = cache.get_or_fetch("/user/1", start(calls.clone(), user.clone()));
        let second = cache.get_or_fetch("/user/1", start(calls.clone(), user.clone()));
        assert!(cache.is_pending("/user/1"));

        let (a, b) = futures::join!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());

        // Settled: no longer pending, entity kept.
        assert!(!cache.is_pending("/user/1"));
        assert_eq!(cache.entity("/user/1"), Some(user));
    }

    #[tokio::test]
    async fn test_failure_clears_pending_entry() {
        let cache = EntityCache::new();
        let failed = cache.put("/user/1", async {
            Err(PotionError::InvalidPayload("boom".into()))
        });

        assert!(failed.await.is_err());
        assert!(!cache.has("/user/1"));

        let retried = cache.get_or_fetch("/user/1", || async { Ok(Value::Entity(entity(1))) });
        assert!(retried.await.is_ok());
        assert!(cache.has("/user/1"));
    }

    #[tokio::test]
    async fn test_get_prefers_resolved_entity() {
        let cache = EntityCache::new();
        let user = entity(2);
        cache.insert("/user/2", user.clone());

        let value = cache.get("/user/2").unwrap().await.unwrap();
        assert_eq!(value.into_entity(), Some(user));

        cache.remove("/user/2");
        assert!(cache.get("/user/2").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_discard_only_drops_the_same_instance() {
        let cache = EntityCache::new();
        let stale = entity(4);
        cache.insert("/user/4", stale.clone());
        let current = entity(4);
        cache.insert("/user/4", current.clone());

        cache.discard(&stale);
        assert_eq!(cache.entity("/user/4"), Some(current.clone()));

        cache.discard(&current);
        assert!(!cache.has("/user/4"));
    }

    #[test]
    fn test_entity_or_insert_with_is_stable() {
        let cache = EntityCache::new();
        let first = cache.entity_or_insert_with("/user/3", || entity(3));
        let second = cache.entity_or_insert_with("/user/3", || entity(3));
        assert!(Entity::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
