//! # Entities
//!
//! An [`Entity`] is a live instance of a registered resource type. Entities are
//! shared handles: every deserialization that mentions the same URI yields a
//! handle to the same instance, and re-fetching an entity updates that instance
//! in place instead of producing a new one. Equality is identity.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::registry::{EntityId, ResourceType};
use crate::value::{Properties, Value};

/// A deserialized resource instance with identity.
#[derive(Clone)]
pub struct Entity(Arc<EntityInner>);

struct EntityInner {
    resource: Arc<ResourceType>,
    uri: String,
    id: EntityId,
    properties: RwLock<Properties>,
}

impl Entity {
    /// Creates an empty instance. Properties are filled in by the resolver.
    pub(crate) fn new(resource: Arc<ResourceType>, uri: String, id: EntityId) -> Self {
        Self(Arc::new(EntityInner {
            resource,
            uri,
            id,
            properties: RwLock::new(Properties::new()),
        }))
    }

    pub fn id(&self) -> &EntityId {
        &self.0.id
    }

    /// Canonical URI, without the global API prefix.
    pub fn uri(&self) -> &str {
        &self.0.uri
    }

    pub fn resource(&self) -> &Arc<ResourceType> {
        &self.0.resource
    }

    /// Returns a property by its in-memory (camelCase) name.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.properties.read().get(key).cloned()
    }

    /// Sets a property locally. Nothing is sent to the server.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.properties.write().insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.properties.read().contains_key(key)
    }

    /// Snapshot of all properties in payload order.
    pub fn properties(&self) -> Properties {
        self.0.properties.read().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.properties.read().keys().cloned().collect()
    }

    /// Assigns `properties` onto this instance, keeping keys the payload did not mention.
    pub(crate) fn merge(&self, properties: Properties) {
        let mut current = self.0.properties.write();
        for (key, value) in properties {
            current.insert(key, value);
        }
    }

    /// True when both handles point at the same instance.
    pub fn ptr_eq(a: &Entity, b: &Entity) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Entity::ptr_eq(self, other)
    }
}

impl Eq for Entity {}

// Properties are left out: entity graphs may be cyclic.
impl Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("uri", &self.0.uri)
            .field("id", &self.0.id)
            .finish()
    }
}
