//! # Reference Resolution
//!
//! Turns a Potion JSON payload into live [`Value`]s.
//!
//! ## Phases
//!
//! 1. **Registration.** A synchronous depth-first pre-order walk opens every
//!    resource object of the payload: its URI is resolved through the registry,
//!    recorded in the origin set, and an (empty, or already cached) [`Entity`]
//!    is put into the cache. Nothing async happens before this walk finishes,
//!    so any reference inside the payload to one of its own resources finds
//!    that resource already registered. This is what makes cyclic graphs
//!    terminate.
//! 2. **Construction.** The payload is walked again asynchronously into a
//!    [`Node`] tree. `$ref`s to URIs of the origin set (and `{"$ref": "#"}`)
//!    become self-reference placeholders; other `$ref`s are looked up in the
//!    cache or fetched. Async-declared properties become [`LazyValue`]s.
//! 3. **Substitution.** The finished tree is indexed by URI (the roots), then
//!    materialized: placeholders are replaced by the indexed entities, lazy
//!    values receive the roots for their own later resolution, and every
//!    resource node's properties are merged onto its entity.
//!
//! If any phase fails, the entities that phase 1 newly put into the cache are
//! taken out again. Entities that were cached before are left in place.
//!
//! Payload objects are classified once into a [`Shape`] before dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::{Map, Value as Json};
use tracing::trace;

use crate::entity::Entity;
use crate::error::{PotionError, Result};
use crate::lazy::{LazyValue, Roots};
use crate::naming::key_from_wire;
use crate::registry::{EntityId, ResolvedUri, ResourceType};
use crate::value::{Properties, Value};
use crate::Potion;

const URI: &str = "$uri";
const TYPE: &str = "$type";
const ID: &str = "$id";
const REF: &str = "$ref";
const DATE: &str = "$date";
const SCHEMA: &str = "$schema";
const SELF_REF: &str = "#";

/// What a payload value is, decided by its markers.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape<'a> {
    Array(&'a [Json]),
    /// Has `$uri`, or both `$type` and `$id`.
    Resource(&'a Map<String, Json>),
    /// Has `$schema`.
    Schema,
    /// Exactly one key, `$ref`.
    Reference(&'a str),
    /// Exactly one key, `$date`.
    Date(&'a Json),
    Object(&'a Map<String, Json>),
    Primitive,
}

fn classify(json: &Json) -> Shape<'_> {
    match json {
        Json::Array(items) => Shape::Array(items),
        Json::Object(map) if is_resource(map) => Shape::Resource(map),
        Json::Object(map) if map.contains_key(SCHEMA) => Shape::Schema,
        Json::Object(map) if map.len() == 1 => match map.iter().next() {
            Some((key, Json::String(reference))) if key == REF => Shape::Reference(reference),
            Some((key, millis)) if key == DATE => Shape::Date(millis),
            _ => Shape::Object(map),
        },
        Json::Object(map) => Shape::Object(map),
        _ => Shape::Primitive,
    }
}

fn is_resource(map: &Map<String, Json>) -> bool {
    matches!(map.get(URI), Some(Json::String(_)))
        || (matches!(map.get(TYPE), Some(Json::String(_)))
            && map.get(ID).is_some_and(|id| !id.is_null()))
}

fn is_identity_key(key: &str) -> bool {
    matches!(key, URI | TYPE | ID)
}

/// Where in the payload a value sits.
#[derive(Debug, Clone, Default)]
struct Context {
    /// Resource type of the object this value is a direct property of.
    owner: Option<Arc<ResourceType>>,
    /// In-memory property name under `owner`.
    key: Option<String>,
    /// URI of the nearest enclosing resource object.
    enclosing: Option<String>,
}

impl Context {
    fn enclosed(enclosing: Option<String>) -> Self {
        Self {
            owner: None,
            key: None,
            enclosing,
        }
    }

    fn resource(resource: Arc<ResourceType>, uri: String) -> Self {
        Self {
            owner: Some(resource),
            key: None,
            enclosing: Some(uri),
        }
    }

    /// Context for a value that is not a direct resource property.
    fn nested(&self) -> Self {
        Self::enclosed(self.enclosing.clone())
    }

    fn property(&self, key: String) -> Self {
        Self {
            owner: self.owner.clone(),
            key: Some(key),
            enclosing: self.enclosing.clone(),
        }
    }

    fn is_async(&self) -> bool {
        match (&self.owner, &self.key) {
            (Some(owner), Some(key)) => owner.is_async(key),
            _ => false,
        }
    }
}

/// Intermediate graph, with placeholders still in it.
enum Node {
    Value(Value),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
    Resource {
        entity: Entity,
        properties: Vec<(String, Node)>,
    },
    SelfRef(String),
    Lazy(LazyValue),
}

impl Node {
    fn collect_roots(&self, roots: &mut HashMap<String, Entity>) {
        match self {
            Node::Resource { entity, properties } => {
                roots
                    .entry(entity.uri().to_string())
                    .or_insert_with(|| entity.clone());
                for (_, node) in properties {
                    node.collect_roots(roots);
                }
            }
            Node::Array(items) => items.iter().for_each(|node| node.collect_roots(roots)),
            Node::Object(properties) => properties
                .iter()
                .for_each(|(_, node)| node.collect_roots(roots)),
            Node::Value(_) | Node::SelfRef(_) | Node::Lazy(_) => {}
        }
    }

    fn materialize(self, roots: &Roots) -> Result<Value> {
        match self {
            Node::Value(value) => Ok(value),
            Node::Array(items) => items
                .into_iter()
                .map(|node| node.materialize(roots))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Node::Object(properties) => materialize_properties(properties, roots).map(Value::Object),
            Node::Resource { entity, properties } => {
                let properties = materialize_properties(properties, roots)?;
                entity.merge(properties);
                Ok(Value::Entity(entity))
            }
            Node::SelfRef(uri) => roots
                .get(&uri)
                .cloned()
                .map(Value::Entity)
                .ok_or(PotionError::UnresolvedReference { reference: uri }),
            Node::Lazy(lazy) => {
                lazy.attach_roots(roots.clone());
                Ok(Value::Lazy(lazy))
            }
        }
    }
}

fn materialize_properties(properties: Vec<(String, Node)>, roots: &Roots) -> Result<Properties> {
    properties
        .into_iter()
        .map(|(key, node)| Ok((key, node.materialize(roots)?)))
        .collect()
}

/// One top-level resolution.
pub(crate) struct Resolver {
    potion: Potion,
    /// URIs opened in this resolution.
    origin: Mutex<HashSet<String>>,
    /// Entities of an enclosing payload, for lazily resolved properties.
    seed: Roots,
    /// Entities this resolution added to the cache.
    created: Mutex<Vec<Entity>>,
}

impl Resolver {
    pub(crate) fn new(potion: Potion) -> Self {
        Self::seeded(potion, Roots::default())
    }

    fn seeded(potion: Potion, seed: Roots) -> Self {
        Self {
            potion,
            origin: Mutex::new(seed.keys().cloned().collect()),
            seed,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Resolves a whole payload.
    pub(crate) async fn resolve(&self, json: &Json) -> Result<Value> {
        self.run(json, Context::default()).await
    }

    async fn run(&self, json: &Json, ctx: Context) -> Result<Value> {
        let outcome = self.build(json, ctx).await;
        if outcome.is_err() {
            self.discard_created();
        }
        outcome
    }

    async fn build(&self, json: &Json, ctx: Context) -> Result<Value> {
        self.register(json, &ctx)?;
        let node = self.node(json, ctx).await?;

        let mut roots = (*self.seed).clone();
        node.collect_roots(&mut roots);
        let roots: Roots = Arc::new(roots);
        trace!(roots = roots.len(), "Substituting references");
        node.materialize(&roots)
    }

    /// Drops the entities registered by a failed resolution, so a retry
    /// fetches them again instead of finding empty placeholders.
    fn discard_created(&self) {
        let created = std::mem::take(&mut *self.created.lock());
        for entity in created {
            trace!(uri = %entity.uri(), "Discarding placeholder");
            self.potion.cache().discard(&entity);
        }
    }

    // -------------------------------------------------------------------------
    // Phase 1: registration
    // -------------------------------------------------------------------------

    fn register(&self, json: &Json, ctx: &Context) -> Result<()> {
        match classify(json) {
            Shape::Array(_) if ctx.is_async() => Ok(()),
            Shape::Array(items) => {
                let nested = ctx.nested();
                items.iter().try_for_each(|item| self.register(item, &nested))
            }
            Shape::Resource(map) => {
                let (_, resource, uri) = self.open(map)?;
                let child = Context::resource(resource, uri);
                map.iter()
                    .filter(|(key, _)| !is_identity_key(key))
                    .try_for_each(|(key, value)| {
                        self.register(value, &child.property(key_from_wire(key)))
                    })
            }
            Shape::Object(map) => {
                let nested = ctx.nested();
                map.values().try_for_each(|value| self.register(value, &nested))
            }
            Shape::Schema | Shape::Reference(_) | Shape::Date(_) | Shape::Primitive => Ok(()),
        }
    }

    /// Resolves a resource object's identity and returns its (cached) entity.
    fn open(&self, map: &Map<String, Json>) -> Result<(Entity, Arc<ResourceType>, String)> {
        let ResolvedUri { resource, id, uri } = self.identify(map)?;
        let id = id.ok_or_else(|| {
            PotionError::InvalidPayload(format!("resource object {uri} has no id"))
        })?;

        self.origin.lock().insert(uri.clone());
        let mut created = false;
        let entity = self.potion.cache().entity_or_insert_with(&uri, || {
            trace!(%uri, "Registering new entity");
            created = true;
            Entity::new(resource.clone(), uri.clone(), id)
        });
        if created {
            self.created.lock().push(entity.clone());
        }
        Ok((entity, resource, uri))
    }

    fn identify(&self, map: &Map<String, Json>) -> Result<ResolvedUri> {
        if let Some(Json::String(uri)) = map.get(URI) {
            return self.potion.resolve_uri(uri);
        }

        let type_name = map.get(TYPE).and_then(Json::as_str).unwrap_or_default();
        let id = match map.get(ID) {
            Some(Json::String(id)) => EntityId::parse(id),
            Some(Json::Number(id)) => EntityId::parse(&id.to_string()),
            other => {
                return Err(PotionError::InvalidPayload(format!(
                    "unsupported $id {other:?} for type {type_name:?}"
                )))
            }
        };
        self.potion.resolve_type_and_id(type_name, &id)
    }

    // -------------------------------------------------------------------------
    // Phase 2: construction
    // -------------------------------------------------------------------------

    fn node<'a>(&'a self, json: &'a Json, ctx: Context) -> BoxFuture<'a, Result<Node>> {
        Box::pin(async move {
            match classify(json) {
                Shape::Array(_) if ctx.is_async() => Ok(Node::Lazy(self.lazy_array(json, &ctx))),
                Shape::Array(items) => {
                    let nested = ctx.nested();
                    let nodes = try_join_all(items.iter().map(|item| self.node(item, nested.clone())))
                        .await?;
                    Ok(Node::Array(nodes))
                }
                Shape::Resource(map) => {
                    let (entity, resource, uri) = self.open(map)?;
                    let child = Context::resource(resource, uri);
                    let fields = map.iter().filter(|(key, _)| !is_identity_key(key));
                    let properties = self.properties(fields, &child).await?;
                    Ok(Node::Resource { entity, properties })
                }
                Shape::Schema => Ok(Node::Value(Value::Schema(schema_from_wire(json)))),
                Shape::Reference(reference) => self.reference(reference, &ctx).await,
                Shape::Date(millis) => date(millis).map(Node::Value),
                Shape::Object(map) => {
                    let properties = self.properties(map.iter(), &ctx.nested()).await?;
                    Ok(Node::Object(properties))
                }
                Shape::Primitive => Ok(Node::Value(Value::from(json.clone()))),
            }
        })
    }

    async fn properties<'a, I>(&'a self, fields: I, ctx: &Context) -> Result<Vec<(String, Node)>>
    where
        I: Iterator<Item = (&'a String, &'a Json)>,
    {
        let pending = fields.map(|(key, value)| {
            let key = key_from_wire(key);
            let node = self.node(value, ctx.property(key.clone()));
            async move { Ok::<_, PotionError>((key, node.await?)) }
        });
        try_join_all(pending).await
    }

    async fn reference(&self, reference: &str, ctx: &Context) -> Result<Node> {
        if reference == SELF_REF {
            return ctx
                .enclosing
                .clone()
                .map(Node::SelfRef)
                .ok_or_else(|| PotionError::UnresolvedReference {
                    reference: SELF_REF.to_string(),
                });
        }

        let uri = self.potion.resolve_uri(reference)?.uri;
        if self.origin.lock().contains(&uri) {
            trace!(%uri, "Back-reference");
            return Ok(Node::SelfRef(uri));
        }

        if ctx.is_async() {
            let potion = self.potion.clone();
            let target = uri.clone();
            let lazy = LazyValue::new(Some(uri), move |_| {
                async move { potion.get(&target).await }.boxed()
            });
            return Ok(Node::Lazy(lazy));
        }

        self.potion.get(&uri).await.map(Node::Value)
    }

    fn lazy_array(&self, json: &Json, ctx: &Context) -> LazyValue {
        let potion = self.potion.clone();
        let json = json.clone();
        let enclosing = ctx.enclosing.clone();
        LazyValue::new(None, move |roots| {
            async move {
                Resolver::seeded(potion, roots)
                    .run(&json, Context::enclosed(enclosing))
                    .await
            }
            .boxed()
        })
    }
}

fn date(millis: &Json) -> Result<Value> {
    let invalid = || PotionError::InvalidPayload(format!("invalid $date {millis}"));
    let millis = millis
        .as_i64()
        .or_else(|| millis.as_f64().map(|f| f as i64))
        .ok_or_else(invalid)?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(Value::Date)
        .ok_or_else(invalid)
}

/// Camel-cases the keys of a schema block and leaves everything else alone.
fn schema_from_wire(json: &Json) -> Json {
    match json {
        Json::Array(items) => Json::Array(items.iter().map(schema_from_wire).collect()),
        Json::Object(map) => Json::Object(
            map.iter()
                .map(|(key, value)| (key_from_wire(key), schema_from_wire(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}
