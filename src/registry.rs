//! # URI Registry
//!
//! Maps resource path prefixes (`/user`, `/foo_bar`) to the [`ResourceType`]
//! registered for them, and turns URIs into `(resource, id, normalized uri)`.
//!
//! Prefix matching is done on `/` boundaries, so `/foo_bar/1` never matches a
//! resource registered at `/foo`. When several prefixes match (`/user` and
//! `/user/admin`), the longest one wins.
//!
//! Per-type metadata (readonly and async property names) lives in the
//! registration record itself rather than on any Rust type.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display};
use std::sync::Arc;

use tracing::debug;

use crate::error::{PotionError, Result};

/// Identifier of an entity, parsed from the last URI segment or from `$id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    /// Parses a URI segment: all-digit segments become integers.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(n) if !segment.starts_with('+') => EntityId::Int(n),
            _ => EntityId::Str(segment.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            EntityId::Int(n) => Some(*n),
            EntityId::Str(_) => None,
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(n) => write!(f, "{n}"),
            EntityId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Int(n)
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        EntityId::Int(i64::from(n))
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        EntityId::Int(i64::from(n))
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::parse(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::parse(&s)
    }
}

/// Options given at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Properties never sent back to the server.
    pub readonly: BTreeSet<String>,
    /// Properties resolved lazily instead of eagerly.
    pub async_properties: BTreeSet<String>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readonly<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.readonly.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn lazy<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.async_properties
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// A registered resource blueprint, identified by its URI prefix.
#[derive(Debug, PartialEq, Eq)]
pub struct ResourceType {
    prefix: String,
    options: ResourceOptions,
}

impl ResourceType {
    /// The URI prefix, e.g. `/user`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resource name as used in `$type`, i.e. the prefix without its slash.
    pub fn name(&self) -> &str {
        self.prefix.trim_start_matches('/')
    }

    pub fn is_readonly(&self, property: &str) -> bool {
        self.options.readonly.contains(property)
    }

    pub fn is_async(&self, property: &str) -> bool {
        self.options.async_properties.contains(property)
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    /// URI of the instance with the given id.
    pub fn uri_for(&self, id: &EntityId) -> String {
        format!("{}/{}", self.prefix, id)
    }
}

/// Static description of a resource, the typed way to register one.
///
/// ```
/// use potion::Resource;
///
/// struct User;
///
/// impl Resource for User {
///     const PREFIX: &'static str = "/user";
///
///     fn readonly() -> &'static [&'static str] {
///         &["createdAt"]
///     }
/// }
/// ```
pub trait Resource: Send + Sync + 'static {
    /// URI prefix of the collection.
    const PREFIX: &'static str;

    /// Properties excluded from write payloads.
    fn readonly() -> &'static [&'static str] {
        &[]
    }

    /// Properties resolved lazily.
    fn async_properties() -> &'static [&'static str] {
        &[]
    }

    fn options() -> ResourceOptions {
        ResourceOptions::new()
            .readonly(Self::readonly().iter().copied())
            .lazy(Self::async_properties().iter().copied())
    }
}

/// Outcome of resolving a URI against the registry.
#[derive(Debug, Clone)]
pub struct ResolvedUri {
    pub resource: Arc<ResourceType>,
    /// `None` when the URI names the collection itself.
    pub id: Option<EntityId>,
    /// The URI without the global prefix.
    pub uri: String,
}

/// Prefix → resource type table owned by one client.
#[derive(Debug, Default)]
pub struct Registry {
    resources: HashMap<String, Arc<ResourceType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `prefix`, replacing any earlier registration of the same prefix.
    pub fn register(
        &mut self,
        prefix: &str,
        options: ResourceOptions,
    ) -> Result<Arc<ResourceType>> {
        validate_prefix(prefix)?;
        let resource = Arc::new(ResourceType {
            prefix: prefix.to_string(),
            options,
        });
        if self
            .resources
            .insert(prefix.to_string(), resource.clone())
            .is_some()
        {
            debug!(prefix, "Replaced resource registration");
        } else {
            debug!(prefix, "Registered resource");
        }
        Ok(resource)
    }

    /// Looks up the resource registered at exactly `prefix`.
    pub fn get(&self, prefix: &str) -> Option<Arc<ResourceType>> {
        self.resources.get(prefix).cloned()
    }

    /// Resolves an already prefix-stripped URI.
    pub fn resolve(&self, uri: &str) -> Result<ResolvedUri> {
        let best = self
            .resources
            .values()
            .filter(|r| matches_prefix(uri, &r.prefix))
            .max_by_key(|r| r.prefix.len())
            .ok_or_else(|| PotionError::UnknownResource {
                uri: uri.to_string(),
            })?;

        let rest = &uri[best.prefix.len()..];
        let id = rest
            .strip_prefix('/')
            .and_then(|tail| tail.split('/').next())
            .filter(|segment| !segment.is_empty())
            .map(EntityId::parse);

        Ok(ResolvedUri {
            resource: best.clone(),
            id,
            uri: uri.to_string(),
        })
    }

    /// Resolves a `$type`/`$id` pair by synthesizing `/{type}/{id}`.
    pub fn resolve_type_and_id(&self, type_name: &str, id: &EntityId) -> Result<ResolvedUri> {
        self.resolve(&format!("/{}/{}", type_name.trim_start_matches('/'), id))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn matches_prefix(uri: &str, prefix: &str) -> bool {
    match uri.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    let reason = if prefix.len() < 2 {
        Some("prefix must name a path below the root")
    } else if !prefix.starts_with('/') {
        Some("prefix must start with '/'")
    } else if prefix.ends_with('/') {
        Some("prefix must not end with '/'")
    } else if prefix.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
        Some("prefix contains characters not allowed in a path")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PotionError::Registration {
            prefix: prefix.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("/foo", ResourceOptions::new()).unwrap();
        registry.register("/foo_bar", ResourceOptions::new()).unwrap();
        registry.register("/user", ResourceOptions::new()).unwrap();
        registry
    }

    #[test]
    fn test_resolve_by_boundary() {
        let registry = registry();

        let resolved = registry.resolve("/foo_bar/1").unwrap();
        assert_eq!(resolved.resource.prefix(), "/foo_bar");
        assert_eq!(resolved.id, Some(EntityId::Int(1)));

        let resolved = registry.resolve("/foo/1").unwrap();
        assert_eq!(resolved.resource.prefix(), "/foo");
    }

    #[test]
    fn test_resolve_collection_and_string_ids() {
        let registry = registry();

        let resolved = registry.resolve("/user").unwrap();
        assert_eq!(resolved.id, None);

        let resolved = registry.resolve("/user/abc").unwrap();
        assert_eq!(resolved.id, Some(EntityId::Str("abc".into())));
        assert_eq!(resolved.uri, "/user/abc");
    }

    #[test]
    fn test_unknown_resource() {
        let registry = registry();
        let err = registry.resolve("/fooz/1").unwrap_err();
        assert!(matches!(err, PotionError::UnknownResource { uri } if uri == "/fooz/1"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut registry = registry();
        registry.register("/user/admin", ResourceOptions::new()).unwrap();

        let resolved = registry.resolve("/user/admin/7").unwrap();
        assert_eq!(resolved.resource.prefix(), "/user/admin");
        assert_eq!(resolved.id, Some(EntityId::Int(7)));
    }

    #[test]
    fn test_type_and_id() {
        let registry = registry();
        let resolved = registry
            .resolve_type_and_id("foo_bar", &EntityId::Int(3))
            .unwrap();
        assert_eq!(resolved.uri, "/foo_bar/3");
        assert_eq!(resolved.resource.name(), "foo_bar");
    }

    #[test]
    fn test_invalid_registrations() {
        let mut registry = Registry::new();
        for prefix in ["", "/", "user", "/user/", "/us er"] {
            let err = registry.register(prefix, ResourceOptions::new()).unwrap_err();
            assert!(matches!(err, PotionError::Registration { .. }), "{prefix}");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = Registry::new();
        registry.register("/user", ResourceOptions::new()).unwrap();
        registry
            .register("/user", ResourceOptions::new().readonly(["createdAt"]))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("/user").unwrap().is_readonly("createdAt"));
    }

    #[test]
    fn test_entity_id_parsing() {
        assert_eq!(EntityId::parse("42"), EntityId::Int(42));
        assert_eq!(EntityId::parse("-1"), EntityId::Int(-1));
        assert_eq!(EntityId::parse("+1"), EntityId::Str("+1".into()));
        assert_eq!(EntityId::parse("x1"), EntityId::Str("x1".into()));
        assert_eq!(EntityId::Int(5).to_string(), "5");
    }
}
