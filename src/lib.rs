//! # Potion
//!
//! > **A client-side object mapper for hypermedia JSON APIs.**
//!
//! Potion-style APIs describe resources with a small set of markers embedded in
//! ordinary JSON:
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | `{"$uri": "/user/1", ...}` | a resource instance and its properties |
//! | `{"$type": "user", "$id": 1, ...}` | the same, identified by type and id |
//! | `{"$ref": "/user/1"}` | a reference to a resource instance |
//! | `{"$ref": "#"}` | a reference to the enclosing resource |
//! | `{"$date": 1451060269000}` | a timestamp in epoch milliseconds |
//! | `{"$schema": ...}` | a schema block, passed through |
//!
//! This crate turns such payloads into a graph of live [`Entity`] handles with
//! identity preserved (one instance per URI, per client) and cycles allowed,
//! and turns them back into Potion JSON for writes.
//!
//! ## Core concepts
//!
//! ### The client ([`Potion`])
//! Owns the resource [`registry`], the entity [`cache`] and the [`Transport`]
//! that talks HTTP. Every fetch goes through one pipeline: normalize the URI,
//! consult the cache, send, resolve.
//!
//! ### Resources and stores
//! A resource type is registered under a URI prefix, optionally with readonly
//! and lazily resolved properties. A [`Store`] gives it CRUD operations;
//! [`Route`]s reach custom endpoints.
//!
//! ### Resolution ([`resolve`])
//! Payloads are resolved in two passes. Resources are first registered in the
//! cache in document order, then references are substituted. A resource that
//! refers back to itself, or to any resource of the same payload, ends up
//! pointing at the very same [`Entity`].
//!
//! ## Quick start
//!
//! ```ignore
//! use potion::{FetchOptions, Potion, ResourceOptions};
//!
//! let potion = Potion::new(my_transport);
//! potion.register("/user", ResourceOptions::new().readonly(["createdAt"]))?;
//!
//! let users = potion.store("/user")?;
//! let user = users.fetch(1, FetchOptions::default()).await?;
//! println!("{:?}", user.get("name"));
//! ```
//!
//! ## Testing
//!
//! See the [`mock`] module for a scripted transport.

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod lazy;
pub mod mock;
pub mod naming;
pub mod pagination;
pub mod potion;
pub mod registry;
pub mod resolve;
pub mod route;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod value;
pub mod wire;

pub use cache::EntityCache;
pub use config::PotionConfig;
pub use entity::Entity;
pub use error::{PotionError, Result, TransportError};
pub use lazy::LazyValue;
pub use naming::{to_camel_case, to_snake_case};
pub use pagination::{Pagination, Query};
pub use potion::Potion;
pub use registry::{EntityId, Resource, ResourceOptions, ResourceType};
pub use route::Route;
pub use store::{FetchOptions, Store};
pub use transport::{Headers, Method, Request, Response, Transport};
pub use value::{Properties, Value};
pub use wire::WireEncoder;
