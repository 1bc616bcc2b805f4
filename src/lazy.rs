//! # Lazy Values
//!
//! Properties declared async on a resource type are not resolved while the
//! surrounding payload is. They hold a [`LazyValue`]: a getter that runs on the
//! first [`LazyValue::get`] and whose future is memoized, so every later read
//! shares the same (possibly still pending) result.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, OnceLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::entity::Entity;
use crate::error::{PotionError, Result};
use crate::value::Value;

/// Entities of a resolved payload, indexed by URI.
pub(crate) type Roots = Arc<HashMap<String, Entity>>;

/// The memoized future behind a lazy value.
pub type SharedValue = Shared<BoxFuture<'static, Result<Value>>>;

type Getter = Box<dyn FnOnce(Roots) -> BoxFuture<'static, Result<Value>> + Send>;

/// A property value resolved on demand.
#[derive(Clone)]
pub struct LazyValue(Arc<LazyInner>);

struct LazyInner {
    reference: Option<String>,
    roots: OnceLock<Roots>,
    getter: Mutex<Option<Getter>>,
    future: OnceLock<SharedValue>,
}

impl LazyValue {
    /// `reference` is the URI the value points at, when it came from a `$ref`.
    pub(crate) fn new<F>(reference: Option<String>, getter: F) -> Self
    where
        F: FnOnce(Roots) -> BoxFuture<'static, Result<Value>> + Send + 'static,
    {
        Self(Arc::new(LazyInner {
            reference,
            roots: OnceLock::new(),
            getter: Mutex::new(Some(Box::new(getter))),
            future: OnceLock::new(),
        }))
    }

    /// Makes the enclosing payload's entities available to the getter.
    pub(crate) fn attach_roots(&self, roots: Roots) {
        let _ = self.0.roots.set(roots);
    }

    /// Starts the getter on first use and returns the shared future.
    pub fn get(&self) -> SharedValue {
        self.0
            .future
            .get_or_init(|| {
                let roots = self.0.roots.get().cloned().unwrap_or_default();
                match self.0.getter.lock().take() {
                    Some(getter) => getter(roots).shared(),
                    None => {
                        let reference = self.0.reference.clone().unwrap_or_default();
                        futures::future::ready(Err(PotionError::UnresolvedReference { reference }))
                            .boxed()
                            .shared()
                    }
                }
            })
            .clone()
    }

    /// Resolves the value.
    pub async fn load(&self) -> Result<Value> {
        self.get().await
    }

    pub fn is_started(&self) -> bool {
        self.0.future.get().is_some()
    }

    /// The outcome, if the getter already ran to completion.
    pub fn peek(&self) -> Option<Result<Value>> {
        self.0.future.get().and_then(|f| f.peek().cloned())
    }

    /// URI this value refers to, when it came from a `$ref`.
    pub fn reference(&self) -> Option<&str> {
        self.0.reference.as_deref()
    }

    pub fn ptr_eq(a: &LazyValue, b: &LazyValue) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        LazyValue::ptr_eq(self, other)
    }
}

impl Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyValue")
            .field("reference", &self.0.reference)
            .field("started", &self.is_started())
            .finish()
    }
}
