//! # Queries and Pagination
//!
//! A [`Query`] carries the parameters of a collection request. They go on the
//! wire as query-string keys: `page`, `per_page`, `where` (the filter) and
//! `sort`.
//!
//! A [`Pagination`] is one page of a collection plus what is needed to load
//! another one. The total item count comes from the response's total-count
//! header (`X-Total-Count` unless configured otherwise), falling back to the
//! number of items on the page.
//!
//! ```ignore
//! let page = store.paginate(Query::new().page(2).per_page(5)).await?;
//! assert_eq!(page.pages(), 3); // 12 items in total
//!
//! page.change_page_to(1).await?;
//! assert_eq!(page.page(), 1);
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value as Json};

use crate::error::Result;
use crate::value::Value;
use crate::wire::WireEncoder;
use crate::Potion;

/// Parameters of a collection request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Sent as `where`.
    pub filter: Option<Value>,
    pub sort: Option<Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn filter(mut self, filter: impl Into<Value>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<Value>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Fills in the page (1) and page size a paginated request needs.
    pub(crate) fn with_defaults(mut self, per_page: u32) -> Self {
        self.page = Some(self.page.unwrap_or(1).max(1));
        self.per_page = Some(self.per_page.unwrap_or(per_page).max(1));
        self
    }

    /// Query-string parameters, or `None` if nothing is set.
    pub(crate) fn to_search(&self, encoder: &WireEncoder<'_>) -> Option<Map<String, Json>> {
        let mut search = Map::new();
        if let Some(page) = self.page {
            search.insert("page".into(), page.into());
        }
        if let Some(per_page) = self.per_page {
            search.insert("per_page".into(), per_page.into());
        }
        if let Some(filter) = &self.filter {
            search.insert("where".into(), encoder.encode(filter));
        }
        if let Some(sort) = &self.sort {
            search.insert("sort".into(), encoder.encode(sort));
        }
        (!search.is_empty()).then_some(search)
    }
}

/// One page of a collection.
///
/// Clones share state: changing the page through one clone is visible
/// through all of them.
#[derive(Clone)]
pub struct Pagination(Arc<PaginationInner>);

struct PaginationInner {
    potion: Potion,
    uri: String,
    state: RwLock<PageState>,
}

struct PageState {
    query: Query,
    items: Vec<Value>,
    total: usize,
}

impl Pagination {
    pub(crate) fn new(potion: Potion, uri: String, query: Query, items: Vec<Value>, total: usize) -> Self {
        Self(Arc::new(PaginationInner {
            potion,
            uri,
            state: RwLock::new(PageState { query, items, total }),
        }))
    }

    pub(crate) fn update(&self, query: Query, items: Vec<Value>, total: usize) {
        *self.0.state.write() = PageState { query, items, total };
    }

    /// Loads page `page` into this pagination.
    ///
    /// On failure the current page is kept.
    pub async fn change_page_to(&self, page: u32) -> Result<()> {
        let query = self.query().page(page);
        self.0
            .potion
            .fetch_page(&self.0.uri, query, Some(self))
            .await
            .map(|_| ())
    }

    /// Collection URI this pagination reads from.
    pub fn uri(&self) -> &str {
        &self.0.uri
    }

    /// The query of the current page.
    pub fn query(&self) -> Query {
        self.0.state.read().query.clone()
    }

    /// Current page, starting at 1.
    pub fn page(&self) -> u32 {
        self.0.state.read().query.page.unwrap_or(1)
    }

    pub fn per_page(&self) -> u32 {
        self.0.state.read().query.per_page.unwrap_or(1).max(1)
    }

    /// Total number of items in the collection.
    pub fn total(&self) -> usize {
        self.0.state.read().total
    }

    /// Number of pages: `ceil(total / per_page)`.
    pub fn pages(&self) -> usize {
        self.total().div_ceil(self.per_page() as usize)
    }

    /// Number of items on the current page.
    pub fn len(&self) -> usize {
        self.0.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.state.read().items.is_empty()
    }

    /// Item `index` of the current page.
    pub fn at(&self, index: usize) -> Option<Value> {
        self.0.state.read().items.get(index).cloned()
    }

    /// Snapshot of the current page's items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.state.read().items.clone()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    pub fn ptr_eq(a: &Pagination, b: &Pagination) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl IntoIterator for &Pagination {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Debug for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.read();
        f.debug_struct("Pagination")
            .field("uri", &self.0.uri)
            .field("page", &state.query.page)
            .field("per_page", &state.query.per_page)
            .field("total", &state.total)
            .field("items", &state.items.len())
            .finish()
    }
}
