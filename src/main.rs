//! # Potion demo
//!
//! Runs the client against an in-memory API:
//! 1.  Fetching a user whose payload refers back to itself.
//! 2.  Loading a lazily resolved property.
//! 3.  Paging through a collection.
//!
//! ```bash
//! RUST_LOG=debug cargo run
//! ```

use async_trait::async_trait;
use potion::telemetry::setup_tracing;
use potion::transport::{Request, Response, Transport};
use potion::{
    FetchOptions, Headers, Potion, PotionConfig, PotionError, Query, Resource, TransportError,
};
use serde_json::{json, Value as Json};
use tracing::{info, Instrument};

struct User;

impl Resource for User {
    const PREFIX: &'static str = "/user";

    fn readonly() -> &'static [&'static str] {
        &["createdAt"]
    }

    fn async_properties() -> &'static [&'static str] {
        &["bestFriend"]
    }
}

/// Serves three users from memory.
struct InMemoryApi;

impl InMemoryApi {
    fn user(id: u32) -> Json {
        json!({
            "$uri": format!("/api/user/{id}"),
            "name": format!("User {id}"),
            "created_at": {"$date": 1451060269000_i64 + i64::from(id)},
            "myself": {"$ref": "#"},
            "best_friend": {"$ref": format!("/api/user/{}", id % 3 + 1)},
        })
    }
}

#[async_trait]
impl Transport for InMemoryApi {
    async fn request(&self, uri: &str, request: Request) -> Result<Response, TransportError> {
        match uri.strip_prefix("/api/user") {
            Some("") => {
                let search = request.search.unwrap_or_default();
                let page = search.get("page").and_then(Json::as_u64).unwrap_or(1) as u32;
                let per_page = search.get("per_page").and_then(Json::as_u64).unwrap_or(3) as u32;
                let items: Vec<Json> = (1..=3)
                    .skip(((page - 1) * per_page) as usize)
                    .take(per_page as usize)
                    .map(Self::user)
                    .collect();
                Ok(Response {
                    headers: [("X-Total-Count", "3")].into_iter().collect::<Headers>(),
                    body: Json::Array(items),
                })
            }
            Some(rest) => match rest.trim_start_matches('/').parse::<u32>() {
                Ok(id @ 1..=3) => Ok(Response::new(Self::user(id))),
                _ => Err(TransportError::status(404, format!("{uri} not found"))),
            },
            None => Err(TransportError::status(404, format!("{uri} not found"))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), PotionError> {
    setup_tracing();

    let potion = Potion::with_config(PotionConfig::default().prefix("/api").per_page(2), InMemoryApi);
    potion.register_resource::<User>()?;
    let users = potion.store_for::<User>()?;

    let user = async { users.fetch(1, FetchOptions::default()).await }
        .instrument(tracing::info_span!("fetch_user"))
        .await?;
    let myself = user.get("myself").and_then(|v| v.into_entity());
    info!(
        uri = %user.uri(),
        self_is_same = myself.as_ref() == Some(&user),
        "User fetched"
    );

    if let Some(lazy) = user.get("bestFriend").and_then(|v| v.as_lazy().cloned()) {
        let friend = lazy.load().await?;
        info!(friend = ?friend.get("name"), "Best friend loaded");
    }

    let page = users.paginate(Query::new()).await?;
    info!(page = page.page(), pages = page.pages(), total = page.total(), "First page");
    page.change_page_to(2).await?;
    for item in &page {
        info!(name = ?item.get("name"), "Second page item");
    }

    info!(write = %potion.encoder().entity_payload(&user), "Write payload");
    Ok(())
}
