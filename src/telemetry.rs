//! # Logging
//!
//! The client logs through `tracing` and never installs a subscriber itself.
//! Applications that have none can call [`setup_tracing`].
//!
//! ## Spans
//!
//! | Span | Fields |
//! |------|--------|
//! | `fetch` | `uri`, `method`, `cache` |
//! | `fetch_page` | `uri`, `page`, `per_page` |
//! | `query` / `save` | `resource` (the collection prefix) |
//! | `update` / `destroy` / `call` | `uri` of the entity or route |
//!
//! ## Events
//!
//! - **info**: client creation, created/updated/deleted instances, cache clears
//! - **debug**: every request sent with its prefixed URI, search and body;
//!   cache hits; page loads with `items` and `total`
//! - **trace**: entity registration, back-references and substitution;
//!   joins of pending fetches; placeholders discarded after a failed resolution
//! - **warn**: transport failures, with the error message
//!
//! Nested `$ref` fetches nest their spans. A cycle of two resources with
//! `RUST_LOG=potion=debug` looks roughly like:
//!
//! ```text
//! DEBUG fetch{uri="/user/1" method=GET cache=true}: Sending request uri=/api/user/1 method=GET search=None body=None
//! DEBUG fetch{uri="/user/1" method=GET cache=true}:fetch{uri="/user/2" method=GET cache=true}: Sending request uri=/api/user/2 method=GET search=None body=None
//! DEBUG fetch{uri="/user/1" method=GET cache=true}:fetch{uri="/user/2" method=GET cache=true}:fetch{uri="/user/1" method=GET cache=true}: Cache hit key=/user/1
//! ```

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "potion=info";

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to info-level events from this crate.
pub fn setup_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
