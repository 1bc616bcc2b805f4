//! Client configuration.

use serde::Deserialize;

/// Default page size applied when a paginated query does not set one.
pub const DEFAULT_PER_PAGE: u32 = 25;

/// Default header carrying the size of a paginated collection.
pub const DEFAULT_TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Settings for a [`Potion`](crate::Potion) client.
///
/// Can be built in code or deserialized from any serde format:
///
/// ```
/// use potion::PotionConfig;
///
/// let config = PotionConfig::default().prefix("/api").per_page(50);
/// assert_eq!(config.prefix, "/api");
/// assert_eq!(config.per_page, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PotionConfig {
    /// Global API prefix stripped from incoming URIs and added to outgoing ones.
    pub prefix: String,
    /// Page size used when paginating without an explicit `per_page`.
    pub per_page: u32,
    /// Response header holding the total number of items in a collection.
    pub total_count_header: String,
}

impl Default for PotionConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            per_page: DEFAULT_PER_PAGE,
            total_count_header: DEFAULT_TOTAL_COUNT_HEADER.to_string(),
        }
    }
}

impl PotionConfig {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn total_count_header(mut self, header: impl Into<String>) -> Self {
        self.total_count_header = header.into().to_ascii_lowercase();
        self
    }

    /// Prepends the global prefix unless `uri` already carries it.
    pub(crate) fn with_prefix(&self, uri: &str) -> String {
        if self.prefix.is_empty() || self.strip_prefix(uri).is_some() {
            uri.to_string()
        } else {
            format!("{}{}", self.prefix, uri)
        }
    }

    /// Removes the global prefix when `uri` starts with it on a `/` boundary.
    pub(crate) fn strip_prefix<'a>(&self, uri: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return None;
        }
        let rest = uri.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// The URI without the global prefix.
    pub(crate) fn normalize<'a>(&self, uri: &'a str) -> &'a str {
        self.strip_prefix(uri).unwrap_or(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PotionConfig::default();
        assert_eq!(config.prefix, "");
        assert_eq!(config.per_page, 25);
        assert_eq!(config.total_count_header, "x-total-count");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PotionConfig = serde_json::from_str(r#"{"prefix": "/api"}"#).unwrap();
        assert_eq!(config.prefix, "/api");
        assert_eq!(config.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_prefix_handling() {
        let config = PotionConfig::default().prefix("/api/");
        assert_eq!(config.with_prefix("/user/1"), "/api/user/1");
        assert_eq!(config.with_prefix("/api/user/1"), "/api/user/1");
        assert_eq!(config.normalize("/api/user/1"), "/user/1");
        assert_eq!(config.normalize("/apiary/1"), "/apiary/1");
        assert_eq!(config.normalize("/user/1"), "/user/1");
    }
}
