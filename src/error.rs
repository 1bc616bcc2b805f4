//! # Client Errors
//!
//! Every failure surfaces as a [`PotionError`] from the asynchronous operation
//! that hit it. The type is `Clone` because a single in-flight fetch may be
//! awaited by several callers at once, and all of them observe the same outcome.

/// Errors produced by the Potion client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PotionError {
    /// A URI or `$type`/`$id` pair does not match any registered resource prefix.
    #[error("Unknown resource: {uri}")]
    UnknownResource { uri: String },

    /// A resource type could not be registered.
    #[error("Invalid registration for {prefix:?}: {reason}")]
    Registration { prefix: String, reason: String },

    /// The transport collaborator failed (network failure, non-2xx status).
    #[error("Transport error for {uri}: {message}")]
    Transport {
        uri: String,
        status: Option<u16>,
        message: String,
    },

    /// A `$ref` could not be tied to any object.
    #[error("Unresolved reference: {reference}")]
    UnresolvedReference { reference: String },

    /// The payload does not have the shape the operation expects.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl PotionError {
    /// Builds a [`PotionError::Transport`] from what the transport reported.
    ///
    /// The requested URI is used as the message when the transport gave none.
    pub(crate) fn transport(uri: &str, error: TransportError) -> Self {
        PotionError::Transport {
            uri: uri.to_string(),
            status: error.status,
            message: error
                .message
                .unwrap_or_else(|| format!("request to {uri} failed")),
        }
    }

    /// The HTTP status attached to a transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PotionError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
///
/// Both fields are optional; the client only extracts a message from it.
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or("transport failure"))]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: Option<String>,
}

impl TransportError {
    /// A failure with an HTTP status and message.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
        }
    }

    /// A failure that carries no detail at all.
    pub fn opaque() -> Self {
        Self::default()
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = PotionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_keeps_message() {
        let err = PotionError::transport("/user/1", TransportError::status(404, "Not Found"));
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Transport error for /user/1: Not Found");
    }

    #[test]
    fn test_transport_error_falls_back_to_uri() {
        let err = PotionError::transport("/user/1", TransportError::opaque());
        assert_eq!(
            err,
            PotionError::Transport {
                uri: "/user/1".into(),
                status: None,
                message: "request to /user/1 failed".into(),
            }
        );
    }
}
