//! Replies to subscribe requests.
//!
//! The connection layer decodes these from the server and hands them to
//! the subscription core unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error code the server uses for an internal failure.
///
/// A subscribe reply carrying this code points at an unhealthy session
/// rather than a rejected channel.
pub const INTERNAL_ERROR_CODE: u32 = 100;

/// Error code for an unauthorized subscribe request.
pub const UNAUTHORIZED_CODE: u32 = 101;

/// Error code for an unknown channel namespace.
pub const UNKNOWN_CHANNEL_CODE: u32 = 102;

/// Error code for a permission denied reply.
pub const PERMISSION_DENIED_CODE: u32 = 103;

/// Error code for a request the server already processed.
pub const ALREADY_SUBSCRIBED_CODE: u32 = 105;

/// A protocol-level error returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("reply error {code}: {message}")]
pub struct ReplyError {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

impl ReplyError {
    /// Create a new reply error.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether this reply reports an internal server failure.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.code == INTERNAL_ERROR_CODE
    }
}

/// Successful reply to a subscribe request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeReply {
    /// Whether the server replayed messages missed while disconnected.
    #[serde(default)]
    pub recovered: bool,
}

impl SubscribeReply {
    /// Reply for a subscription that recovered missed messages.
    #[must_use]
    pub fn recovered() -> Self {
        Self { recovered: true }
    }
}

impl fmt::Display for SubscribeReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscribed (recovered: {})", self.recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_detection() {
        assert!(ReplyError::new(INTERNAL_ERROR_CODE, "internal").is_internal());
        assert!(!ReplyError::new(PERMISSION_DENIED_CODE, "denied").is_internal());
    }

    #[test]
    fn test_reply_error_display() {
        let err = ReplyError::new(103, "permission denied");
        assert_eq!(err.to_string(), "reply error 103: permission denied");
    }

    #[test]
    fn test_subscribe_reply_defaults_to_not_recovered() {
        let reply: SubscribeReply = serde_json::from_str("{}").unwrap();
        assert!(!reply.recovered);

        let reply: SubscribeReply = serde_json::from_str(r#"{"recovered":true}"#).unwrap();
        assert_eq!(reply, SubscribeReply::recovered());
    }
}
