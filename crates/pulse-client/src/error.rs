//! Error types for the subscription core.

use pulse_protocol::ReplyError;
use thiserror::Error;

/// Failures reported by the connection collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The server rejected the request.
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// The request timed out in the connection's request layer.
    #[error("Request timed out")]
    Timeout,

    /// Transport or decoding failure.
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to callers of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The subscription was explicitly unsubscribed.
    #[error("Subscription is unsubscribed")]
    Unsubscribed,

    /// The subscription did not become active before the deadline.
    #[error("Timed out waiting for subscription")]
    Timeout,

    /// The server rejected the subscribe request.
    #[error("Subscribe failed: {0}")]
    Reply(ReplyError),

    /// A forwarded operation failed in the connection.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// The subscription task is no longer running.
    #[error("Subscription closed")]
    Closed,
}

/// Subscription registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid channel name.
    #[error("Invalid channel name: {0}")]
    InvalidChannel(&'static str),

    /// A subscription for this channel already exists.
    #[error("Subscription already exists: {0}")]
    AlreadyExists(String),

    /// Maximum subscriptions reached.
    #[error("Maximum subscriptions reached")]
    MaxSubscriptionsReached,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_from_reply() {
        let err: SessionError = ReplyError::new(103, "permission denied").into();
        assert_eq!(err.to_string(), "reply error 103: permission denied");
    }

    #[test]
    fn test_subscription_error_wraps_session_error() {
        let err: SubscriptionError = SessionError::Timeout.into();
        assert_eq!(err, SubscriptionError::Session(SessionError::Timeout));
        assert_eq!(err.to_string(), "Session error: Request timed out");
    }
}
