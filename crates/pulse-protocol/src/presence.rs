//! Presence and history payloads.
//!
//! These are the results of the read operations a subscription forwards to
//! the connection once it is active.

use serde::{Deserialize, Serialize};

/// Information about a client connected to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// User ID, empty for anonymous clients.
    #[serde(default)]
    pub user: String,
    /// Client (connection) ID.
    pub client: String,
    /// Connection-level metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_info: Option<serde_json::Value>,
    /// Channel-level metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chan_info: Option<serde_json::Value>,
}

impl ClientInfo {
    /// Create client info for a connection.
    #[must_use]
    pub fn new(user: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            client: client.into(),
            conn_info: None,
            chan_info: None,
        }
    }

    /// Attach connection metadata.
    #[must_use]
    pub fn with_conn_info(mut self, info: serde_json::Value) -> Self {
        self.conn_info = Some(info);
        self
    }

    /// Attach channel metadata.
    #[must_use]
    pub fn with_chan_info(mut self, info: serde_json::Value) -> Self {
        self.chan_info = Some(info);
        self
    }
}

/// Presence counters for a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceStats {
    /// Number of connected clients.
    pub num_clients: u32,
    /// Number of unique users.
    pub num_users: u32,
}

/// A message stored in channel history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Message ID assigned by the server.
    pub uid: String,
    /// Message payload.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Publisher, when the server exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ClientInfo>,
}

impl Publication {
    /// Create a publication.
    #[must_use]
    pub fn new(uid: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            uid: uid.into(),
            data: data.into(),
            info: None,
        }
    }

    /// Attach publisher info.
    #[must_use]
    pub fn with_info(mut self, info: ClientInfo) -> Self {
        self.info = Some(info);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_info_metadata() {
        let info = ClientInfo::new("42", "client-1").with_conn_info(json!({"name": "Alice"}));

        assert_eq!(info.user, "42");
        assert!(info.conn_info.is_some());
        assert!(info.chan_info.is_none());
    }

    #[test]
    fn test_client_info_skips_missing_metadata() {
        let value = serde_json::to_value(ClientInfo::new("", "client-1")).unwrap();
        assert_eq!(value, json!({"user": "", "client": "client-1"}));
    }

    #[test]
    fn test_publication_with_info() {
        let publication =
            Publication::new("uid-1", b"hello".to_vec()).with_info(ClientInfo::new("7", "c"));

        assert_eq!(&publication.data[..], b"hello");
        assert_eq!(publication.info.map(|i| i.user), Some("7".to_string()));
    }
}
