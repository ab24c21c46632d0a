//! Connection collaborator contract.
//!
//! A subscription never talks to the network itself. Everything it needs
//! from the connection (its status, the subscribe exchange, token retrieval,
//! forwarded reads and writes, and reconnect requests) goes through this
//! trait.

use crate::error::SessionError;
use async_trait::async_trait;
use bytes::Bytes;
use pulse_protocol::{ClientInfo, PresenceStats, Publication, SubscribeReply};
use std::collections::HashMap;

/// The connection a subscription runs on.
///
/// Every async method is invoked from a task spawned on the runtime, never
/// from a subscription's own state loop, so implementations may take as long
/// as their request timeout allows.
#[async_trait]
pub trait Session: Send + Sync {
    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Send a subscribe request for `channel`.
    ///
    /// `token` is empty for channels that do not need authorization.
    async fn send_subscribe(
        &self,
        channel: &str,
        token: &str,
    ) -> Result<SubscribeReply, SessionError>;

    /// Obtain an authorization token for a private channel.
    async fn subscription_token(&self, channel: &str) -> Result<String, SessionError>;

    /// Release server-side state for `channel`.
    async fn unsubscribe(&self, channel: &str);

    /// Publish data into `channel`.
    async fn publish(&self, channel: &str, data: Bytes) -> Result<(), SessionError>;

    /// Fetch the clients present in `channel`, keyed by client ID.
    async fn presence(&self, channel: &str) -> Result<HashMap<String, ClientInfo>, SessionError>;

    /// Fetch presence counters for `channel`.
    async fn presence_stats(&self, channel: &str) -> Result<PresenceStats, SessionError>;

    /// Fetch the message history of `channel`.
    async fn history(&self, channel: &str) -> Result<Vec<Publication>, SessionError>;

    /// Close the connection, optionally reconnecting afterwards.
    async fn close(&self, reason: &str, reconnect: bool);
}
