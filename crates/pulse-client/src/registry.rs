//! Channel subscription registry.
//!
//! The registry owns at most one [`Subscription`] per channel and fans
//! connection lifecycle transitions out to all of them.

use crate::config::ClientConfig;
use crate::delegate::SubscriptionDelegate;
use crate::error::RegistryError;
use crate::session::Session;
use crate::subscription::Subscription;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum channel name length.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 255;

/// Validate a channel name.
///
/// # Errors
///
/// Returns an error message if the channel name is invalid.
pub fn validate_channel_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Channel name cannot be empty");
    }
    if name.len() > MAX_CHANNEL_NAME_LENGTH {
        return Err("Channel name too long");
    }
    if !name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Channel name contains invalid characters");
    }
    Ok(())
}

/// Table of a client's subscriptions, indexed by channel.
pub struct SubscriptionRegistry {
    subscriptions: DashMap<String, Subscription>,
    session: Arc<dyn Session>,
    config: Arc<ClientConfig>,
}

impl SubscriptionRegistry {
    /// Create an empty registry for subscriptions on `session`.
    #[must_use]
    pub fn new(session: Arc<dyn Session>, config: Arc<ClientConfig>) -> Self {
        info!("Creating subscription registry with config: {:?}", config);
        Self {
            subscriptions: DashMap::new(),
            session,
            config,
        }
    }

    /// Create the subscription for `channel`.
    ///
    /// The subscription starts `unsubscribed`; call
    /// [`Subscription::subscribe`] to start it.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid, a subscription for
    /// the channel already exists, or the subscription limit is reached.
    pub fn new_subscription(
        &self,
        channel: &str,
        delegate: Arc<dyn SubscriptionDelegate>,
    ) -> Result<Subscription, RegistryError> {
        validate_channel_name(channel).map_err(RegistryError::InvalidChannel)?;

        if self.subscriptions.len() >= self.config.max_subscriptions {
            return Err(RegistryError::MaxSubscriptionsReached);
        }

        match self.subscriptions.entry(channel.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(channel.to_string())),
            Entry::Vacant(entry) => {
                let subscription = Subscription::new(
                    channel,
                    self.session.clone(),
                    self.config.clone(),
                    delegate,
                );
                entry.insert(subscription.clone());
                debug!(channel = %channel, total = self.subscriptions.len(), "Subscription registered");
                Ok(subscription)
            }
        }
    }

    /// Get the subscription for `channel`.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<Subscription> {
        self.subscriptions.get(channel).map(|s| s.value().clone())
    }

    /// Unsubscribe and forget the subscription for `channel`.
    pub fn remove(&self, channel: &str) -> Option<Subscription> {
        let (_, subscription) = self.subscriptions.remove(channel)?;
        subscription.unsubscribe();
        debug!(channel = %channel, "Subscription removed");
        Some(subscription)
    }

    /// Resubscribe every subscription that still wants to be active.
    ///
    /// Called once the connection is established.
    pub fn resubscribe_all(&self) {
        for entry in self.subscriptions.iter() {
            entry.value().resubscribe_if_necessary();
        }
        debug!(count = self.subscriptions.len(), "Resubscribing after connect");
    }

    /// Move every subscription to `unsubscribed` after the connection
    /// dropped, returning once all of them have processed it.
    pub async fn unsubscribe_all_on_disconnect(&self) {
        // Collect first so no map guard is held across an await.
        let subscriptions: Vec<Subscription> =
            self.subscriptions.iter().map(|e| e.value().clone()).collect();

        for subscription in &subscriptions {
            subscription.unsubscribe_on_disconnect().await;
        }
        debug!(count = subscriptions.len(), "Subscriptions marked disconnected");
    }

    /// Get all channel names.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.subscriptions.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Check if the registry holds no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
