//! Subscription lifecycle notifications.
//!
//! Notifications are queued by the subscription and delivered by a
//! dedicated task per subscription, in the order they were emitted. A slow
//! delegate delays later notifications but never the subscription itself.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Payload of a subscribe-success notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeSuccessEvent {
    /// `false` for the first successful subscribe, `true` afterwards.
    pub resubscribe: bool,
    /// Whether the server replayed missed messages.
    pub recovered: bool,
}

/// Payload of a subscribe-error notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeErrorEvent {
    /// Error code from the server.
    pub code: u32,
    /// Error message from the server.
    pub message: String,
}

/// Receives lifecycle notifications for a subscription.
///
/// All methods default to doing nothing.
pub trait SubscriptionDelegate: Send + Sync {
    /// The subscription became active.
    fn on_subscribe_success(&self, _channel: &str, _event: SubscribeSuccessEvent) {}

    /// The server rejected the subscription.
    fn on_subscribe_error(&self, _channel: &str, _event: SubscribeErrorEvent) {}

    /// An active subscription stopped being active.
    fn on_unsubscribe(&self, _channel: &str) {}
}

/// A delegate that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl SubscriptionDelegate for NoopDelegate {}

/// A notification waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubscriptionEvent {
    SubscribeSuccess(SubscribeSuccessEvent),
    SubscribeError(SubscribeErrorEvent),
    Unsubscribe,
}

/// Spawn the delivery task for one subscription.
///
/// The task ends once the returned sender is dropped and the queue is empty.
pub(crate) fn spawn_dispatcher(
    channel: String,
    delegate: Arc<dyn SubscriptionDelegate>,
) -> mpsc::UnboundedSender<SubscriptionEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<SubscriptionEvent>();

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            trace!(channel = %channel, ?event, "Delivering notification");
            match event {
                SubscriptionEvent::SubscribeSuccess(event) => {
                    delegate.on_subscribe_success(&channel, event);
                }
                SubscriptionEvent::SubscribeError(event) => {
                    delegate.on_subscribe_error(&channel, event);
                }
                SubscriptionEvent::Unsubscribe => delegate.on_unsubscribe(&channel),
            }
        }
    });

    tx
}
