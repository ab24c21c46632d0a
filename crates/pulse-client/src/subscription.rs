//! Per-channel subscription lifecycle.
//!
//! Each [`Subscription`] is a handle to a task that owns the channel's
//! subscribe state. Every operation is a command in that task's mailbox, so
//! state changes for one channel happen one at a time and in the order they
//! were issued. Requests to the connection run on separately spawned tasks
//! and report back through the same mailbox.
//!
//! ```text
//! subscribe() ──▶ mailbox ──▶ state task ──spawn──▶ Session::send_subscribe
//!                    ▲                                    │
//!                    └──────── SubscribeReplied ◀─────────┘
//! ```
//!
//! Operations that need an active subscription (publish, presence,
//! presence stats, history) first wait for the subscribe outcome. A waiter
//! is released by the outcome or by its deadline, whichever comes first.

use crate::config::ClientConfig;
use crate::delegate::{
    spawn_dispatcher, SubscribeErrorEvent, SubscribeSuccessEvent, SubscriptionDelegate,
    SubscriptionEvent,
};
use crate::error::{SessionError, SubscriptionError};
use crate::metrics;
use crate::session::Session;
use crate::waiter::{WaitSlot, WaiterKey, WaiterRegistry};
use bytes::Bytes;
use pulse_protocol::{ClientInfo, PresenceStats, Publication, ReplyError, SubscribeReply};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Subscribe status of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    /// Not subscribed.
    Unsubscribed,
    /// A subscribe attempt is pending or deferred until connect.
    Subscribing,
    /// The server confirmed the subscription.
    SubscribeSuccess,
    /// The server rejected the subscription.
    SubscribeError,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionStatus::Unsubscribed => "unsubscribed",
            SubscriptionStatus::Subscribing => "subscribing",
            SubscriptionStatus::SubscribeSuccess => "subscribed",
            SubscriptionStatus::SubscribeError => "error",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a subscription's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Current status.
    pub status: SubscriptionStatus,
    /// Whether the subscription should be re-established on connect.
    pub need_resubscribe: bool,
    /// Whether the next success counts as a resubscribe.
    pub is_resubscribe: bool,
    /// Number of operations waiting for the subscription.
    pub pending_waiters: usize,
}

/// Reasons passed to [`Session::close`].
const REASON_INTERNAL_ERROR: &str = "internal server error";
const REASON_SUBSCRIBE_TIMEOUT: &str = "subscribe timeout";
const REASON_SUBSCRIBE_FAILED: &str = "subscribe failed";
const REASON_TOKEN_FAILED: &str = "subscription token failed";

enum Command {
    Subscribe,
    Unsubscribe,
    ResubscribeIfNecessary,
    UnsubscribeOnDisconnect {
        done: oneshot::Sender<()>,
    },
    Wait {
        slot: Arc<WaitSlot>,
    },
    WaiterExpired {
        key: WaiterKey,
    },
    TokenReceived {
        attempt: u64,
        result: Result<String, SessionError>,
    },
    SubscribeReplied {
        attempt: u64,
        result: Result<SubscribeReply, SessionError>,
    },
    Snapshot {
        reply: oneshot::Sender<SubscriptionSnapshot>,
    },
}

/// Handle to one channel subscription.
///
/// Cloning is cheap; all clones drive the same subscription. The state task
/// stops once every handle is dropped.
#[derive(Clone)]
pub struct Subscription {
    channel: Arc<str>,
    session: Arc<dyn Session>,
    mailbox: mpsc::UnboundedSender<Command>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Create a subscription for `channel` in the `unsubscribed` state.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        session: Arc<dyn Session>,
        config: Arc<ClientConfig>,
        delegate: Arc<dyn SubscriptionDelegate>,
    ) -> Self {
        let channel: String = channel.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = SubscriptionTask {
            events: spawn_dispatcher(channel.clone(), delegate),
            channel: channel.clone(),
            session: session.clone(),
            config,
            mailbox: tx.downgrade(),
            status: SubscriptionStatus::Unsubscribed,
            need_resubscribe: false,
            is_resubscribe: false,
            waiters: WaiterRegistry::new(),
            attempt: 0,
        };
        tokio::spawn(task.run(rx));

        debug!(channel = %channel, "Subscription created");

        Self {
            channel: channel.into(),
            session,
            mailbox: tx,
        }
    }

    /// Get the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Start subscribing.
    ///
    /// Does nothing unless the subscription is `unsubscribed`. If the
    /// connection is down, the attempt is deferred until
    /// [`resubscribe_if_necessary`](Self::resubscribe_if_necessary).
    pub fn subscribe(&self) {
        self.dispatch(Command::Subscribe);
    }

    /// Stop the subscription and release it on the server.
    ///
    /// Operations issued afterwards fail with
    /// [`SubscriptionError::Unsubscribed`].
    pub fn unsubscribe(&self) {
        self.dispatch(Command::Unsubscribe);
    }

    /// Re-attempt the subscription after the connection is (re)established.
    pub fn resubscribe_if_necessary(&self) {
        self.dispatch(Command::ResubscribeIfNecessary);
    }

    /// Mark an active subscription as unsubscribed because the connection
    /// dropped.
    ///
    /// Returns once the subscription has processed the disconnect. The
    /// subscription keeps wanting to be resubscribed.
    pub async fn unsubscribe_on_disconnect(&self) {
        let (done, rx) = oneshot::channel();
        if self.dispatch(Command::UnsubscribeOnDisconnect { done }) {
            let _ = rx.await;
        }
    }

    /// Wait until the subscription is active.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Unsubscribed`] after an explicit
    /// unsubscribe, [`SubscriptionError::Reply`] if the server rejects the
    /// subscription, or [`SubscriptionError::Timeout`] if it is not active
    /// within the configured timeout.
    pub async fn wait_for_subscribe(&self) -> Result<(), SubscriptionError> {
        let (slot, rx) = WaitSlot::new();
        self.mailbox
            .send(Command::Wait { slot })
            .map_err(|_| SubscriptionError::Closed)?;
        rx.await.unwrap_or(Err(SubscriptionError::Closed))
    }

    /// Publish data into the channel once subscribed.
    ///
    /// # Errors
    ///
    /// Returns the wait error, or the connection's error for the publish.
    pub async fn publish(&self, data: impl Into<Bytes>) -> Result<(), SubscriptionError> {
        self.wait_for_subscribe().await?;
        Ok(self.session.publish(&self.channel, data.into()).await?)
    }

    /// Fetch the clients present in the channel once subscribed.
    ///
    /// # Errors
    ///
    /// Returns the wait error, or the connection's error for the lookup.
    pub async fn presence(&self) -> Result<HashMap<String, ClientInfo>, SubscriptionError> {
        self.wait_for_subscribe().await?;
        Ok(self.session.presence(&self.channel).await?)
    }

    /// Fetch presence counters once subscribed.
    ///
    /// # Errors
    ///
    /// Returns the wait error, or the connection's error for the lookup.
    pub async fn presence_stats(&self) -> Result<PresenceStats, SubscriptionError> {
        self.wait_for_subscribe().await?;
        Ok(self.session.presence_stats(&self.channel).await?)
    }

    /// Fetch channel history once subscribed.
    ///
    /// # Errors
    ///
    /// Returns the wait error, or the connection's error for the lookup.
    pub async fn history(&self) -> Result<Vec<Publication>, SubscriptionError> {
        self.wait_for_subscribe().await?;
        Ok(self.session.history(&self.channel).await?)
    }

    /// Read the current state, after every previously issued operation.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Closed`] if the state task is gone.
    pub async fn snapshot(&self) -> Result<SubscriptionSnapshot, SubscriptionError> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Command::Snapshot { reply })
            .map_err(|_| SubscriptionError::Closed)?;
        rx.await.map_err(|_| SubscriptionError::Closed)
    }

    /// Read the current status.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Closed`] if the state task is gone.
    pub async fn status(&self) -> Result<SubscriptionStatus, SubscriptionError> {
        Ok(self.snapshot().await?.status)
    }

    fn dispatch(&self, command: Command) -> bool {
        if self.mailbox.send(command).is_err() {
            warn!(channel = %self.channel, "Subscription task is not running");
            return false;
        }
        true
    }
}

/// State owned by the subscription task.
struct SubscriptionTask {
    channel: String,
    session: Arc<dyn Session>,
    config: Arc<ClientConfig>,
    mailbox: mpsc::WeakUnboundedSender<Command>,
    events: mpsc::UnboundedSender<SubscriptionEvent>,
    status: SubscriptionStatus,
    need_resubscribe: bool,
    is_resubscribe: bool,
    waiters: WaiterRegistry,
    /// Bumped for every subscribe attempt; outcomes of older attempts are
    /// dropped.
    attempt: u64,
}

impl SubscriptionTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        // Commands are handled without awaiting, so nothing queued behind
        // the current command can block it.
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!(channel = %self.channel, "Subscription task stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe => self.subscribe(),
            Command::Unsubscribe => self.unsubscribe(),
            Command::ResubscribeIfNecessary => self.resubscribe_if_necessary(),
            Command::UnsubscribeOnDisconnect { done } => {
                // Requests in flight belong to the dropped connection.
                self.attempt += 1;
                self.move_to_unsubscribed();
                let _ = done.send(());
            }
            Command::Wait { slot } => self.wait_for_subscribe(slot),
            Command::WaiterExpired { key } => {
                self.waiters.remove(key);
            }
            Command::TokenReceived { attempt, result } => self.on_token(attempt, result),
            Command::SubscribeReplied { attempt, result } => {
                self.on_subscribe_reply(attempt, result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            status: self.status,
            need_resubscribe: self.need_resubscribe,
            is_resubscribe: self.is_resubscribe,
            pending_waiters: self.waiters.len(),
        }
    }

    fn set_status(&mut self, status: SubscriptionStatus) {
        if self.status != status {
            debug!(channel = %self.channel, from = %self.status, to = %status, "Status changed");
            self.status = status;
        }
    }

    fn emit(&self, event: SubscriptionEvent) {
        if self.events.send(event).is_err() {
            warn!(channel = %self.channel, "Notification dispatcher stopped");
        }
    }

    fn subscribe(&mut self) {
        if self.status != SubscriptionStatus::Unsubscribed {
            trace!(channel = %self.channel, status = %self.status, "Subscribe ignored");
            return;
        }

        self.set_status(SubscriptionStatus::Subscribing);
        self.need_resubscribe = true;

        if !self.session.is_connected() {
            debug!(channel = %self.channel, "Not connected, subscribe deferred");
            return;
        }
        self.resubscribe();
    }

    fn unsubscribe(&mut self) {
        self.need_resubscribe = false;
        self.attempt += 1;

        self.move_to_unsubscribed();
        self.set_status(SubscriptionStatus::Unsubscribed);

        let session = self.session.clone();
        let channel = self.channel.clone();
        self.spawn_work(async move {
            session.unsubscribe(&channel).await;
            None
        });
    }

    fn move_to_unsubscribed(&mut self) {
        if self.status != SubscriptionStatus::SubscribeSuccess {
            return;
        }
        self.set_status(SubscriptionStatus::Unsubscribed);
        self.emit(SubscriptionEvent::Unsubscribe);
    }

    fn resubscribe_if_necessary(&mut self) {
        let retry = matches!(
            self.status,
            SubscriptionStatus::Unsubscribed | SubscriptionStatus::Subscribing
        );
        if !self.need_resubscribe || !retry {
            trace!(channel = %self.channel, status = %self.status, "Resubscribe not needed");
            return;
        }

        self.set_status(SubscriptionStatus::Subscribing);
        self.resubscribe();
    }

    /// Start a new subscribe attempt, fetching a token first for private
    /// channels.
    fn resubscribe(&mut self) {
        self.attempt += 1;
        let attempt = self.attempt;
        metrics::record_subscribe_attempt();

        if !self.config.is_private_channel(&self.channel) {
            self.send_subscribe(attempt, String::new());
            return;
        }

        debug!(channel = %self.channel, attempt, "Requesting subscription token");
        let session = self.session.clone();
        let channel = self.channel.clone();
        self.spawn_work(async move {
            let result = session.subscription_token(&channel).await;
            Some(Command::TokenReceived { attempt, result })
        });
    }

    fn is_current(&self, attempt: u64) -> bool {
        attempt == self.attempt && self.status == SubscriptionStatus::Subscribing
    }

    fn send_subscribe(&mut self, attempt: u64, token: String) {
        if !self.is_current(attempt) {
            debug!(channel = %self.channel, attempt, "Subscribe attempt superseded");
            return;
        }

        debug!(channel = %self.channel, attempt, "Sending subscribe request");
        let session = self.session.clone();
        let channel = self.channel.clone();
        self.spawn_work(async move {
            let result = session.send_subscribe(&channel, &token).await;
            Some(Command::SubscribeReplied { attempt, result })
        });
    }

    fn on_token(&mut self, attempt: u64, result: Result<String, SessionError>) {
        if !self.is_current(attempt) {
            debug!(channel = %self.channel, attempt, "Token arrived for abandoned attempt");
            return;
        }

        match result {
            Ok(token) => self.send_subscribe(attempt, token),
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Failed to get subscription token");
                self.request_reconnect(REASON_TOKEN_FAILED);
            }
        }
    }

    fn on_subscribe_reply(&mut self, attempt: u64, result: Result<SubscribeReply, SessionError>) {
        if !self.is_current(attempt) {
            debug!(channel = %self.channel, attempt, "Reply for superseded subscribe attempt");
            return;
        }

        match result {
            Ok(reply) => self.on_subscribe_success(reply),
            Err(SessionError::Reply(err)) if err.is_internal() => {
                warn!(channel = %self.channel, error = %err, "Internal error on subscribe");
                self.request_reconnect(REASON_INTERNAL_ERROR);
            }
            Err(SessionError::Reply(err)) => self.on_subscribe_error(err),
            Err(SessionError::Timeout) => {
                warn!(channel = %self.channel, "Subscribe request timed out");
                self.request_reconnect(REASON_SUBSCRIBE_TIMEOUT);
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "Subscribe request failed");
                self.request_reconnect(REASON_SUBSCRIBE_FAILED);
            }
        }
    }

    fn on_subscribe_success(&mut self, reply: SubscribeReply) {
        let resubscribe = self.is_resubscribe;
        self.is_resubscribe = true;

        let released = self.waiters.drain(&Ok(()));
        self.set_status(SubscriptionStatus::SubscribeSuccess);
        metrics::record_subscribe_success(resubscribe);

        info!(
            channel = %self.channel,
            resubscribe,
            recovered = reply.recovered,
            released,
            "Subscribed"
        );

        self.emit(SubscriptionEvent::SubscribeSuccess(SubscribeSuccessEvent {
            resubscribe,
            recovered: reply.recovered,
        }));
    }

    fn on_subscribe_error(&mut self, err: ReplyError) {
        self.set_status(SubscriptionStatus::SubscribeError);
        metrics::record_subscribe_error(err.code);

        warn!(channel = %self.channel, code = err.code, message = %err.message, "Subscribe rejected");

        self.emit(SubscriptionEvent::SubscribeError(SubscribeErrorEvent {
            code: err.code,
            message: err.message.clone(),
        }));
        self.waiters.drain(&Err(SubscriptionError::Reply(err)));
    }

    /// Ask the connection to reconnect. Waiters stay pending; the
    /// resubscribe after reconnect or their deadline releases them.
    fn request_reconnect(&self, reason: &'static str) {
        metrics::record_reconnect_request(reason);
        warn!(channel = %self.channel, reason, "Requesting reconnect");

        let session = self.session.clone();
        self.spawn_work(async move {
            session.close(reason, true).await;
            None
        });
    }

    fn wait_for_subscribe(&mut self, slot: Arc<WaitSlot>) {
        if !self.need_resubscribe {
            slot.resolve(Err(SubscriptionError::Unsubscribed));
            return;
        }
        if !matches!(
            self.status,
            SubscriptionStatus::Subscribing | SubscriptionStatus::Unsubscribed
        ) {
            slot.resolve(Ok(()));
            return;
        }

        let key = self.waiters.insert(slot.clone());
        let timeout = self.config.timeout();
        let mailbox = self.mailbox.clone();
        let channel = self.channel.clone();
        let timer_slot = slot.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if timer_slot.expire() {
                metrics::record_wait_timeout();
                debug!(channel = %channel, key, "Wait for subscribe timed out");
                if let Some(mailbox) = mailbox.upgrade() {
                    let _ = mailbox.send(Command::WaiterExpired { key });
                }
            }
        });
        slot.set_timer(timer.abort_handle());
    }

    /// Run connection work off the state task, feeding its result back into
    /// the mailbox.
    fn spawn_work<F>(&self, work: F)
    where
        F: Future<Output = Option<Command>> + Send + 'static,
    {
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            if let Some(command) = work.await {
                if let Some(mailbox) = mailbox.upgrade() {
                    let _ = mailbox.send(command);
                }
            }
        });
    }
}
