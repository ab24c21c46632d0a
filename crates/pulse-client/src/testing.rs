//! Test doubles for the connection collaborator and delegate.

use crate::config::ClientConfig;
use crate::delegate::{SubscribeErrorEvent, SubscribeSuccessEvent, SubscriptionDelegate};
use crate::error::SessionError;
use crate::session::Session;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pulse_protocol::{ClientInfo, PresenceStats, Publication, SubscribeReply};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

type Scripted<T> = (
    mpsc::UnboundedSender<T>,
    tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>,
);

fn scripted<T>() -> Scripted<T> {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, tokio::sync::Mutex::new(rx))
}

/// A call made into the mock session.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Subscribe { channel: String, token: String },
    Token(String),
    Unsubscribe(String),
    Publish { channel: String, data: Vec<u8> },
    Presence(String),
    PresenceStats(String),
    History(String),
    Close { reason: String, reconnect: bool },
}

/// Session whose subscribe replies and tokens are scripted by the test.
///
/// `send_subscribe` and `subscription_token` stay pending until the test
/// supplies a result.
pub(crate) struct MockSession {
    connected: AtomicBool,
    calls: Mutex<Vec<Call>>,
    replies: Scripted<Result<SubscribeReply, SessionError>>,
    tokens: Scripted<Result<String, SessionError>>,
    closes: Scripted<(String, bool)>,
}

impl MockSession {
    pub(crate) fn new(connected: bool) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(connected),
            calls: Mutex::new(Vec::new()),
            replies: scripted(),
            tokens: scripted(),
            closes: scripted(),
        })
    }

    pub(crate) fn connected() -> Arc<Self> {
        Self::new(true)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Queue the result of the next subscribe request.
    pub(crate) fn reply(&self, result: Result<SubscribeReply, SessionError>) {
        self.replies.0.send(result).unwrap();
    }

    /// Queue the result of the next token request.
    pub(crate) fn token(&self, result: Result<String, SessionError>) {
        self.tokens.0.send(result).unwrap();
    }

    /// Wait for the next close request.
    pub(crate) async fn next_close(&self) -> (String, bool) {
        self.closes.1.lock().await.recv().await.unwrap()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn subscribe_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Subscribe { channel, token } => Some((channel, token)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Close { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Session for MockSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_subscribe(
        &self,
        channel: &str,
        token: &str,
    ) -> Result<SubscribeReply, SessionError> {
        self.record(Call::Subscribe {
            channel: channel.to_string(),
            token: token.to_string(),
        });
        let next = self.replies.1.lock().await.recv().await;
        next.unwrap_or_else(|| Err(SessionError::Other("mock closed".to_string())))
    }

    async fn subscription_token(&self, channel: &str) -> Result<String, SessionError> {
        self.record(Call::Token(channel.to_string()));
        let next = self.tokens.1.lock().await.recv().await;
        next.unwrap_or_else(|| Err(SessionError::Other("mock closed".to_string())))
    }

    async fn unsubscribe(&self, channel: &str) {
        self.record(Call::Unsubscribe(channel.to_string()));
    }

    async fn publish(&self, channel: &str, data: Bytes) -> Result<(), SessionError> {
        self.record(Call::Publish {
            channel: channel.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn presence(&self, channel: &str) -> Result<HashMap<String, ClientInfo>, SessionError> {
        self.record(Call::Presence(channel.to_string()));
        let mut clients = HashMap::new();
        clients.insert("client-1".to_string(), ClientInfo::new("42", "client-1"));
        Ok(clients)
    }

    async fn presence_stats(&self, channel: &str) -> Result<PresenceStats, SessionError> {
        self.record(Call::PresenceStats(channel.to_string()));
        Ok(PresenceStats {
            num_clients: 1,
            num_users: 1,
        })
    }

    async fn history(&self, channel: &str) -> Result<Vec<Publication>, SessionError> {
        self.record(Call::History(channel.to_string()));
        Ok(vec![Publication::new("uid-1", b"hello".to_vec())])
    }

    async fn close(&self, reason: &str, reconnect: bool) {
        self.record(Call::Close {
            reason: reason.to_string(),
            reconnect,
        });
        let _ = self.closes.0.send((reason.to_string(), reconnect));
    }
}

/// A delegate notification as seen by a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notification {
    Success { resubscribe: bool, recovered: bool },
    Error { code: u32, message: String },
    Unsubscribe,
}

/// Delegate forwarding every notification into a channel.
pub(crate) struct RecordingDelegate {
    tx: mpsc::UnboundedSender<(String, Notification)>,
}

impl RecordingDelegate {
    pub(crate) fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<(String, Notification)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SubscriptionDelegate for RecordingDelegate {
    fn on_subscribe_success(&self, channel: &str, event: SubscribeSuccessEvent) {
        let _ = self.tx.send((
            channel.to_string(),
            Notification::Success {
                resubscribe: event.resubscribe,
                recovered: event.recovered,
            },
        ));
    }

    fn on_subscribe_error(&self, channel: &str, event: SubscribeErrorEvent) {
        let _ = self.tx.send((
            channel.to_string(),
            Notification::Error {
                code: event.code,
                message: event.message,
            },
        ));
    }

    fn on_unsubscribe(&self, channel: &str) {
        let _ = self.tx.send((channel.to_string(), Notification::Unsubscribe));
    }
}

pub(crate) fn test_config() -> Arc<ClientConfig> {
    Arc::new(ClientConfig {
        private_channel_prefix: "$".to_string(),
        timeout_ms: 1_000,
        max_subscriptions: 4,
    })
}

/// Let spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
