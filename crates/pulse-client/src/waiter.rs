//! Waiters blocked on a subscription becoming active.
//!
//! A [`WaitSlot`] is shared between the subscription task, which resolves it
//! when the subscribe outcome is known, and a timer task, which resolves it
//! when the deadline passes. Whichever gets there first wins; the other
//! finds the slot already resolved and does nothing.

use crate::error::SubscriptionError;
use crate::metrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::trace;

/// Outcome delivered to a waiter.
pub(crate) type WaitOutcome = Result<(), SubscriptionError>;

/// Key identifying a waiter inside one subscription.
pub(crate) type WaiterKey = u64;

/// One-shot resolution slot for a single waiting caller.
#[derive(Debug)]
pub(crate) struct WaitSlot {
    resolved: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<WaitOutcome>>>,
    timer: Mutex<Option<AbortHandle>>,
}

impl WaitSlot {
    /// Create a slot and the receiver its caller awaits.
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<WaitOutcome>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            resolved: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
            timer: Mutex::new(None),
        });
        (slot, rx)
    }

    /// Resolve the slot.
    ///
    /// Returns `false` if it was already resolved, in which case `outcome`
    /// is discarded.
    pub(crate) fn resolve(&self, outcome: WaitOutcome) -> bool {
        self.finish(outcome, true)
    }

    /// Resolve the slot from its own timer with a timeout.
    pub(crate) fn expire(&self) -> bool {
        self.finish(Err(SubscriptionError::Timeout), false)
    }

    fn finish(&self, outcome: WaitOutcome, cancel_timer: bool) -> bool {
        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let timer = self.timer.lock().take();
        if let Some(timer) = timer.filter(|_| cancel_timer) {
            timer.abort();
        }
        if let Some(tx) = self.sender.lock().take() {
            // The caller may have stopped waiting.
            let _ = tx.send(outcome);
        }
        true
    }

    /// Whether the slot has been resolved.
    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Attach the deadline timer so it is cancelled on resolution.
    pub(crate) fn set_timer(&self, timer: AbortHandle) {
        if self.is_resolved() {
            timer.abort();
            return;
        }
        *self.timer.lock() = Some(timer);
    }
}

/// Pending waiters of one subscription.
///
/// Owned by the subscription task; never shared.
#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
    waiters: HashMap<WaiterKey, Arc<WaitSlot>>,
    next_key: WaiterKey,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a waiter and return its key.
    pub(crate) fn insert(&mut self, slot: Arc<WaitSlot>) -> WaiterKey {
        self.next_key += 1;
        let key = self.next_key;
        self.waiters.insert(key, slot);
        metrics::add_pending_waiters(1.0);
        trace!(key, pending = self.waiters.len(), "Waiter registered");
        key
    }

    /// Remove a waiter without resolving it.
    pub(crate) fn remove(&mut self, key: WaiterKey) -> Option<Arc<WaitSlot>> {
        let slot = self.waiters.remove(&key);
        if slot.is_some() {
            metrics::add_pending_waiters(-1.0);
            trace!(key, pending = self.waiters.len(), "Waiter removed");
        }
        slot
    }

    /// Resolve and remove every waiter with the same outcome.
    ///
    /// Returns how many waiters this call resolved.
    pub(crate) fn drain(&mut self, outcome: &WaitOutcome) -> usize {
        let count = self.waiters.len();
        if count > 0 {
            metrics::add_pending_waiters(-(count as f64));
        }

        self.waiters
            .drain()
            .filter(|(_, slot)| slot.resolve(outcome.clone()))
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}
