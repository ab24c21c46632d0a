//! # pulse-client
//!
//! Channel subscription lifecycle for Pulse clients.
//!
//! This crate tracks each channel subscription a client holds:
//!
//! - **Subscription** - per-channel state machine with serialized updates
//! - **Waiters** - operations blocked until their subscription is active
//! - **Registry** - one subscription per channel, reconnect fan-out
//! - **Delegate** - ordered lifecycle notifications
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │  Registry   │────▶│ Subscription │────▶│   Session   │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  Delegate   │
//!                     └─────────────┘
//! ```
//!
//! The connection itself is supplied by the application through the
//! [`Session`] trait.

pub mod config;
pub mod delegate;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod subscription;

mod waiter;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use delegate::{
    NoopDelegate, SubscribeErrorEvent, SubscribeSuccessEvent, SubscriptionDelegate,
};
pub use error::{RegistryError, SessionError, SubscriptionError};
pub use registry::SubscriptionRegistry;
pub use session::Session;
pub use subscription::{Subscription, SubscriptionSnapshot, SubscriptionStatus};
