//! # pulse-protocol
//!
//! Reply types shared between the Pulse connection layer and the
//! subscription core.
//!
//! The connection decodes server replies into these types; the subscription
//! core only interprets them. Framing and encoding stay in the connection.
//!
//! - `SubscribeReply` / `ReplyError` - outcome of a subscribe request
//! - `ClientInfo` / `PresenceStats` - presence lookups
//! - `Publication` - channel history entries
//!
//! ## Example
//!
//! ```rust
//! use pulse_protocol::{ReplyError, INTERNAL_ERROR_CODE};
//!
//! let err = ReplyError::new(INTERNAL_ERROR_CODE, "internal server error");
//! assert!(err.is_internal());
//! ```

pub mod presence;
pub mod reply;

pub use presence::{ClientInfo, PresenceStats, Publication};
pub use reply::{ReplyError, SubscribeReply, INTERNAL_ERROR_CODE};
