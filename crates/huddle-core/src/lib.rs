//! # Huddle Core
//!
//! Session engine for Huddle, a shared-passphrase encrypted group chat that
//! runs over an untrusted line relay.
//!
//! This crate provides:
//! - Wire line classification and framing ([`router`])
//! - The reconnecting relay connection ([`connection`])
//! - The session controller used by front ends ([`session`])
//! - Configuration and error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SessionController                          │
//! │   (submit text, message and state streams, shutdown)            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      ConnectionManager                          │
//! │   (single socket owner, FIFO writer, fixed-delay reconnect)     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      ProtocolRouter                             │
//! │   (prefix / system tag framing over huddle-crypto envelopes)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The relay sees only `ENC:`-prefixed base64 lines. It cannot read, forge or
//! alter room traffic, but it can drop, delay or replay lines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod connection;
pub mod dialer;
pub mod error;
pub mod router;
pub mod session;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, TokioClock};
pub use config::{PresenceConfig, ProtocolConfig, ReconnectPolicy, ServerConfig, SessionConfig};
pub use connection::{ConnectionManager, ConnectionState, join_notice, leave_notice};
pub use dialer::{Dialer, TcpDialer};
pub use error::{Result, SessionError};
pub use router::{
    DropReason, DropSnapshot, DropStats, InboundMessage, MAX_LINE_LEN, MessageOrigin,
    ProtocolRouter, RouteOutcome, WireLine,
};
pub use session::{Credentials, SessionController, SessionStreams};
