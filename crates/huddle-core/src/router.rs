//! Wire line classification and routing.
//!
//! Every line the relay delivers is one of:
//!
//! ```text
//! <MESSAGE_PREFIX><base64 envelope>   protocol line, decrypted with the room key
//! anything else                       passthrough text (relay banners), shown verbatim
//! ```
//!
//! A decrypted payload that starts with the system tag is a system notice
//! (join/leave); the tag is stripped before delivery. The tag is plain text
//! inside the envelope, so any key holder can produce a system notice.
//!
//! Protocol lines that fail to decode or authenticate are dropped. Nothing is
//! shown to the user and nothing is re-requested; each drop is logged at
//! `debug` and counted in [`DropStats`]. Lines over [`MAX_LINE_LEN`] count as
//! format drops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use huddle_crypto::{CryptoError, RoomKey, aead};
use tracing::debug;

use crate::config::ProtocolConfig;

/// Longest inbound line accepted from the relay, newline included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Classification of a raw wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLine<'a> {
    /// Prefixed line; holds the base64 envelope with the prefix removed
    Protocol(&'a str),
    /// Unprefixed line to be shown as-is
    Passthrough(&'a str),
}

/// Where a delivered message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Decrypted from a room participant
    Room,
    /// Unencrypted text from the relay itself
    Relay,
    /// Notice generated by this client
    Local,
}

/// A message ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Display text (system tag already stripped)
    pub text: String,
    /// Payload carried the system tag
    pub is_system: bool,
    /// Source of the message
    pub origin: MessageOrigin,
}

impl InboundMessage {
    /// Notice produced locally, e.g. after a failed send.
    #[must_use]
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_system: false,
            origin: MessageOrigin::Local,
        }
    }
}

/// Why a protocol line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not base64, or shorter than nonce plus tag
    Format,
    /// Tag did not verify (wrong key, wrong AAD, or tampering)
    Authentication,
}

impl From<&CryptoError> for DropReason {
    fn from(err: &CryptoError) -> Self {
        if err.is_format_error() {
            DropReason::Format
        } else {
            DropReason::Authentication
        }
    }
}

/// Result of routing one wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Hand to the presentation layer
    Deliver(InboundMessage),
    /// Silently discarded
    Dropped(DropReason),
}

/// Drop counters, shared between the connection task and observers.
#[derive(Debug, Default)]
pub struct DropStats {
    format: AtomicU64,
    authentication: AtomicU64,
}

/// Point-in-time copy of [`DropStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropSnapshot {
    /// Lines that were not valid envelopes
    pub format: u64,
    /// Envelopes whose tag did not verify
    pub authentication: u64,
}

impl DropSnapshot {
    /// Total dropped lines
    #[must_use]
    pub fn total(&self) -> u64 {
        self.format + self.authentication
    }
}

impl DropStats {
    fn record(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Format => &self.format,
            DropReason::Authentication => &self.authentication,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    #[must_use]
    pub fn snapshot(&self) -> DropSnapshot {
        DropSnapshot {
            format: self.format.load(Ordering::Relaxed),
            authentication: self.authentication.load(Ordering::Relaxed),
        }
    }
}

/// Classifies inbound lines and frames outbound ones.
#[derive(Debug, Clone)]
pub struct ProtocolRouter {
    prefix: String,
    system_tag: String,
    aad: Vec<u8>,
    stats: Arc<DropStats>,
}

impl ProtocolRouter {
    /// Create a router for the given protocol constants
    #[must_use]
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            prefix: config.message_prefix.clone(),
            system_tag: config.system_tag.clone(),
            aad: config.aad.as_bytes().to_vec(),
            stats: Arc::new(DropStats::default()),
        }
    }

    /// Split a line into protocol or passthrough.
    #[must_use]
    pub fn classify<'a>(&self, line: &'a str) -> WireLine<'a> {
        match line.strip_prefix(self.prefix.as_str()) {
            Some(payload) => WireLine::Protocol(payload),
            None => WireLine::Passthrough(line),
        }
    }

    /// Strip the system tag, reporting whether it was present.
    #[must_use]
    pub fn split_system<'a>(&self, plaintext: &'a str) -> (&'a str, bool) {
        if self.system_tag.is_empty() {
            return (plaintext, false);
        }
        match plaintext.strip_prefix(self.system_tag.as_str()) {
            Some(rest) => (rest, true),
            None => (plaintext, false),
        }
    }

    /// Route one inbound line (without its `\n`; a trailing `\r` is ignored).
    pub fn route(&self, key: &RoomKey, line: &str) -> RouteOutcome {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let payload = match self.classify(line) {
            WireLine::Passthrough(text) => {
                return RouteOutcome::Deliver(InboundMessage {
                    text: text.to_string(),
                    is_system: false,
                    origin: MessageOrigin::Relay,
                });
            }
            WireLine::Protocol(payload) => payload,
        };

        match aead::decrypt(key, payload, &self.aad) {
            Ok(plaintext) => {
                let plaintext = String::from_utf8_lossy(&plaintext);
                let (text, is_system) = self.split_system(&plaintext);
                RouteOutcome::Deliver(InboundMessage {
                    text: text.to_string(),
                    is_system,
                    origin: MessageOrigin::Room,
                })
            }
            Err(err) => {
                let reason = DropReason::from(&err);
                self.stats.record(reason);
                debug!(?reason, error = %err, "dropping undecryptable line");
                RouteOutcome::Dropped(reason)
            }
        }
    }

    /// Seal a user payload into a complete wire line (including `\n`).
    ///
    /// # Errors
    ///
    /// Propagates nonce generation or encryption failures.
    pub fn seal_user(&self, key: &RoomKey, text: &str) -> Result<String, CryptoError> {
        self.seal_line(key, text.as_bytes())
    }

    /// Seal a system notice (`SYSTEM_TAG + text`) into a complete wire line.
    ///
    /// # Errors
    ///
    /// Propagates nonce generation or encryption failures.
    pub fn seal_system(&self, key: &RoomKey, text: &str) -> Result<String, CryptoError> {
        let payload = format!("{}{}", self.system_tag, text);
        self.seal_line(key, payload.as_bytes())
    }

    fn seal_line(&self, key: &RoomKey, plaintext: &[u8]) -> Result<String, CryptoError> {
        let envelope = aead::encrypt(key, plaintext, &self.aad)?;
        Ok(format!("{}{}\n", self.prefix, envelope))
    }

    /// Count an inbound line discarded for exceeding [`MAX_LINE_LEN`].
    pub fn drop_overlong(&self) -> RouteOutcome {
        self.stats.record(DropReason::Format);
        debug!(limit = MAX_LINE_LEN, "dropping overlong line");
        RouteOutcome::Dropped(DropReason::Format)
    }

    /// Shared drop counters
    #[must_use]
    pub fn stats(&self) -> Arc<DropStats> {
        Arc::clone(&self.stats)
    }
}
