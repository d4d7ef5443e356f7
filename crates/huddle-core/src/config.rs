//! Session configuration
//!
//! Every value in [`ProtocolConfig`] must be identical for all participants of
//! a room; a mismatch silently partitions the room because peers can no longer
//! decrypt each other.

use std::time::Duration;

use crate::error::{Result, SessionError};

/// Default relay port
pub const DEFAULT_PORT: u16 = 23194;

/// Fixed delay between reconnection attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Bound on a single connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time given to the leave notice to flush before the socket closes
pub const DEFAULT_LEAVE_GRACE: Duration = Duration::from_millis(100);

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Relay endpoint
    pub server: ServerConfig,

    /// Wire protocol constants shared by the room
    pub protocol: ProtocolConfig,

    /// Reconnection policy
    pub reconnect: ReconnectPolicy,

    /// Join/leave announcements
    pub presence: PresenceConfig,
}

/// Relay endpoint configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Relay host name or address
    pub host: String,

    /// Relay TCP port
    pub port: u16,

    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Wire protocol constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Marks a line as carrying a base64 envelope
    pub message_prefix: String,

    /// Marks a decrypted payload as a system notice
    pub system_tag: String,

    /// Associated data bound to every envelope
    pub aad: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            message_prefix: "ENC:".to_string(),
            system_tag: "[SYS]".to_string(),
            aad: "chat-group-e2e-v1".to_string(),
        }
    }
}

/// Reconnection policy
///
/// The delay is fixed: no backoff and no jitter. Without a cap the loop retries
/// for the lifetime of the session, treating every failure as transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait between a failure and the next attempt
    pub delay: Duration,

    /// Consecutive failed attempts before giving up (`None` retries forever).
    ///
    /// A failed dial counts, and so does a connection that ends before the
    /// relay sent a single line. Receiving any line resets the count.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Returns true once `failures` consecutive attempts exhaust the cap
    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

/// Join/leave announcement configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Re-send the join notice after every reconnect, not only the first connect
    pub announce_on_reconnect: bool,

    /// Pause after writing the leave notice before closing the socket
    pub leave_grace: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            announce_on_reconnect: false,
            leave_grace: DEFAULT_LEAVE_GRACE,
        }
    }
}

impl SessionConfig {
    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if the relay endpoint is
    /// unusable, the message prefix is empty, or the reconnect delay is zero.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(SessionError::invalid_config("server host is empty"));
        }

        if self.server.port == 0 {
            return Err(SessionError::invalid_config("server port must not be 0"));
        }

        if self.server.connect_timeout.is_zero() {
            return Err(SessionError::invalid_config(
                "connect timeout must be non-zero",
            ));
        }

        // An empty prefix would classify every relay banner as an envelope
        if self.protocol.message_prefix.is_empty() {
            return Err(SessionError::invalid_config("message prefix is empty"));
        }

        if self.protocol.message_prefix.contains('\n') || self.protocol.system_tag.contains('\n')
        {
            return Err(SessionError::invalid_config(
                "protocol markers must not contain newlines",
            ));
        }

        if self.reconnect.delay.is_zero() {
            return Err(SessionError::invalid_config(
                "reconnect delay must be non-zero",
            ));
        }

        if self.reconnect.max_attempts == Some(0) {
            return Err(SessionError::invalid_config(
                "max reconnect attempts must be at least 1",
            ));
        }

        Ok(())
    }

    /// `host:port` of the relay
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
