//! Error types for the session engine
//!
//! Errors are categorized by how the engine reacts to them:
//!
//! - **Fatal**: key derivation and invalid configuration end a session attempt
//!   before any connection is made, and are reported exactly once.
//! - **Transient**: connection and channel failures. The connection loop
//!   retries them with a fixed delay and never shows their detail to the user.
//!
//! Per-message codec failures never appear here: the router drops them and
//! counts them in [`DropStats`](crate::router::DropStats).

use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur in session operations
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Room key could not be derived
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// Connecting to or talking with the relay failed
    #[error("Connection error: {0}")]
    Connection(Cow<'static, str>),

    /// Channel send/receive error
    #[error("Channel error: {0}")]
    Channel(Cow<'static, str>),

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Socket I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Background task could not be joined
    #[error("Task join error: {0}")]
    TaskJoin(Cow<'static, str>),
}

impl SessionError {
    /// Returns true if the session cannot start or continue
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::KeyDerivation(_) | SessionError::InvalidConfig(_)
        )
    }

    /// Returns true if the connection loop retries this error
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::Connection(_) | SessionError::Io(_) | SessionError::Channel(_)
        )
    }

    /// Create a connection error with static context (zero allocation)
    #[must_use]
    pub const fn connection(context: &'static str) -> Self {
        SessionError::Connection(Cow::Borrowed(context))
    }

    /// Create an invalid configuration error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        SessionError::InvalidConfig(Cow::Borrowed(context))
    }

    /// Create a channel error with static context (zero allocation)
    #[must_use]
    pub const fn channel(context: &'static str) -> Self {
        SessionError::Channel(Cow::Borrowed(context))
    }
}

impl From<huddle_crypto::CryptoError> for SessionError {
    fn from(err: huddle_crypto::CryptoError) -> Self {
        match err {
            huddle_crypto::CryptoError::KeyDerivationFailed(detail) => {
                SessionError::KeyDerivation(detail)
            }
            other => SessionError::Crypto(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
