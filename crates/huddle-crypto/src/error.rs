//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key derivation primitives failed or rejected their parameters
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Envelope is not valid base64
    #[error("invalid envelope format: {0}")]
    InvalidFormat(String),

    /// Decoded envelope is shorter than nonce plus tag
    #[error("envelope too short: expected at least {minimum} bytes, got {actual}")]
    EnvelopeTooShort {
        /// Minimum length
        minimum: usize,
        /// Actual length
        actual: usize,
    },

    /// AEAD encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// AEAD tag did not verify
    #[error("decryption failed: authentication failure")]
    AuthenticationFailed,

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,
}

impl CryptoError {
    /// Returns true for errors raised before any cryptographic operation ran
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CryptoError::InvalidFormat(_) | CryptoError::EnvelopeTooShort { .. }
        )
    }

    /// Returns true if the authentication tag was rejected
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(self, CryptoError::AuthenticationFailed)
    }
}
