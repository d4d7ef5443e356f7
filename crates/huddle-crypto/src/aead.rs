//! `ChaCha20-Poly1305` message envelopes.
//!
//! Every chat message is sealed independently under the room key with a fresh
//! random nonce and carried on the wire as one base64 string:
//!
//! ```text
//! +----------------+---------------------------+----------------+
//! | Nonce (12B)    | Ciphertext (len(msg))     | Tag (16B)      |
//! +----------------+---------------------------+----------------+
//! ```
//!
//! ## Security Properties
//!
//! - Confidentiality: `ChaCha20` stream cipher
//! - Integrity: Poly1305 MAC with 128-bit security, verified before any
//!   plaintext is released
//! - Context binding: the associated data is a deployment-wide constant, so it
//!   binds ciphertexts to the protocol but does not distinguish senders or
//!   prevent replay
//!
//! A 96-bit random nonce must never repeat under one key; nonces are drawn
//! from the OS CSPRNG for every envelope.
//!
//! ## Usage
//!
//! ```ignore
//! use huddle_crypto::{aead, derive_room_key};
//!
//! let key = derive_room_key("alpha", "s3cret")?;
//! let line = aead::encrypt(&key, b"alice: hello", b"ctx-v1")?;
//! let plaintext = aead::decrypt(&key, &line, b"ctx-v1")?;
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    ChaCha20Poly1305,
    aead::{Aead, KeyInit, Payload},
};

use crate::kdf::RoomKey;
use crate::{CryptoError, MIN_ENVELOPE_SIZE, NONCE_SIZE, random};

/// ChaCha20-Poly1305 nonce (12 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Create a nonce from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a nonce from a slice.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; NONCE_SIZE] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Generate a fresh nonce from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomFailed`] if the OS CSPRNG fails.
    pub fn generate() -> Result<Self, CryptoError> {
        random::random_12().map(Self)
    }

    /// Get raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    fn as_generic(&self) -> &chacha20poly1305::Nonce {
        chacha20poly1305::Nonce::from_slice(&self.0)
    }
}

/// One sealed message: nonce plus ciphertext with the appended tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    nonce: Nonce,
    sealed: Vec<u8>,
}

impl Envelope {
    /// Seal `plaintext` under `key` with an explicit nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if AEAD encryption fails.
    pub fn seal(
        key: &RoomKey,
        nonce: Nonce,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Self, CryptoError> {
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

        let sealed = cipher
            .encrypt(
                nonce.as_generic(),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(Self { nonce, sealed })
    }

    /// Verify the tag and recover the plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::AuthenticationFailed`] if the tag does not
    /// verify; no plaintext bytes are released in that case.
    pub fn open(&self, key: &RoomKey, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

        cipher
            .decrypt(
                self.nonce.as_generic(),
                Payload {
                    msg: &self.sealed,
                    aad,
                },
            )
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// The nonce this envelope was sealed with.
    #[must_use]
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Ciphertext followed by the 16-byte tag.
    #[must_use]
    pub fn sealed(&self) -> &[u8] {
        &self.sealed
    }

    /// Serialize as `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.sealed.len());
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&self.sealed);
        out
    }

    /// Parse `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EnvelopeTooShort`] if `bytes` cannot hold a
    /// nonce and a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(CryptoError::EnvelopeTooShort {
                minimum: MIN_ENVELOPE_SIZE,
                actual: bytes.len(),
            });
        }

        let (nonce, sealed) = bytes.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce).ok_or(CryptoError::EnvelopeTooShort {
            minimum: MIN_ENVELOPE_SIZE,
            actual: bytes.len(),
        })?;

        Ok(Self {
            nonce,
            sealed: sealed.to_vec(),
        })
    }

    /// Encode as unwrapped standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode from base64. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidFormat`] for malformed base64 and
    /// [`CryptoError::EnvelopeTooShort`] for payloads under 28 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::InvalidFormat(e.to_string()))?;
        Self::from_bytes(&raw)
    }
}

/// Encrypt `plaintext` into a base64 envelope with a fresh random nonce.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if no nonce can be drawn and
/// [`CryptoError::EncryptionFailed`] if AEAD encryption fails.
pub fn encrypt(key: &RoomKey, plaintext: &[u8], aad: &[u8]) -> Result<String, CryptoError> {
    let nonce = Nonce::generate()?;
    seal_with_nonce(key, nonce, plaintext, aad)
}

/// Encrypt with a caller-chosen nonce.
///
/// Only for known-answer tests and interoperability checks; reusing a nonce
/// under the same key breaks both confidentiality and integrity.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if AEAD encryption fails.
pub fn seal_with_nonce(
    key: &RoomKey,
    nonce: Nonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<String, CryptoError> {
    Envelope::seal(key, nonce, plaintext, aad).map(|envelope| envelope.to_base64())
}

/// Decrypt a base64 envelope.
///
/// # Errors
///
/// Format errors are returned before any cryptographic work;
/// [`CryptoError::AuthenticationFailed`] is returned when the tag does not
/// verify under `key` and `aad`.
pub fn decrypt(key: &RoomKey, envelope_b64: &str, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Envelope::from_base64(envelope_b64)?.open(key, aad)
}
