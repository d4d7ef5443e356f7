//! Room key derivation.
//!
//! A room key is a pure function of the room name and the passphrase:
//!
//! ```text
//! salt = SHA-256(room)[0..16]
//! key  = scrypt(passphrase, salt, N = 2^14, r = 8, p = 1, dkLen = 32)
//! ```
//!
//! Strings are hashed as their UTF-8 bytes with no normalization or trimming.
//! The cost parameters are fixed: any deviation produces a different key and
//! silently partitions the room.
//!
//! ## Usage
//!
//! ```rust
//! use huddle_crypto::kdf::derive_room_key;
//!
//! let a = derive_room_key("alpha", "secret").expect("kdf");
//! let b = derive_room_key("alpha", "secret").expect("kdf");
//! assert_eq!(a.as_bytes(), b.as_bytes());
//! ```

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, KEY_SIZE, SALT_SIZE};

/// scrypt CPU/memory cost as a power of two (N = 16384).
pub const SCRYPT_LOG_N: u8 = 14;

/// scrypt block size.
pub const SCRYPT_R: u32 = 8;

/// scrypt parallelization.
pub const SCRYPT_P: u32 = 1;

/// Symmetric key shared by every holder of the same room name and passphrase.
///
/// Held only in memory and zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RoomKey([u8; KEY_SIZE]);

impl RoomKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with extreme care - this exposes the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Short public fingerprint: first 8 bytes of `SHA-256(key)`.
    ///
    /// Lets participants compare keys out of band without revealing them.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 8] {
        let digest = Sha256::digest(self.0);
        let mut out = [0u8; 8];
        out.copy_from_slice(&digest[..8]);
        out
    }
}

impl PartialEq for RoomKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for RoomKey {}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey(<redacted>)")
    }
}

/// Compute the 16-byte salt for a room name.
#[must_use]
pub fn room_salt(room: &str) -> [u8; SALT_SIZE] {
    let digest = Sha256::digest(room.as_bytes());
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&digest[..SALT_SIZE]);
    salt
}

/// Derive the room key for `(room, passphrase)`.
///
/// This is deliberately slow (scrypt); callers on an async runtime should run
/// it on a blocking thread.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivationFailed`] if scrypt rejects its
/// parameters or output length. Neither happens with the fixed constants, so
/// a failure here is fatal and not worth retrying.
pub fn derive_room_key(room: &str, passphrase: &str) -> Result<RoomKey, CryptoError> {
    let salt = room_salt(room);

    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_SIZE)
        .map_err(|e| CryptoError::KeyDerivationFailed(format!("scrypt params: {e}")))?;

    let mut key = [0u8; KEY_SIZE];
    scrypt::scrypt(passphrase.as_bytes(), &salt, &params, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(format!("scrypt: {e}")))?;

    let room_key = RoomKey(key);
    key.zeroize();
    Ok(room_key)
}
