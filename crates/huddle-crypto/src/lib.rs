//! # Huddle Crypto
//!
//! Cryptographic primitives for the Huddle group chat protocol.
//!
//! This crate provides:
//! - Deterministic room key derivation from a room name and passphrase
//! - `ChaCha20-Poly1305` envelopes carried as single-line base64 strings
//! - Secure random number generation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Parameters |
//! |----------|-----------|------------|
//! | Salt | SHA-256 (truncated) | first 16 bytes of `SHA-256(room)` |
//! | KDF | scrypt | N = 16384, r = 8, p = 1, 32-byte output |
//! | AEAD | ChaCha20-Poly1305 | 256-bit key, 96-bit nonce, 128-bit tag |
//! | Encoding | Base64 | standard alphabet, padded, unwrapped |
//!
//! Every participant of a room must use exactly these parameters; they are
//! constants, not configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod random;

pub use aead::{Envelope, Nonce, decrypt, encrypt};
pub use error::CryptoError;
pub use kdf::{RoomKey, derive_room_key, room_salt};

/// Room key size (32 bytes / 256 bits)
pub const KEY_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce size (12 bytes / 96 bits)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size (16 bytes / 128 bits)
pub const TAG_SIZE: usize = 16;

/// Salt size taken from the room name hash
pub const SALT_SIZE: usize = 16;

/// Smallest decodable envelope: nonce plus tag around an empty message
pub const MIN_ENVELOPE_SIZE: usize = NONCE_SIZE + TAG_SIZE;
