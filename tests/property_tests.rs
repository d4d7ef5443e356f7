//! Property-based tests for Huddle
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Envelope Properties
// ============================================================================

mod envelope_properties {
    use super::*;
    use huddle_crypto::{CryptoError, Envelope, KEY_SIZE, MIN_ENVELOPE_SIZE, RoomKey, aead};

    fn key(seed: u8) -> RoomKey {
        RoomKey::from_bytes([seed; KEY_SIZE])
    }

    proptest! {
        /// Sealing then opening with the same key and AAD yields the plaintext
        #[test]
        fn seal_open_roundtrip(
            seed in any::<u8>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..2048),
            aad in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let key = key(seed);
            let encoded = aead::encrypt(&key, &plaintext, &aad).unwrap();
            prop_assert_eq!(aead::decrypt(&key, &encoded, &aad).unwrap(), plaintext);
        }

        /// Envelope length is always nonce + plaintext + tag
        #[test]
        fn envelope_length(plaintext in prop::collection::vec(any::<u8>(), 0..1024)) {
            let encoded = aead::encrypt(&key(1), &plaintext, b"aad").unwrap();
            let envelope = Envelope::from_base64(&encoded).unwrap();
            prop_assert_eq!(envelope.to_bytes().len(), MIN_ENVELOPE_SIZE + plaintext.len());
        }

        /// Any single-byte modification is detected
        #[test]
        fn tamper_detected(
            plaintext in prop::collection::vec(any::<u8>(), 0..256),
            position in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let key = key(7);
            let encoded = aead::encrypt(&key, &plaintext, b"aad").unwrap();
            let mut raw = Envelope::from_base64(&encoded).unwrap().to_bytes();
            let i = position.index(raw.len());
            raw[i] ^= mask;

            let tampered = Envelope::from_bytes(&raw).unwrap();
            prop_assert_eq!(tampered.open(&key, b"aad"), Err(CryptoError::AuthenticationFailed));
        }

        /// Payloads shorter than nonce + tag never reach the cipher
        #[test]
        fn short_payload_rejected(raw in prop::collection::vec(any::<u8>(), 0..MIN_ENVELOPE_SIZE)) {
            let is_too_short = matches!(
                Envelope::from_bytes(&raw),
                Err(CryptoError::EnvelopeTooShort { .. })
            );
            prop_assert!(is_too_short);
        }

        /// Decrypting arbitrary text never panics and never authenticates
        #[test]
        fn arbitrary_text_never_authenticates(text in ".{0,200}") {
            prop_assert!(aead::decrypt(&key(3), &text, b"aad").is_err());
        }

        /// A different key never opens an envelope
        #[test]
        fn wrong_key_rejected(
            a in any::<u8>(),
            b in any::<u8>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            prop_assume!(a != b);
            let encoded = aead::encrypt(&key(a), &plaintext, b"aad").unwrap();
            prop_assert_eq!(
                aead::decrypt(&key(b), &encoded, b"aad"),
                Err(CryptoError::AuthenticationFailed)
            );
        }
    }
}

// ============================================================================
// Wire Line Properties
// ============================================================================

mod wire_properties {
    use super::*;
    use huddle_core::{MessageOrigin, ProtocolConfig, ProtocolRouter, RouteOutcome, WireLine};
    use huddle_crypto::{KEY_SIZE, RoomKey};

    fn router() -> ProtocolRouter {
        ProtocolRouter::new(&ProtocolConfig::default())
    }

    fn key() -> RoomKey {
        RoomKey::from_bytes([0x21; KEY_SIZE])
    }

    proptest! {
        /// Lines are protocol lines exactly when they carry the prefix
        #[test]
        fn classification_follows_prefix(line in ".{0,120}") {
            let router = router();
            match router.classify(&line) {
                WireLine::Protocol(payload) => {
                    prop_assert!(line.starts_with("ENC:"));
                    prop_assert_eq!(payload, &line[4..]);
                }
                WireLine::Passthrough(text) => {
                    prop_assert!(!line.starts_with("ENC:"));
                    prop_assert_eq!(text, line.as_str());
                }
            }
        }

        /// Sealed user text routes back unchanged and never as a system notice
        #[test]
        fn user_text_roundtrip(text in "[^\\[].{0,200}") {
            let router = router();
            let key = key();
            let line = router.seal_user(&key, &text).unwrap();
            prop_assert!(line.ends_with('\n'));
            prop_assert_eq!(line.matches('\n').count(), 1);

            match router.route(&key, line.trim_end_matches('\n')) {
                RouteOutcome::Deliver(msg) => {
                    prop_assert_eq!(msg.text, text);
                    prop_assert!(!msg.is_system);
                    prop_assert_eq!(msg.origin, MessageOrigin::Room);
                }
                RouteOutcome::Dropped(reason) => prop_assert!(false, "dropped: {:?}", reason),
            }
        }

        /// System notices keep their flag and lose their tag
        #[test]
        fn system_text_roundtrip(text in ".{0,200}") {
            let router = router();
            let key = key();
            let line = router.seal_system(&key, &text).unwrap();

            match router.route(&key, line.trim_end_matches('\n')) {
                RouteOutcome::Deliver(msg) => {
                    prop_assert!(msg.is_system);
                    prop_assert_eq!(msg.text, text);
                }
                RouteOutcome::Dropped(reason) => prop_assert!(false, "dropped: {:?}", reason),
            }
        }

        /// Routing arbitrary input never panics; passthrough lines are verbatim
        #[test]
        fn route_total(line in "[^\r\n]{0,200}") {
            let router = router();
            match router.route(&key(), &line) {
                RouteOutcome::Deliver(msg) => {
                    if !line.starts_with("ENC:") {
                        prop_assert_eq!(msg.text, line);
                        prop_assert_eq!(msg.origin, MessageOrigin::Relay);
                    }
                }
                RouteOutcome::Dropped(_) => prop_assert!(line.starts_with("ENC:")),
            }
        }
    }
}
