//! Fuzz target for envelope sealing and decoding
//!
//! Arbitrary keys, nonces and payloads must never panic, and anything sealed
//! must open again.

#![no_main]

use arbitrary::Arbitrary;
use huddle_crypto::{Envelope, Nonce, RoomKey, aead};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct EnvelopeInput {
    key: [u8; 32],
    nonce: [u8; 12],
    plaintext: Vec<u8>,
    aad: Vec<u8>,
    encoded: String,
}

fuzz_target!(|input: EnvelopeInput| {
    let key = RoomKey::from_bytes(input.key);

    // Sealing must round-trip
    if let Ok(encoded) = aead::seal_with_nonce(
        &key,
        Nonce::from_bytes(input.nonce),
        &input.plaintext,
        &input.aad,
    ) {
        let opened = aead::decrypt(&key, &encoded, &input.aad);
        assert_eq!(opened.as_deref(), Ok(input.plaintext.as_slice()));
    }

    // Decoding arbitrary text must never panic
    let _ = aead::decrypt(&key, &input.encoded, &input.aad);

    // Raw bytes go through the length guard first
    if let Ok(envelope) = Envelope::from_bytes(&input.plaintext) {
        assert_eq!(envelope.to_bytes(), input.plaintext);
        let _ = envelope.open(&key, &input.aad);
    }
});
