//! Fuzz target for inbound wire line routing
//!
//! Whatever the relay sends, routing must not panic and passthrough text must
//! come out unchanged.

#![no_main]

use huddle_core::{MessageOrigin, ProtocolConfig, ProtocolRouter, RouteOutcome};
use huddle_crypto::{KEY_SIZE, RoomKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let router = ProtocolRouter::new(&ProtocolConfig::default());
    let key = RoomKey::from_bytes([0x5a; KEY_SIZE]);

    let line = String::from_utf8_lossy(data);

    match router.route(&key, &line) {
        RouteOutcome::Deliver(msg) if msg.origin == MessageOrigin::Relay => {
            assert_eq!(msg.text, line.strip_suffix('\r').unwrap_or(&line));
        }
        _ => {}
    }
});
