//! Fuzz test for configuration file parsing
//!
//! Tests that arbitrary TOML input doesn't cause panics when parsed and
//! validated as a Huddle configuration.

#![no_main]

use huddle_cli::config::Config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try parsing as UTF-8 TOML
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<toml::Value, _> = toml::from_str(s);

        // Invalid configs are rejected, never panic
        if let Ok(config) = toml::from_str::<Config>(s) {
            if config.validate().is_ok() {
                let _ = config.to_session_config();
            }
        }
    }
});
