//! Terminal rendering of session events.

use huddle_core::{ConnectionState, InboundMessage};

/// Render a delivered message for the terminal.
///
/// System notices are set off as `* text *`; everything else, including
/// relay banners and local notices, is shown as-is.
#[must_use]
pub fn render_message(message: &InboundMessage) -> String {
    if message.is_system {
        format!("* {} *", message.text)
    } else {
        message.text.clone()
    }
}

/// Render a connection state change.
///
/// `Connecting` shows as reconnecting only after the first connect; the very
/// first dial is not worth a line.
#[must_use]
pub fn render_state(state: ConnectionState, ever_connected: bool) -> Option<&'static str> {
    match state {
        ConnectionState::Connected => Some("(connected)"),
        ConnectionState::Connecting if ever_connected => Some("(reconnecting...)"),
        ConnectionState::Connecting => None,
        ConnectionState::Disconnected if ever_connected => Some("(disconnected)"),
        ConnectionState::Disconnected => None,
    }
}

/// Key fingerprint as colon-separated hex pairs.
#[must_use]
pub fn format_fingerprint(fingerprint: &[u8]) -> String {
    let hex = hex::encode(fingerprint);
    hex.as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
