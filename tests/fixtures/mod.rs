//! Test fixtures
//!
//! - [`LineRelay`]: in-process broadcast relay speaking the newline protocol
//! - [`FlakyDialer`], [`GatedDialer`] and [`RecordingClock`]: deterministic
//!   reconnection

mod line_relay;
mod scripted;

pub use line_relay::LineRelay;
pub use scripted::{FlakyDialer, GatedDialer, RecordingClock};

use huddle_core::{ConnectionState, InboundMessage, SessionStreams};
use std::time::Duration;

/// Upper bound for any single wait in the integration tests
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait until the session reports `state`.
///
/// # Panics
///
/// Panics if the state is not reached within [`STEP_TIMEOUT`].
pub async fn wait_for_state(streams: &mut SessionStreams, state: ConnectionState) {
    tokio::time::timeout(STEP_TIMEOUT, async {
        while let Some(next) = streams.states.recv().await {
            if next == state {
                return;
            }
        }
        panic!("state stream closed before reaching {state:?}");
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"));
}

/// Receive messages until one matches `predicate`, returning it.
///
/// # Panics
///
/// Panics on timeout or if the stream closes first.
pub async fn recv_matching<F>(streams: &mut SessionStreams, mut predicate: F) -> InboundMessage
where
    F: FnMut(&InboundMessage) -> bool,
{
    tokio::time::timeout(STEP_TIMEOUT, async {
        while let Some(message) = streams.messages.recv().await {
            if predicate(&message) {
                return message;
            }
        }
        panic!("message stream closed");
    })
    .await
    .expect("timed out waiting for message")
}

/// Collect every message that arrives within `window`.
pub async fn drain_for(streams: &mut SessionStreams, window: Duration) -> Vec<InboundMessage> {
    let mut collected = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(message)) =
        tokio::time::timeout_at(deadline, streams.messages.recv()).await
    {
        collected.push(message);
    }
    collected
}
