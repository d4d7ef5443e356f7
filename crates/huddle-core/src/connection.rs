//! Relay connection lifecycle.
//!
//! One background task owns the socket for the whole session and drives this
//! state machine:
//!
//! ```text
//!                 dial ok                      EOF / read error
//!  Disconnected ──────────> Connecting ──────────> Connected ──────────┐
//!       ▲                       │                                      │
//!       │     dial error        │                                      │
//!       └───────────────────────┘<─────── wait fixed delay ────────────┘
//! ```
//!
//! - Every connect or read failure is handled the same way: log it, go to
//!   `Disconnected`, wait the configured delay, dial again. No failure is
//!   treated as permanent; only an optional attempt cap ends the loop. A
//!   connection that ends before the relay sent a single line counts toward
//!   the cap like a failed dial.
//! - The task is the only writer. Outbound lines arrive on a FIFO channel and
//!   are written in submission order; while no socket exists they are dropped
//!   with a local notice.
//! - After connecting, the join notice is written before the outbound queue is
//!   drained. On shutdown the leave notice is written and given a short grace
//!   period to flush before the socket is closed. Writes never hold up a
//!   shutdown, and the leave write is bounded by the same grace period.
//! - Inbound lines longer than [`MAX_LINE_LEN`] are discarded and counted as
//!   format drops.

use std::io;
use std::sync::Arc;

use huddle_crypto::RoomKey;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{PresenceConfig, ReconnectPolicy};
use crate::dialer::Dialer;
use crate::router::{InboundMessage, MAX_LINE_LEN, ProtocolRouter, RouteOutcome};

/// Notice shown when a line cannot be written.
pub const SEND_FAILED_NOTICE: &str = "[!] Failed to send message";

/// Connection state reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket; waiting to retry or stopped
    #[default]
    Disconnected,
    /// Dial in progress
    Connecting,
    /// Socket open, lines flowing
    Connected,
}

/// Join notice text for `username`.
#[must_use]
pub fn join_notice(username: &str) -> String {
    format!("{username} has entered the chat room")
}

/// Leave notice text for `username`.
#[must_use]
pub fn leave_notice(username: &str) -> String {
    format!("{username} has left the chat room")
}

/// Controller-side ends of the channels connected to a [`ConnectionManager`].
#[derive(Debug)]
pub struct ConnectionLink {
    /// Complete wire lines to write, in order
    pub outbound: mpsc::UnboundedSender<String>,
    /// Set to `true` to stop the task
    pub shutdown: watch::Sender<bool>,
    /// Latest state
    pub state: watch::Receiver<ConnectionState>,
    /// Sender for locally generated notices
    pub notices: mpsc::UnboundedSender<InboundMessage>,
    /// Delivered messages
    pub messages: mpsc::UnboundedReceiver<InboundMessage>,
    /// Every state transition
    pub states: mpsc::UnboundedReceiver<ConnectionState>,
}

/// Session-specific settings of the connection task.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Name used in join/leave notices
    pub username: String,
    /// Retry behaviour
    pub reconnect: ReconnectPolicy,
    /// Join/leave behaviour
    pub presence: PresenceConfig,
}

/// How a connected phase ended.
enum Exit {
    Shutdown,
    /// Relay closed the stream (`error` is `None`) or the socket failed.
    /// `heard` is set if at least one line arrived first.
    Lost {
        error: Option<io::Error>,
        heard: bool,
    },
}

/// Owns the relay socket and runs the connect/read/retry loop.
pub struct ConnectionManager<D: Dialer, C: Clock> {
    dialer: D,
    clock: C,
    settings: ManagerSettings,
    router: ProtocolRouter,
    key: Arc<RoomKey>,
    outbound: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<InboundMessage>,
    states: mpsc::UnboundedSender<ConnectionState>,
    current: watch::Sender<ConnectionState>,
    announced: bool,
}

impl<D: Dialer, C: Clock> ConnectionManager<D, C> {
    /// Create a manager and the channels the controller uses to drive it.
    pub fn new(
        dialer: D,
        clock: C,
        settings: ManagerSettings,
        router: ProtocolRouter,
        key: Arc<RoomKey>,
    ) -> (Self, ConnectionLink) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (current_tx, current_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (states_tx, states_rx) = mpsc::unbounded_channel();

        let manager = Self {
            dialer,
            clock,
            settings,
            router,
            key,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
            events: events_tx.clone(),
            states: states_tx,
            current: current_tx,
            announced: false,
        };

        let link = ConnectionLink {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            state: current_rx,
            notices: events_tx,
            messages: events_rx,
            states: states_rx,
        };

        (manager, link)
    }

    /// Run until shutdown is requested, the controller goes away, or the
    /// attempt cap is exhausted.
    pub async fn run(mut self) {
        let _ = self.states.send(ConnectionState::Disconnected);
        let mut failures: u32 = 0;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);

            let dialed = {
                let dial = self.dialer.dial();
                tokio::pin!(dial);
                loop {
                    tokio::select! {
                        biased;
                        () = shutdown_requested(&mut self.shutdown) => {
                            self.set_state(ConnectionState::Disconnected);
                            return;
                        }
                        result = &mut dial => break result,
                        Some(line) = self.outbound.recv() => reject(&self.events, &line),
                    }
                }
            };

            match dialed {
                Ok(stream) => {
                    info!(endpoint = %self.dialer.endpoint(), "connected to relay");
                    match self.serve(stream).await {
                        Exit::Shutdown => {
                            self.set_state(ConnectionState::Disconnected);
                            return;
                        }
                        Exit::Lost { error, heard } => {
                            match error {
                                Some(e) => info!(error = %e, "relay connection lost"),
                                None => info!("relay closed the connection"),
                            }
                            // Only a relay that actually talked resets the count
                            failures = if heard { 0 } else { failures.saturating_add(1) };
                        }
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    debug!(
                        endpoint = %self.dialer.endpoint(),
                        error = %e,
                        attempt = failures,
                        "connect failed"
                    );
                }
            }

            self.set_state(ConnectionState::Disconnected);

            if self.settings.reconnect.exhausted(failures) {
                warn!(attempts = failures, "giving up on relay");
                let _ = self.events.send(InboundMessage::local(format!(
                    "[!] Could not reach the relay after {failures} attempts"
                )));
                return;
            }

            if !self.wait_before_retry().await {
                return;
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Drive one open connection until it ends.
    async fn serve(&mut self, stream: D::Stream) -> Exit {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        // Partial reads survive select cancellation in here
        let mut buf = Vec::with_capacity(1024);
        // Skipping the rest of an overlong line
        let mut discarding = false;
        let mut heard = false;

        self.set_state(ConnectionState::Connected);

        if !self.announced || self.settings.presence.announce_on_reconnect {
            let notice = join_notice(&self.settings.username);
            match self.router.seal_system(&self.key, &notice) {
                Ok(line) => match write_or_shutdown(&mut self.shutdown, &mut writer, &line).await {
                    None => {
                        self.leave(&mut writer).await;
                        return Exit::Shutdown;
                    }
                    Some(Ok(())) => self.announced = true,
                    Some(Err(e)) => {
                        return Exit::Lost {
                            error: Some(e),
                            heard,
                        };
                    }
                },
                Err(e) => warn!(error = %e, "could not seal join notice"),
            }
        }

        loop {
            // Always at least one byte: `buf` is cleared once it reaches the cap
            let limit = MAX_LINE_LEN.saturating_sub(buf.len()) as u64;
            let mut limited = (&mut reader).take(limit);

            tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => {
                    self.leave(&mut writer).await;
                    return Exit::Shutdown;
                }
                read = limited.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => return Exit::Lost { error: None, heard },
                    Ok(_) => {
                        heard = true;
                        let complete = buf.last() == Some(&b'\n');
                        if !complete && buf.len() >= MAX_LINE_LEN {
                            if !discarding {
                                self.router.drop_overlong();
                            }
                            discarding = true;
                        } else if discarding {
                            discarding = !complete;
                        } else {
                            let line = String::from_utf8_lossy(&buf);
                            self.deliver(line.strip_suffix('\n').unwrap_or(&line));
                        }
                        buf.clear();
                    }
                    Err(e) => return Exit::Lost { error: Some(e), heard },
                },
                Some(line) = self.outbound.recv() => {
                    match write_or_shutdown(&mut self.shutdown, &mut writer, &line).await {
                        None => {
                            self.leave(&mut writer).await;
                            return Exit::Shutdown;
                        }
                        Some(Ok(())) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "write to relay failed");
                            let _ = self.events.send(InboundMessage::local(SEND_FAILED_NOTICE));
                        }
                    }
                }
            }
        }
    }

    /// Best-effort leave notice, grace period, then close.
    ///
    /// The leave write and the close each get at most `leave_grace`, so a
    /// relay that stopped reading cannot stall shutdown.
    async fn leave<W: AsyncWrite + Unpin>(&self, writer: &mut W) {
        let grace = self.settings.presence.leave_grace;
        let notice = leave_notice(&self.settings.username);
        match self.router.seal_system(&self.key, &notice) {
            Ok(line) => match tokio::time::timeout(grace, write_line(writer, &line)).await {
                Ok(Ok(())) => self.clock.sleep(grace).await,
                Ok(Err(e)) => debug!(error = %e, "leave notice not delivered"),
                Err(_) => debug!("leave notice not flushed within the grace period"),
            },
            Err(e) => debug!(error = %e, "could not seal leave notice"),
        }

        let _ = tokio::time::timeout(grace, writer.shutdown()).await;
    }

    fn deliver(&self, line: &str) {
        if let RouteOutcome::Deliver(message) = self.router.route(&self.key, line) {
            let _ = self.events.send(message);
        }
    }

    /// Wait out the reconnect delay. Returns `false` if shutdown arrived first.
    async fn wait_before_retry(&mut self) -> bool {
        let sleep = self.clock.sleep(self.settings.reconnect.delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => return false,
                () = &mut sleep => return true,
                Some(line) = self.outbound.recv() => reject(&self.events, &line),
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = self.current.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            debug!(?state, "connection state");
            let _ = self.states.send(state);
        }
    }
}

/// Resolves once shutdown is requested or the controller is dropped.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Drop a line that has no socket to go to.
fn reject(events: &mpsc::UnboundedSender<InboundMessage>, line: &str) {
    debug!(bytes = line.len(), "no relay connection, dropping outbound line");
    let _ = events.send(InboundMessage::local(SEND_FAILED_NOTICE));
}

/// Write `line` unless shutdown is requested first. `None` means shutdown won
/// and the line may be partially written.
async fn write_or_shutdown<W: AsyncWrite + Unpin>(
    shutdown: &mut watch::Receiver<bool>,
    writer: &mut W,
    line: &str,
) -> Option<io::Result<()>> {
    tokio::select! {
        biased;
        () = shutdown_requested(shutdown) => None,
        written = write_line(writer, line) => Some(written),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
