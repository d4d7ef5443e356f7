//! Session controller
//!
//! Wires the key, the router and the connection task together for one user in
//! one room, and exposes the small surface the presentation layer needs:
//! submit text, observe delivered messages and connection states, shut down.

use std::sync::Arc;

use huddle_crypto::{RoomKey, derive_room_key};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::clock::{Clock, TokioClock};
use crate::config::SessionConfig;
use crate::connection::{
    ConnectionManager, ConnectionState, ManagerSettings, SEND_FAILED_NOTICE,
};
use crate::dialer::{Dialer, TcpDialer};
use crate::error::{Result, SessionError};
use crate::router::{DropSnapshot, InboundMessage, ProtocolRouter};

/// What a user supplies to join a room
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Display name, prefixed to every chat line
    pub username: String,
    /// Room name; also the key derivation salt input
    pub room: String,
    /// Shared room passphrase
    pub passphrase: String,
}

impl Credentials {
    /// Bundle the three inputs
    pub fn new(
        username: impl Into<String>,
        room: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            room: room.into(),
            passphrase: passphrase.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(SessionError::invalid_config("username is empty"));
        }
        if self.username.contains(['\n', '\r']) {
            return Err(SessionError::invalid_config(
                "username must not contain line breaks",
            ));
        }
        if self.room.is_empty() {
            return Err(SessionError::invalid_config("room name is empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("room", &self.room)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Streams consumed by the presentation layer
#[derive(Debug)]
pub struct SessionStreams {
    /// Delivered room messages, relay text and local notices, in arrival order
    pub messages: mpsc::UnboundedReceiver<InboundMessage>,
    /// Every connection state transition, starting with `Disconnected`
    pub states: mpsc::UnboundedReceiver<ConnectionState>,
}

/// Handle to a running session
#[derive(Debug)]
pub struct SessionController {
    username: String,
    router: ProtocolRouter,
    key: Arc<RoomKey>,
    outbound: mpsc::UnboundedSender<String>,
    notices: mpsc::UnboundedSender<InboundMessage>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Derive the room key and start a session against the configured relay.
    ///
    /// Key derivation runs on the blocking pool. The returned controller is
    /// already connecting in the background.
    ///
    /// # Errors
    ///
    /// Returns a fatal error for an invalid config, unusable credentials or a
    /// failed key derivation. Connection failures are never returned here;
    /// the background task retries them.
    pub async fn start(
        config: SessionConfig,
        credentials: &Credentials,
    ) -> Result<(Self, SessionStreams)> {
        config.validate()?;
        credentials.validate()?;

        let room = credentials.room.clone();
        let passphrase = Zeroizing::new(credentials.passphrase.clone());
        let key = tokio::task::spawn_blocking(move || derive_room_key(&room, &passphrase))
            .await
            .map_err(|e| SessionError::TaskJoin(e.to_string().into()))??;

        info!(
            room = %credentials.room,
            relay = %config.server_addr(),
            "room key derived, starting session"
        );

        let dialer = TcpDialer::from_config(&config.server);
        Ok(Self::spawn(
            &config,
            credentials.username.clone(),
            Arc::new(key),
            dialer,
            TokioClock,
        ))
    }

    /// Start a session with an already derived key and explicit transport and
    /// timer. Must be called inside a tokio runtime.
    pub fn spawn<D: Dialer, C: Clock>(
        config: &SessionConfig,
        username: impl Into<String>,
        key: Arc<RoomKey>,
        dialer: D,
        clock: C,
    ) -> (Self, SessionStreams) {
        let username = username.into();
        let router = ProtocolRouter::new(&config.protocol);
        let settings = ManagerSettings {
            username: username.clone(),
            reconnect: config.reconnect,
            presence: config.presence,
        };

        let (manager, link) =
            ConnectionManager::new(dialer, clock, settings, router.clone(), Arc::clone(&key));
        let task = tokio::spawn(manager.run());

        let controller = Self {
            username,
            router,
            key,
            outbound: link.outbound,
            notices: link.notices,
            shutdown: link.shutdown,
            state: link.state,
            task,
        };

        let streams = SessionStreams {
            messages: link.messages,
            states: link.states,
        };

        (controller, streams)
    }

    /// Encrypt `plaintext` and queue it for the relay.
    ///
    /// Delivery is best effort. If there is no connection the line is dropped
    /// and a local notice appears on the message stream instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload could not be sealed or the connection
    /// task has stopped. A local notice is emitted in both cases.
    pub fn submit(&self, plaintext: &str) -> Result<()> {
        let line = match self.router.seal_user(&self.key, plaintext) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "could not seal outbound message");
                self.notify(SEND_FAILED_NOTICE);
                return Err(e.into());
            }
        };

        if self.outbound.send(line).is_err() {
            self.notify(SEND_FAILED_NOTICE);
            return Err(SessionError::channel("connection task has stopped"));
        }

        Ok(())
    }

    /// Send a chat line as `"<username>: <body>"`.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn send_chat(&self, body: &str) -> Result<()> {
        self.submit(&format!("{}: {}", self.username, body))
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Counts of protocol lines dropped so far
    #[must_use]
    pub fn drop_stats(&self) -> DropSnapshot {
        self.router.stats().snapshot()
    }

    /// Display name of this session
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Fingerprint of the room key, for comparing keys out of band
    #[must_use]
    pub fn key_fingerprint(&self) -> [u8; 8] {
        self.key.fingerprint()
    }

    /// Announce departure if connected, close the socket and wait for the
    /// connection task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TaskJoin`] if the connection task panicked.
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone after exhausting its attempt cap
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| SessionError::TaskJoin(e.to_string().into()))
    }

    fn notify(&self, text: &str) {
        let _ = self.notices.send(InboundMessage::local(text));
    }
}
