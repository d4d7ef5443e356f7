//! Transport seam between the connection loop and the network.
//!
//! The connection task never opens sockets itself; it asks a [`Dialer`] for a
//! fresh byte stream on every attempt. Production code uses [`TcpDialer`];
//! tests plug in dialers that fail on cue or hand out in-memory duplex pipes.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::ServerConfig;

/// Opens one connection to the relay per call.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Byte stream produced by a successful dial.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Any error is treated as a transient connect failure by the caller.
    async fn dial(&self) -> io::Result<Self::Stream>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// TCP dialer with a bounded connect timeout.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
    timeout: Duration,
}

impl TcpDialer {
    /// Dial `addr` (`host:port`), giving up after `timeout`.
    #[must_use]
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Build from the relay section of a session config.
    #[must_use]
    pub fn from_config(server: &ServerConfig) -> Self {
        Self::new(
            format!("{}:{}", server.host, server.port),
            server.connect_timeout,
        )
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        // Chat lines are tiny; don't let Nagle hold them back
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn endpoint(&self) -> String {
        self.addr.clone()
    }
}
