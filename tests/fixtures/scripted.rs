//! Deterministic transport and timer for reconnection tests

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huddle_core::{Clock, Dialer, TcpDialer};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

/// TCP dialer that refuses the first `failures` attempts
pub struct FlakyDialer {
    inner: TcpDialer,
    remaining_failures: AtomicU32,
    attempts: Arc<AtomicU32>,
}

impl FlakyDialer {
    /// Dial `addr`, failing the first `failures` attempts.
    pub fn new(addr: SocketAddr, failures: u32) -> Self {
        Self {
            inner: TcpDialer::new(addr.to_string(), Duration::from_secs(5)),
            remaining_failures: AtomicU32::new(failures),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared counter of dial attempts, successful or not
    pub fn attempts(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Dialer for FlakyDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> io::Result<TcpStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "flaky dialer refusal",
            ));
        }

        self.inner.dial().await
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

/// TCP dialer whose attempts block until the test opens the gate
pub struct GatedDialer {
    inner: TcpDialer,
    gate: Arc<Semaphore>,
}

impl GatedDialer {
    /// Dial `addr` once per permit released through the returned gate.
    pub fn new(addr: SocketAddr) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let dialer = Self {
            inner: TcpDialer::new(addr.to_string(), Duration::from_secs(5)),
            gate: Arc::clone(&gate),
        };
        (dialer, gate)
    }
}

#[async_trait]
impl Dialer for GatedDialer {
    type Stream = TcpStream;

    async fn dial(&self) -> io::Result<TcpStream> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| io::Error::other("gate closed"))?;
        permit.forget();
        self.inner.dial().await
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

/// Clock that records every requested delay and sleeps only briefly
#[derive(Clone, Default)]
pub struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    /// Delays requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("clock log").clone()
    }
}

impl Clock for RecordingClock {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.sleeps.lock().expect("clock log").push(duration);
        tokio::time::sleep(Duration::from_millis(1))
    }
}
