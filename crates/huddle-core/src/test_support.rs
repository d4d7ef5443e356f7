//! In-memory stand-ins for the network and the timer.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::DuplexStream;

use crate::clock::Clock;
use crate::dialer::Dialer;

/// Clock that records requested delays and returns at once.
#[derive(Clone, Default)]
pub(crate) struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for RecordingClock {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now()
    }
}

/// Dialer that plays back a script. `None` entries fail; once the script runs
/// out, dialing never completes.
#[derive(Clone, Default)]
pub(crate) struct ScriptedDialer {
    script: Arc<Mutex<VecDeque<Option<DuplexStream>>>>,
}

impl ScriptedDialer {
    pub(crate) fn push_failure(&self) {
        self.script.lock().unwrap().push_back(None);
    }

    /// Queue a successful dial and return the relay's end of the pipe.
    pub(crate) fn push_stream(&self) -> DuplexStream {
        self.push_stream_with_capacity(64 * 1024)
    }

    /// Like [`push_stream`](Self::push_stream) with `capacity` bytes of
    /// buffering in each direction.
    pub(crate) fn push_stream_with_capacity(&self, capacity: usize) -> DuplexStream {
        let (ours, theirs) = tokio::io::duplex(capacity);
        self.script.lock().unwrap().push_back(Some(ours));
        theirs
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Stream = DuplexStream;

    async fn dial(&self) -> io::Result<DuplexStream> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(stream)) => Ok(stream),
            Some(None) => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )),
            None => std::future::pending().await,
        }
    }

    fn endpoint(&self) -> String {
        "scripted".to_string()
    }
}
