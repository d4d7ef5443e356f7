//! In-process line relay
//!
//! Behaves like the reference relay: every byte a client sends is forwarded to
//! every connected client, the sender included. The relay never inspects
//! payloads; it only splits on `\n` so it can record what went over the wire.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::STEP_TIMEOUT;

/// Broadcasting newline relay bound to an ephemeral localhost port
pub struct LineRelay {
    addr: SocketAddr,
    lines: broadcast::Sender<Arc<Vec<u8>>>,
    kick: watch::Sender<u64>,
    clients: watch::Receiver<usize>,
    log: Arc<Mutex<Vec<String>>>,
    accept_task: JoinHandle<()>,
}

impl LineRelay {
    /// Bind and start accepting clients.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        Self::start_with_banner(None).await
    }

    /// Like [`start`](Self::start), greeting each new client with `banner`.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start_with_banner(banner: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind relay");
        let addr = listener.local_addr().expect("relay addr");

        let (lines, _) = broadcast::channel(1024);
        let (kick, kick_rx) = watch::channel(0u64);
        let (clients_tx, clients) = watch::channel(0usize);
        let clients_tx = Arc::new(clients_tx);
        let log = Arc::new(Mutex::new(Vec::new()));
        let banner = banner.map(|b| format!("{b}\n"));

        let accept_task = {
            let lines = lines.clone();
            let mut kick_rx = kick_rx;
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    // Subscribe before the client task runs so nothing sent
                    // after accept is missed
                    let rx = lines.subscribe();
                    // Only kicks issued after this point apply to the new client
                    kick_rx.borrow_and_update();
                    let kicked = kick_rx.clone();
                    clients_tx.send_modify(|n| *n += 1);
                    tokio::spawn(serve_client(
                        stream,
                        lines.clone(),
                        rx,
                        kicked,
                        Arc::clone(&clients_tx),
                        Arc::clone(&log),
                        banner.clone(),
                    ));
                }
            })
        };

        Self {
            addr,
            lines,
            kick,
            clients,
            log,
            accept_task,
        }
    }

    /// Address clients should dial
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port clients should dial
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Send a raw line (a `\n` is appended) to every connected client.
    pub fn broadcast_raw(&self, line: &str) {
        let _ = self.lines.send(Arc::new(format!("{line}\n").into_bytes()));
    }

    /// Drop every current connection. The relay keeps accepting new ones.
    pub fn disconnect_all(&self) {
        self.kick.send_modify(|generation| *generation += 1);
    }

    /// Number of clients currently attached
    pub fn client_count(&self) -> usize {
        *self.clients.borrow()
    }

    /// Wait until exactly `count` clients are attached.
    ///
    /// # Panics
    ///
    /// Panics on timeout.
    pub async fn wait_for_clients(&self, count: usize) {
        let mut clients = self.clients.clone();
        tokio::time::timeout(STEP_TIMEOUT, clients.wait_for(|n| *n == count))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {count} relay clients"))
            .expect("relay stopped");
    }

    /// Every line any client has sent, in relay arrival order
    pub fn wire_log(&self) -> Vec<String> {
        self.log.lock().expect("relay log").clone()
    }
}

impl Drop for LineRelay {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.disconnect_all();
    }
}

async fn serve_client(
    stream: TcpStream,
    lines: broadcast::Sender<Arc<Vec<u8>>>,
    mut rx: broadcast::Receiver<Arc<Vec<u8>>>,
    mut kicked: watch::Receiver<u64>,
    clients: Arc<watch::Sender<usize>>,
    log: Arc<Mutex<Vec<String>>>,
    banner: Option<String>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    let greeted = match banner {
        Some(banner) => writer.write_all(banner.as_bytes()).await.is_ok(),
        None => true,
    };

    if greeted {
        loop {
            tokio::select! {
                _ = kicked.changed() => break,
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        log.lock()
                            .expect("relay log")
                            .push(line.trim_end_matches(['\r', '\n']).to_string());
                        let _ = lines.send(Arc::new(std::mem::take(&mut buf)));
                    }
                },
                forwarded = rx.recv() => match forwarded {
                    Ok(bytes) => {
                        if writer.write_all(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    clients.send_modify(|n| *n -= 1);
}
