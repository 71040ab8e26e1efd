//! TCP event stream server
//!
//! Clients connect to the configured port and receive every event as a
//! framed JSON message. Delivery is fan-out: each client has its own
//! unbounded outbound queue drained by a dedicated writer task, so one slow
//! or stalled client never blocks the pipeline or other clients. A client
//! whose queue or socket dies is dropped and forgotten.
//!
//! The only inbound traffic is the CHECK_PERMISSIONS command; its reply
//! goes to the requesting client alone.

use crate::error::ServerError;
use crate::event::Event;
use crate::platform::PermissionProbe;
use crate::protocol;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Things the accept loop tells the daemon core
#[derive(Debug, Clone, Copy)]
pub enum ServerNotice {
    /// A new client finished connecting and should receive a device resync
    ClientAttached,
}

type ClientQueue = mpsc::UnboundedSender<Vec<u8>>;

/// Shared fan-out handle. Cloning is cheap; all clones address the same
/// client set.
#[derive(Clone, Default)]
pub struct Broadcaster {
    clients: Arc<Mutex<HashMap<u64, ClientQueue>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize once, enqueue for every connected client. Clients whose
    /// queue is gone are removed here.
    pub fn broadcast(&self, event: &Event) {
        let framed = match protocol::frame(event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to encode event {}: {}", event, e);
                return;
            }
        };

        let mut clients = self.clients.lock().unwrap();
        clients.retain(|id, queue| {
            if queue.send(framed.clone()).is_ok() {
                true
            } else {
                tracing::warn!("Dropping dead client {}", id);
                false
            }
        });
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    fn register(&self, id: u64, queue: ClientQueue) {
        self.clients.lock().unwrap().insert(id, queue);
    }

    fn unregister(&self, id: u64) {
        self.clients.lock().unwrap().remove(&id);
    }
}

/// Listening socket plus the accept loop
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind the listening socket. This is the daemon's one fatal failure
    /// mode: an occupied or unroutable address aborts startup.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!("Event stream listening on {}", addr);
        Ok(Self { listener })
    }

    /// Actual bound address, useful when the port was 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients forever. Each client gets a writer task and a reader
    /// task; `notices` tells the core to replay device state to newcomers.
    pub async fn run(
        self,
        broadcaster: Broadcaster,
        probe: Arc<dyn PermissionProbe>,
        notices: mpsc::UnboundedSender<ServerNotice>,
    ) {
        let next_id = AtomicU64::new(1);
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    continue;
                }
            };

            let id = next_id.fetch_add(1, Ordering::Relaxed);
            tracing::info!("Client {} connected from {}", id, peer);

            let (queue_tx, queue_rx) = mpsc::unbounded_channel();
            broadcaster.register(id, queue_tx.clone());

            tokio::spawn(serve_client(
                id,
                stream,
                queue_tx,
                queue_rx,
                broadcaster.clone(),
                probe.clone(),
            ));

            if notices.send(ServerNotice::ClientAttached).is_err() {
                tracing::warn!("Core is gone, stopping accept loop");
                return;
            }
        }
    }
}

async fn serve_client(
    id: u64,
    stream: TcpStream,
    queue_tx: ClientQueue,
    mut queue_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    broadcaster: Broadcaster,
    probe: Arc<dyn PermissionProbe>,
) {
    let (read_half, mut write_half) = stream.into_split();

    let writer = tokio::spawn(async move {
        while let Some(message) = queue_rx.recv().await {
            if let Err(e) = write_half.write_all(&message).await {
                tracing::debug!("Client {} write failed: {}", id, e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let command = line.trim();
                if command == protocol::CMD_CHECK_PERMISSIONS {
                    let granted = probe.granted().await;
                    tracing::info!(
                        "Client {} permission check: {}",
                        id,
                        if granted { "authorized" } else { "denied" }
                    );
                    match protocol::frame(&Event::Permission { granted }) {
                        Ok(reply) => {
                            // Reply only to the requester, not the fan-out.
                            let _ = queue_tx.send(reply);
                        }
                        Err(e) => tracing::error!("Failed to encode permission reply: {}", e),
                    }
                } else if !command.is_empty() {
                    tracing::debug!("Client {} sent unknown command {:?}", id, command);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Client {} read failed: {}", id, e);
                break;
            }
        }
    }

    broadcaster.unregister(id);
    writer.abort();
    tracing::info!("Client {} disconnected", id);
}
