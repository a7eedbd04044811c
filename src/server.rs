//! UDP frame-stream listener
//!
//! Binds a single UDP socket and demultiplexes datagrams into logical
//! connections, one per remote peer address. Each connection runs its own
//! receive loop on the runtime: datagrams feed a length-prefix decoder,
//! reassembled payloads are post-processed and handed to the consumer as
//! [`ServerEvent`]s. Frame delivery is fire-and-forget; a slow consumer
//! costs frames, never blocks a receive loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time;

use crate::error::{Result, ScreenWireError};
use crate::frame::{FrameDecoder, DEFAULT_MAX_FRAME_LEN};
use crate::payload::{self, DecodedPayload, PayloadConvention};

/// Port the reference sender transmits to
pub const DEFAULT_PORT: u16 = 5120;

/// Largest datagram one socket read can return
const RECV_BUFFER_SIZE: usize = 65536;

/// Consumer-facing event queue depth
const EVENT_QUEUE_DEPTH: usize = 256;

/// Per-connection datagram queue depth
const DATAGRAM_QUEUE_DEPTH: usize = 64;

/// Events sent from the listener to the consumer
#[derive(Debug)]
pub enum ServerEvent {
    /// First datagram seen from a new peer
    ClientConnected { id: u32, peer: SocketAddr },
    /// Connection torn down (framing error or idle timeout)
    ClientDisconnected { id: u32 },
    /// A reassembled, post-processed frame
    Frame { id: u32, payload: DecodedPayload },
}

/// Handle to a running listener
pub struct ServerHandle {
    /// Channel to receive events; dropping it shuts the listener down
    pub events: mpsc::Receiver<ServerEvent>,
    /// Address the socket actually bound (useful with port 0)
    pub local_addr: SocketAddr,
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub max_clients: usize,
    /// How frame payloads are interpreted after reassembly
    pub convention: PayloadConvention,
    /// Declared lengths above this close the connection
    pub max_frame_len: u32,
    /// Tear down a connection after this long without a datagram
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_clients: 16,
            convention: PayloadConvention::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            idle_timeout: None,
        }
    }
}

/// Bind the socket and start accepting frame streams
///
/// A bind failure is fatal and returned to the caller; everything after
/// that is handled per connection or per frame inside the spawned loops.
pub async fn start_server(config: ServerConfig) -> Result<ServerHandle> {
    let socket = UdpSocket::bind(config.bind_addr)
        .await
        .map_err(|source| ScreenWireError::Bind {
            addr: config.bind_addr,
            source,
        })?;
    let local_addr = socket.local_addr()?;

    info!("🚀 Listening for frame streams on udp://{}", local_addr);

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

    tokio::spawn(accept_loop(socket, config, event_tx));

    Ok(ServerHandle {
        events: event_rx,
        local_addr,
    })
}

/// Read datagrams off the shared socket and route them by peer address
///
/// UDP has no accept step, so a connection begins with the first datagram
/// from an unknown peer and the socket stays shared across all of them.
async fn accept_loop(socket: UdpSocket, config: ServerConfig, event_tx: mpsc::Sender<ServerEvent>) {
    let mut connections: HashMap<SocketAddr, mpsc::Sender<Bytes>> = HashMap::new();
    let mut next_client_id: u32 = 1;
    let mut read_buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut read_buf) => {
                let (n, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        // Transient by contract on UDP; keep the socket alive
                        error!("❌ Socket read error: {}", e);
                        continue;
                    }
                };

                let datagram = Bytes::copy_from_slice(&read_buf[..n]);

                // Route to the peer's connection if one is open
                let datagram = if let Some(tx) = connections.get(&peer) {
                    match tx.try_send(datagram) {
                        Ok(()) => continue,
                        Err(TrySendError::Full(_)) => {
                            debug!("Client queue full, dropping {} bytes from {}", n, peer);
                            continue;
                        }
                        Err(TrySendError::Closed(datagram)) => {
                            // Receive loop already exited; let this datagram
                            // open a fresh connection with clean decoder state
                            connections.remove(&peer);
                            datagram
                        }
                    }
                } else {
                    datagram
                };

                // Entries whose loop exited on its own don't count toward the cap
                if connections.len() >= config.max_clients {
                    connections.retain(|_, tx| !tx.is_closed());
                }
                if connections.len() >= config.max_clients {
                    warn!(
                        "⚠️ Client limit ({}) reached, ignoring datagram from {}",
                        config.max_clients, peer
                    );
                    continue;
                }

                let id = next_client_id;
                next_client_id += 1;

                let (datagram_tx, datagram_rx) = mpsc::channel(DATAGRAM_QUEUE_DEPTH);
                // A fresh queue always has room for the datagram that opened it
                let _ = datagram_tx.try_send(datagram);
                connections.insert(peer, datagram_tx);

                info!("✅ Client {} connected from {}", id, peer);
                if event_tx
                    .send(ServerEvent::ClientConnected { id, peer })
                    .await
                    .is_err()
                {
                    return;
                }

                tokio::spawn(connection_loop(
                    id,
                    peer,
                    datagram_rx,
                    config.convention,
                    config.max_frame_len,
                    config.idle_timeout,
                    event_tx.clone(),
                ));
            }

            _ = event_tx.closed() => {
                info!("👋 Consumer gone, shutting down listener");
                return;
            }
        }
    }
}

/// Per-connection receive loop: reassemble, post-process, deliver
///
/// Frame-scoped failures (unrecognized image, wrong pixel count, refused
/// allocation) drop that frame and keep going. A malformed length prefix
/// is not recoverable without a resync point, so it closes the connection.
async fn connection_loop(
    id: u32,
    peer: SocketAddr,
    mut datagrams: mpsc::Receiver<Bytes>,
    convention: PayloadConvention,
    max_frame_len: u32,
    idle_timeout: Option<Duration>,
    event_tx: mpsc::Sender<ServerEvent>,
) {
    let mut decoder = FrameDecoder::with_limit(max_frame_len);

    loop {
        let received = match idle_timeout {
            Some(limit) => match time::timeout(limit, datagrams.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    info!("⏰ Client {} idle for {:?}, closing", id, limit);
                    break;
                }
            },
            None => datagrams.recv().await,
        };

        let datagram = match received {
            Some(datagram) => datagram,
            None => break,
        };

        let frames = match decoder.feed(&datagram) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("⚠️ Client {}: {}, closing connection", id, e);
                break;
            }
        };

        for frame in frames {
            match payload::process(frame, convention) {
                Ok(payload) => match event_tx.try_send(ServerEvent::Frame { id, payload }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!("Event queue full, dropping frame from client {}", id);
                    }
                    Err(TrySendError::Closed(_)) => return,
                },
                Err(e) => {
                    warn!("⚠️ Client {}: dropping frame: {}", id, e);
                }
            }
        }
    }

    info!("👋 Client {} ({}) disconnected", id, peer);
    let _ = event_tx.send(ServerEvent::ClientDisconnected { id }).await;
}
