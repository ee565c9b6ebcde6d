//! The transport adapter: reliable, ordered, connection-oriented frame
//! delivery.
//!
//! Each peer gets a reader task that reassembles length-prefixed frames
//! and a writer task that drains an outgoing channel. The core never
//! touches sockets directly; it calls [`ServerTransport::poll`] once per
//! event-loop tick and receives plain events.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use voxgate_protocol::{Frame, FrameDecoder};

/// Transport-level identity of one connected peer.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PeerId(pub u64);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// What the transport hands to the session manager each tick.
#[derive(Debug)]
pub enum TransportEvent {
    PeerConnected { peer: PeerId, addr: SocketAddr },
    PeerDisconnected { peer: PeerId },
    FrameReceived { peer: PeerId, frame: Frame },
}

/// Decides whether an inbound connection is admitted before any peer
/// state is allocated.
pub type AcceptPolicy = Arc<dyn Fn(SocketAddr) -> bool + Send + Sync>;

/// The accept-all default policy.
pub fn accept_all() -> AcceptPolicy {
    Arc::new(|_| true)
}

const READ_BUF_SIZE: usize = 4096;
/// Outgoing frames queued per peer before the peer is considered stalled
/// and dropped.
const OUTGOING_QUEUE_LIMIT: usize = 1024;

struct PeerState {
    outgoing: flume::Sender<Bytes>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Drop for PeerState {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

struct TransportShared {
    peers: Mutex<FxHashMap<PeerId, PeerState>>,
    events: flume::Sender<TransportEvent>,
    next_peer_id: AtomicU64,
}

/// The listening endpoint and its per-peer I/O tasks.
pub struct ServerTransport {
    shared: Arc<TransportShared>,
    events_rx: flume::Receiver<TransportEvent>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl ServerTransport {
    /// Binds the listener and starts accepting peers that pass `policy`.
    pub async fn bind(addr: SocketAddr, policy: AcceptPolicy) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (events_tx, events_rx) = flume::unbounded();

        let shared = Arc::new(TransportShared {
            peers: Mutex::new(FxHashMap::default()),
            events: events_tx,
            next_peer_id: AtomicU64::new(1),
        });

        let accept_shared = shared.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let (stream, remote) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };

                if !policy(remote) {
                    debug!(%remote, "connection rejected by accept policy");
                    continue;
                }

                admit_peer(&accept_shared, stream, remote);
            }
        });

        info!(%local_addr, "transport listening");

        Ok(Self {
            shared,
            events_rx,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Drains every event the I/O tasks queued since the last call.
    pub fn poll(&self) -> Vec<TransportEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Queues wire bytes to one peer. Fails when the peer is gone; a peer
    /// whose queue is full is stalled beyond saving and gets dropped.
    pub fn send(&self, peer: PeerId, bytes: Bytes) -> anyhow::Result<()> {
        let peers = self.shared.peers.lock();

        let Some(state) = peers.get(&peer) else {
            anyhow::bail!("{peer} is not connected");
        };

        match state.outgoing.try_send(bytes) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(_)) => {
                drop(peers);
                warn!(%peer, "outgoing queue full; dropping stalled peer");
                self.disconnect(peer);
                anyhow::bail!("{peer} stalled and was dropped");
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                anyhow::bail!("{peer} writer is gone");
            }
        }
    }

    /// Drops a peer's tasks and emits `PeerDisconnected`.
    pub fn disconnect(&self, peer: PeerId) {
        if self.shared.peers.lock().remove(&peer).is_some() {
            let _ = self
                .shared
                .events
                .send(TransportEvent::PeerDisconnected { peer });
        }
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers.lock().len()
    }
}

impl Drop for ServerTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.shared.peers.lock().clear();
    }
}

fn admit_peer(shared: &Arc<TransportShared>, stream: TcpStream, remote: SocketAddr) {
    let peer = PeerId(shared.next_peer_id.fetch_add(1, Ordering::Relaxed));

    if stream.set_nodelay(true).is_err() {
        debug!(%peer, "could not set nodelay");
    }

    let (mut reader, mut writer) = stream.into_split();

    let reader_shared = shared.clone();
    let reader_task = tokio::spawn(async move {
        let mut dec = FrameDecoder::new();

        loop {
            match dec.try_next_frame() {
                Ok(Some(frame)) => {
                    if reader_shared
                        .events
                        .send(TransportEvent::FrameReceived { peer, frame })
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    // Framing errors mean the stream is desynchronized;
                    // there is no way to resynchronize a corrupt length
                    // prefix.
                    warn!(%peer, "dropping peer after framing error: {e}");
                    break;
                }
            }

            dec.reserve(READ_BUF_SIZE);
            let mut buf = dec.take_capacity();

            match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(%peer, "read error: {e}");
                    break;
                }
            }

            dec.queue_bytes(buf);
        }

        // Reader exit is the single place peer teardown funnels through.
        if reader_shared.peers.lock().remove(&peer).is_some() {
            let _ = reader_shared
                .events
                .send(TransportEvent::PeerDisconnected { peer });
        }
    });

    let (outgoing_tx, outgoing_rx) = flume::bounded::<Bytes>(OUTGOING_QUEUE_LIMIT);

    let writer_task = tokio::spawn(async move {
        while let Ok(bytes) = outgoing_rx.recv_async().await {
            if let Err(e) = writer.write_all(&bytes).await {
                debug!(%peer, "write error: {e}");
                break;
            }
        }
    });

    shared.peers.lock().insert(
        peer,
        PeerState {
            outgoing: outgoing_tx,
            reader_task,
            writer_task,
        },
    );

    let _ = shared
        .events
        .send(TransportEvent::PeerConnected { peer, addr: remote });
}
