//! The connecting side: a session-holding client with request helpers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use glam::Vec3;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;
use voxgate_protocol::messages::*;
use voxgate_protocol::{
    CodecConfig, FrameDecoder, Message, MessageKind, PacketProcessor,
};

use crate::{RequestError, RequestTracker};

/// Default wait for a correlated response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Asset payloads are bigger; they get a longer leash.
pub const ASSET_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection lifecycle of a [`Client`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ClientState {
    #[default]
    Idle,
    Connecting,
    /// Transport established, not yet authenticated.
    Connected,
    /// Entered on a successful login response.
    LoggedIn,
    Disconnecting,
}

struct Connection {
    outgoing: flume::Sender<Bytes>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

/// A voxgate client: one connection, request/response helpers, and a
/// push-message subscription.
pub struct Client {
    processor: Arc<PacketProcessor>,
    state: ClientState,
    conn: Option<Connection>,
    tracker: Arc<Mutex<RequestTracker>>,
    pushes: flume::Receiver<Message>,
    pushes_tx: flume::Sender<Message>,
    request_timeout: Duration,
    asset_timeout: Duration,
}

impl Client {
    pub fn new(codec: CodecConfig) -> Self {
        let (pushes_tx, pushes) = flume::unbounded();

        Self {
            processor: Arc::new(PacketProcessor::new(codec)),
            state: ClientState::Idle,
            conn: None,
            tracker: Arc::new(Mutex::new(RequestTracker::new())),
            pushes,
            pushes_tx,
            request_timeout: REQUEST_TIMEOUT,
            asset_timeout: ASSET_TIMEOUT,
        }
    }

    /// Overrides the default response wait, e.g. for tests that expect a
    /// timeout.
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    pub fn state(&self) -> ClientState {
        if let Some(conn) = &self.conn {
            if !conn.alive.load(Ordering::Acquire) {
                // The reader noticed the peer going away before we did.
                return ClientState::Idle;
            }
        }
        self.state
    }

    pub async fn connect(&mut self, addr: SocketAddr) -> anyhow::Result<()> {
        anyhow::ensure!(self.conn.is_none(), "already connected");

        self.state = ClientState::Connecting;

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.state = ClientState::Idle;
                return Err(e.into());
            }
        };
        let _ = stream.set_nodelay(true);

        let (mut reader, mut writer) = stream.into_split();
        let alive = Arc::new(AtomicBool::new(true));

        let processor = self.processor.clone();
        let tracker = self.tracker.clone();
        let pushes_tx = self.pushes_tx.clone();
        let reader_alive = alive.clone();

        let reader_task = tokio::spawn(async move {
            let mut dec = FrameDecoder::new();

            'io: loop {
                loop {
                    match dec.try_next_frame() {
                        Ok(Some(frame)) => match processor.deserialize(&frame) {
                            Ok(message) => {
                                if !tracker.lock().resolve(&message) {
                                    let _ = pushes_tx.send(message);
                                }
                            }
                            Err(e) => {
                                warn!("dropping undecodable frame: {e}");
                            }
                        },
                        Ok(None) => break,
                        Err(e) => {
                            warn!("framing error: {e}");
                            break 'io;
                        }
                    }
                }

                dec.reserve(4096);
                let mut buf = dec.take_capacity();

                match reader.read_buf(&mut buf).await {
                    Ok(0) => break,
                    Ok(_) => dec.queue_bytes(buf),
                    Err(e) => {
                        debug!("read error: {e}");
                        break;
                    }
                }
            }

            reader_alive.store(false, Ordering::Release);
            tracker.lock().cancel_all();
        });

        let (outgoing_tx, outgoing_rx) = flume::unbounded::<Bytes>();

        let writer_task = tokio::spawn(async move {
            while let Ok(bytes) = outgoing_rx.recv_async().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    debug!("write error: {e}");
                    break;
                }
            }
        });

        self.conn = Some(Connection {
            outgoing: outgoing_tx,
            reader_task,
            writer_task,
            alive,
        });
        self.state = ClientState::Connected;

        Ok(())
    }

    /// Tears the connection down and abandons every outstanding request.
    pub fn disconnect(&mut self) {
        self.state = ClientState::Disconnecting;
        self.conn = None;
        self.tracker.lock().cancel_all();
        self.state = ClientState::Idle;
    }

    fn require_connected(&self) -> Result<&Connection, RequestError> {
        let conn = self.conn.as_ref().ok_or(RequestError::NotConnected)?;

        if !conn.alive.load(Ordering::Acquire) {
            return Err(RequestError::Disconnected);
        }

        match self.state {
            ClientState::Connected | ClientState::LoggedIn => Ok(conn),
            _ => Err(RequestError::NotConnected),
        }
    }

    /// Sends a message without waiting for anything back.
    pub fn send(&self, message: &Message) -> Result<(), RequestError> {
        let conn = self.require_connected()?;

        let bytes = self.processor.serialize_to_bytes(message)?;
        conn.outgoing
            .send(bytes.freeze())
            .map_err(|_| RequestError::Disconnected)
    }

    async fn request(
        &self,
        request_id: Uuid,
        message: Message,
        timeout: Duration,
    ) -> Result<Message, RequestError> {
        self.require_connected()?;

        let rx = self.tracker.lock().track(request_id);
        self.send(&message)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(RequestError::Disconnected),
            Err(_) => {
                self.tracker.lock().cancel(request_id);
                Err(RequestError::Timeout)
            }
        }
    }

    pub async fn ping(&self) -> Result<Pong, RequestError> {
        let id = Uuid::new_v4();
        let response = self
            .request(id, Ping { request_id: id }.into(), self.request_timeout)
            .await?;

        match response {
            Message::Pong(pong) => Ok(pong),
            other => Err(RequestError::UnexpectedResponse(other.kind())),
        }
    }

    /// Authenticates and, on success, moves the session to `LoggedIn`.
    pub async fn login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, RequestError> {
        let id = Uuid::new_v4();
        let response = self
            .request(
                id,
                LoginRequest {
                    request_id: id,
                    email: email.to_owned(),
                    password: password.to_owned(),
                }
                .into(),
                self.request_timeout,
            )
            .await?;

        match response {
            Message::LoginResponse(login) => {
                if login.success {
                    self.state = ClientState::LoggedIn;
                }
                Ok(login)
            }
            other => Err(RequestError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn version(&self) -> Result<VersionResponse, RequestError> {
        let id = Uuid::new_v4();
        let response = self
            .request(id, VersionRequest { request_id: id }.into(), self.request_timeout)
            .await?;

        match response {
            Message::VersionResponse(version) => Ok(version),
            other => Err(RequestError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn asset(&self, name: &str) -> Result<AssetResponse, RequestError> {
        let id = Uuid::new_v4();
        let response = self
            .request(
                id,
                AssetRequest { request_id: id, name: name.to_owned() }.into(),
                self.asset_timeout,
            )
            .await?;

        match response {
            Message::AssetResponse(asset) => Ok(asset),
            other => Err(RequestError::UnexpectedResponse(other.kind())),
        }
    }

    pub async fn asset_list(&self) -> Result<AssetListResponse, RequestError> {
        let id = Uuid::new_v4();
        let response = self
            .request(id, AssetListRequest { request_id: id }.into(), self.asset_timeout)
            .await?;

        match response {
            Message::AssetListResponse(list) => Ok(list),
            other => Err(RequestError::UnexpectedResponse(other.kind())),
        }
    }

    /// Reports a movement to the server. Fire-and-forget; chunk streaming
    /// arrives as push messages.
    pub fn send_position(&self, position: Vec3, rotation: Vec3) -> Result<(), RequestError> {
        self.send(&PlayerPositionRequest { position, rotation }.into())
    }

    /// Explicitly pulls chunks by world origin.
    pub fn request_chunks(&self, origins: Vec<glam::IVec3>) -> Result<(), RequestError> {
        self.send(&ChunkRequest { origins }.into())
    }

    /// Next push message (chat, positions, chunks), if one is queued.
    pub fn try_recv_push(&self) -> Option<Message> {
        self.pushes.try_recv().ok()
    }

    /// Waits for the next push message.
    pub async fn recv_push(&self) -> Result<Message, RequestError> {
        self.pushes
            .recv_async()
            .await
            .map_err(|_| RequestError::Disconnected)
    }

    /// Waits for a push message of one specific kind, discarding others.
    pub async fn recv_push_of(&self, kind: MessageKind) -> Result<Message, RequestError> {
        loop {
            let message = self.recv_push().await?;
            if message.kind() == kind {
                return Ok(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_require_a_connection() {
        let client = Client::new(CodecConfig::default());

        assert!(matches!(
            client.send(&SystemChat { text: "hi".into() }.into()),
            Err(RequestError::NotConnected)
        ));
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[tokio::test]
    async fn ping_times_out_against_a_silent_server() {
        // A listener that accepts and then says nothing.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let mut client = Client::new(CodecConfig::default());
        client.connect(addr).await.unwrap();
        client.request_timeout = Duration::from_millis(50);

        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, RequestError::Timeout));
        assert_eq!(client.tracker.lock().outstanding(), 0);

        server.abort();
    }
}
