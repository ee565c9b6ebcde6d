#![doc = include_str!("../README.md")]

mod client;
mod correlator;
mod error;
mod session;
mod transport;

use std::sync::Arc;

use bytes::BytesMut;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use voxgate_loop::{LoopHandle, Priority};
use voxgate_protocol::messages::MessageBody;
use voxgate_protocol::{Message, MessageKind, PacketProcessor};

pub use client::{Client, ClientState, ASSET_TIMEOUT, REQUEST_TIMEOUT};
pub use correlator::RequestTracker;
pub use error::RequestError;
pub use session::{FacingSide, Session, SessionId};
pub use transport::{accept_all, AcceptPolicy, PeerId, ServerTransport, TransportEvent};

/// Session lifecycle notifications, observable by the game layer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SessionEvent {
    ClientConnected(SessionId),
    ClientDisconnected(SessionId),
}

/// A registered message listener: a stable name for metrics plus the
/// handler itself. Handlers run as individual event-loop actions and log
/// their own failures.
pub struct Listener<S> {
    name: String,
    handler: Box<
        dyn Fn(&mut S, &LoopHandle<S>, SessionId, &Message) -> anyhow::Result<()> + Send + Sync,
    >,
}

/// One message's worth of fan-out: the session it arrived on, the decoded
/// message, and the listeners to invoke. Produced by
/// [`SessionManager::pump`], consumed by [`dispatch`].
pub struct Dispatch<S> {
    pub session: SessionId,
    pub message: Message,
    pub listeners: Vec<Arc<Listener<S>>>,
}

/// Produces the hello messages pushed to a fresh session before it sends
/// anything.
pub type HelloFn = Box<dyn Fn(SessionId) -> Vec<Message> + Send + Sync>;

/// Owns every session and the transport endpoint, dispatches inbound
/// messages to listeners through the event loop, and provides targeted
/// and broadcast sends.
///
/// Generic over the loop state `S` so listener handlers mutate the domain
/// model directly, on the loop thread, with no locks.
pub struct SessionManager<S> {
    transport: ServerTransport,
    processor: Arc<PacketProcessor>,
    sessions: FxHashMap<SessionId, Session>,
    peer_index: FxHashMap<PeerId, SessionId>,
    next_session_id: u64,
    listeners: Vec<Vec<Arc<Listener<S>>>>,
    hello: Option<HelloFn>,
    observers: Vec<Box<dyn FnMut(SessionEvent) + Send>>,
    /// Reusable frame build buffer; split-and-freeze hands each frame out
    /// while keeping the allocation.
    write_buf: BytesMut,
}

impl<S: 'static> SessionManager<S> {
    pub fn new(transport: ServerTransport, processor: PacketProcessor) -> Self {
        Self {
            transport,
            processor: Arc::new(processor),
            sessions: FxHashMap::default(),
            peer_index: FxHashMap::default(),
            next_session_id: 1,
            listeners: (0..MessageKind::COUNT).map(|_| Vec::new()).collect(),
            hello: None,
            observers: Vec::new(),
            write_buf: BytesMut::new(),
        }
    }

    pub fn processor(&self) -> &PacketProcessor {
        &self.processor
    }

    pub fn transport(&self) -> &ServerTransport {
        &self.transport
    }

    /// Registers a raw listener for one message kind.
    pub fn add_listener(
        &mut self,
        kind: MessageKind,
        name: impl Into<String>,
        handler: impl Fn(&mut S, &LoopHandle<S>, SessionId, &Message) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    ) {
        self.listeners[kind as usize].push(Arc::new(Listener {
            name: name.into(),
            handler: Box::new(handler),
        }));
    }

    /// Registers a typed listener: the handler receives the concrete body
    /// of its message kind.
    pub fn on<T: MessageBody>(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut S, &LoopHandle<S>, SessionId, &T) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    ) {
        self.add_listener(T::KIND, name, move |state, loop_handle, session, message| {
            match T::from_message(message) {
                Some(body) => handler(state, loop_handle, session, body),
                None => Ok(()),
            }
        });
    }

    /// Sets the hello callback; its messages are sent to every fresh
    /// session on connect.
    pub fn set_hello(&mut self, hello: impl Fn(SessionId) -> Vec<Message> + Send + Sync + 'static) {
        self.hello = Some(Box::new(hello));
    }

    /// Observes connect/disconnect lifecycle events.
    pub fn observe(&mut self, observer: impl FnMut(SessionEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drains transport I/O and returns the listener fan-out work for
    /// this tick. Called exactly once per tick, from the loop thread;
    /// pass the result to [`dispatch`].
    pub fn pump(&mut self) -> Vec<Dispatch<S>> {
        let mut dispatches = Vec::new();

        for event in self.transport.poll() {
            match event {
                TransportEvent::PeerConnected { peer, addr } => {
                    let id = SessionId(self.next_session_id);
                    self.next_session_id += 1;

                    self.sessions.insert(id, Session::new(id, peer, addr));
                    self.peer_index.insert(peer, id);

                    info!(%id, %addr, "session connected");
                    self.emit(SessionEvent::ClientConnected(id));

                    let greetings = self.hello.as_ref().map(|hello| hello(id)).unwrap_or_default();
                    for message in greetings {
                        if let Err(e) = self.send_to_peer(peer, &message) {
                            warn!(%id, "failed to send hello message: {e:#}");
                        }
                    }
                }
                TransportEvent::PeerDisconnected { peer } => {
                    let Some(id) = self.peer_index.remove(&peer) else {
                        continue;
                    };

                    if let Some(mut session) = self.sessions.remove(&id) {
                        session.clear_sent_chunks();
                    }

                    info!(%id, "session disconnected");
                    self.emit(SessionEvent::ClientDisconnected(id));
                }
                TransportEvent::FrameReceived { peer, frame } => {
                    let Some(&id) = self.peer_index.get(&peer) else {
                        continue;
                    };

                    let message = match self.processor.deserialize(&frame) {
                        Ok(message) => message,
                        Err(e) => {
                            // Undecodable frames are dropped; the session
                            // lives on.
                            warn!(%id, kind = frame.kind, "dropping frame: {e}");
                            continue;
                        }
                    };

                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.touch();
                    }

                    let listeners = self.listeners[message.kind() as usize].clone();
                    if listeners.is_empty() {
                        debug!(%id, kind = message.kind().name(), "no listener registered");
                        continue;
                    }

                    dispatches.push(Dispatch { session: id, message, listeners });
                }
            }
        }

        dispatches
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
    }

    fn send_to_peer(&mut self, peer: PeerId, message: &Message) -> anyhow::Result<()> {
        let frame = self.processor.serialize(message)?;
        frame.encode(&mut self.write_buf)?;

        self.transport.send(peer, self.write_buf.split().freeze())
    }

    /// Sends one message to one session.
    pub fn send(&mut self, id: SessionId, message: &Message) -> anyhow::Result<()> {
        let Some(session) = self.sessions.get(&id) else {
            anyhow::bail!("{id} is not connected");
        };

        self.send_to_peer(session.peer(), message)
    }

    /// Sends one message to every connected session. The frame is built
    /// once.
    pub fn broadcast(&mut self, message: &Message) {
        let frame = match self.processor.serialize(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("broadcast serialization failed: {e}");
                return;
            }
        };

        if frame.encode(&mut self.write_buf).is_err() {
            return;
        }
        let bytes = self.write_buf.split().freeze();

        let peers: Vec<PeerId> = self.sessions.values().map(Session::peer).collect();
        for peer in peers {
            if let Err(e) = self.transport.send(peer, bytes.clone()) {
                debug!(%peer, "broadcast send failed: {e:#}");
            }
        }
    }

    /// Removes a session and its peer. The lifecycle event fires
    /// immediately rather than waiting for the transport echo.
    pub fn disconnect(&mut self, id: SessionId) {
        let Some(mut session) = self.sessions.remove(&id) else {
            return;
        };

        session.clear_sent_chunks();
        self.peer_index.remove(&session.peer());
        self.transport.disconnect(session.peer());

        info!(%id, "session disconnected by server");
        self.emit(SessionEvent::ClientDisconnected(id));
    }
}

/// Enqueues one event-loop action per listener of every dispatch. Each
/// action is named for metrics and failures are logged per listener, so
/// one buggy handler cannot starve its siblings.
pub fn dispatch<S: 'static>(dispatches: Vec<Dispatch<S>>, handle: &LoopHandle<S>) {
    for dispatch in dispatches {
        let Dispatch { session, message, listeners } = dispatch;

        for listener in listeners {
            let message = message.clone();

            handle.enqueue(Priority::Normal, listener.name.clone(), move |state, h| {
                (listener.handler)(state, h, session, &message)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use voxgate_loop::{EventLoop, LoopConfig};
    use voxgate_protocol::messages::{Ping, Pong, SystemChat};
    use voxgate_protocol::CodecConfig;

    use super::*;

    struct TestState {
        net: SessionManager<TestState>,
        pings: Vec<SessionId>,
    }

    async fn test_rig() -> (EventLoop<TestState>, TestState, std::net::SocketAddr) {
        let transport = ServerTransport::bind("127.0.0.1:0".parse().unwrap(), accept_all())
            .await
            .unwrap();
        let addr = transport.local_addr();

        let net = SessionManager::new(transport, PacketProcessor::new(CodecConfig::default()));
        let state = TestState { net, pings: Vec::new() };

        (EventLoop::new(LoopConfig::default()), state, addr)
    }

    async fn run_ticks(
        lp: &mut EventLoop<TestState>,
        state: &mut TestState,
        ticks: usize,
    ) {
        let handle = lp.handle();
        for _ in 0..ticks {
            let dispatches = state.net.pump();
            dispatch(dispatches, &handle);
            lp.tick(state);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn listeners_fan_out_and_can_reply() {
        let (mut lp, mut state, addr) = test_rig().await;

        state.net.on::<Ping>("ping-listener", |state, _, session, ping| {
            state.pings.push(session);
            state.net.send(
                session,
                &Pong { request_id: ping.request_id, timestamp_ms: 7 }.into(),
            )
        });

        let mut client = Client::new(CodecConfig::default());
        client.connect(addr).await.unwrap();

        let pong = tokio::select! {
            pong = client.ping() => pong,
            () = async {
                loop {
                    run_ticks(&mut lp, &mut state, 1).await;
                }
            } => unreachable!(),
        };

        assert_eq!(pong.unwrap().timestamp_ms, 7);
        assert_eq!(state.pings.len(), 1);
    }

    #[tokio::test]
    async fn hello_messages_greet_fresh_sessions() {
        let (mut lp, mut state, addr) = test_rig().await;

        state.net.set_hello(|id| {
            vec![SystemChat { text: format!("welcome {id}") }.into()]
        });

        let mut client = Client::new(CodecConfig::default());
        client.connect(addr).await.unwrap();

        run_ticks(&mut lp, &mut state, 10).await;

        let push = client.try_recv_push().expect("hello message expected");
        assert_eq!(
            push,
            SystemChat { text: "welcome session#1".into() }.into()
        );
    }

    #[tokio::test]
    async fn sessions_get_monotonic_ids_and_lifecycle_events() {
        let (mut lp, mut state, addr) = test_rig().await;

        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = events.clone();
        state.net.observe(move |event| sink.lock().push(event));

        let mut a = Client::new(CodecConfig::default());
        let mut b = Client::new(CodecConfig::default());
        a.connect(addr).await.unwrap();
        b.connect(addr).await.unwrap();

        run_ticks(&mut lp, &mut state, 10).await;
        assert_eq!(state.net.session_count(), 2);

        let ids: Vec<u64> = state.net.sessions().map(|s| s.id().0).collect();
        assert!(ids.contains(&1) && ids.contains(&2));

        a.disconnect();
        run_ticks(&mut lp, &mut state, 20).await;

        assert_eq!(state.net.session_count(), 1);
        let seen = events.lock().clone();
        assert!(seen.contains(&SessionEvent::ClientConnected(SessionId(1))));
        assert!(seen.contains(&SessionEvent::ClientDisconnected(SessionId(1))));
    }

    #[tokio::test]
    async fn server_side_disconnect_removes_the_session() {
        let (mut lp, mut state, addr) = test_rig().await;

        let mut client = Client::new(CodecConfig::default());
        client.connect(addr).await.unwrap();

        run_ticks(&mut lp, &mut state, 10).await;
        assert_eq!(state.net.session_count(), 1);

        state.net.disconnect(SessionId(1));
        assert_eq!(state.net.session_count(), 0);
        assert!(state.net.session(SessionId(1)).is_none());
    }
}
