//! Request/response correlation.

use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;
use voxgate_protocol::Message;

/// Parks a future per outstanding request id and resolves it when the
/// matching response arrives.
///
/// Request ids are only unique within one session's outstanding requests,
/// so each connection owns its own tracker.
#[derive(Default)]
pub struct RequestTracker {
    pending: FxHashMap<Uuid, oneshot::Sender<Message>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an outstanding request and returns the receiver its
    /// response will arrive on. A duplicate id replaces (and thereby
    /// cancels) the previous entry.
    pub fn track(&mut self, request_id: Uuid) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();

        if self.pending.insert(request_id, tx).is_some() {
            debug!(%request_id, "duplicate request id; earlier waiter cancelled");
        }

        rx
    }

    /// Routes a message to its waiter. Returns `false` when the message
    /// carries no request id or nothing is waiting on it.
    pub fn resolve(&mut self, message: &Message) -> bool {
        let Some(request_id) = message.request_id() else {
            return false;
        };

        let Some(waiter) = self.pending.remove(&request_id) else {
            return false;
        };

        // A dropped receiver just means the requester gave up first.
        waiter.send(message.clone()).is_ok()
    }

    /// Abandons one outstanding request, e.g. on timeout.
    pub fn cancel(&mut self, request_id: Uuid) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    /// Abandons everything, e.g. on disconnect. Every parked future
    /// observes a closed channel.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
