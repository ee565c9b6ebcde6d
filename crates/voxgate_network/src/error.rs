use thiserror::Error;
use voxgate_protocol::{MessageKind, ProtocolError};

/// Errors surfaced through a client request future.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A request was attempted while not connected.
    #[error("not connected")]
    NotConnected,

    /// The correlator's timer expired before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The connection went away while the request was outstanding.
    #[error("disconnected")]
    Disconnected,

    /// The response resolved, but with a body of the wrong kind.
    #[error("unexpected response kind {0:?}")]
    UnexpectedResponse(MessageKind),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
