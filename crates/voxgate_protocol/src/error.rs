use thiserror::Error;

/// Errors surfaced by the wire protocol.
///
/// These are the terminal outcomes of frame decoding: the caller is
/// expected to log and drop the offending frame rather than kill the
/// session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame or its payload could not be decoded or decompressed.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// AEAD tag mismatch, padding failure, or a missing key. The payload
    /// was not produced under the configured key.
    #[error("payload failed authentication")]
    Unauthenticated,

    /// The frame's kind ordinal has no registered deserializer.
    #[error("unknown message kind {0}")]
    UnknownMessageKind(u8),
}

impl ProtocolError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}
