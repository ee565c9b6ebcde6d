#![doc = include_str!("../README.md")]

use std::io::Write;

pub mod compression;
pub mod encryption;
mod error;
pub mod frame;
mod impls;
pub mod messages;
pub mod processor;

pub use compression::CompressionKind;
pub use encryption::{EncryptionKey, EncryptionKind};
pub use error::ProtocolError;
pub use frame::{Frame, FrameDecoder, FrameFlags};
pub use messages::Message;
pub use processor::{CodecConfig, PacketProcessor};
pub use {anyhow, bytes, uuid};

/// The maximum number of bytes in a single frame, length prefix included.
///
/// Frames above this size are rejected by the decoder before any payload
/// transform runs, bounding memory usage on hostile input.
pub const MAX_FRAME_SIZE: usize = 2097152;

/// The default port the server transport binds to.
pub const DEFAULT_PORT: u16 = 7666;

/// The `Encode` trait allows objects to be written to the voxgate wire
/// format. It is the inverse of [`Decode`].
///
/// All scalars are little-endian. Strings and sequences carry a `u32`
/// length prefix; options carry a leading `bool`.
pub trait Encode {
    /// Writes this object to the provided writer.
    ///
    /// If this type also implements [`Decode`] then successful calls to
    /// this function must always successfully decode using the data that
    /// was written, consuming exactly the bytes that were produced.
    fn encode(&self, w: impl Write) -> anyhow::Result<()>;
}

/// The `Decode` trait allows objects to be read from the voxgate wire
/// format. It is the inverse of [`Encode`].
///
/// The input slice is advanced past the consumed bytes on success.
pub trait Decode: Sized {
    /// Reads this object from the provided byte slice.
    fn decode(r: &mut &[u8]) -> anyhow::Result<Self>;
}

/// The closed set of message kinds on the wire.
///
/// The discriminants are wire ordinals. The order is fixed; appending new
/// kinds at the end keeps old peers bit-compatible.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum MessageKind {
    Ping = 0,
    Pong = 1,
    LoginRequest = 2,
    LoginResponse = 3,
    SystemChat = 4,
    VersionRequest = 5,
    VersionResponse = 6,
    AssetRequest = 7,
    AssetResponse = 8,
    AssetListRequest = 9,
    AssetListResponse = 10,
    PlayerPositionRequest = 11,
    PlayerPositionResponse = 12,
    ChunkRequest = 13,
    ChunkResponse = 14,
}

impl MessageKind {
    /// The number of message kinds, equal to one past the highest ordinal.
    pub const COUNT: usize = 15;

    /// All kinds in ordinal order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Ping,
        Self::Pong,
        Self::LoginRequest,
        Self::LoginResponse,
        Self::SystemChat,
        Self::VersionRequest,
        Self::VersionResponse,
        Self::AssetRequest,
        Self::AssetResponse,
        Self::AssetListRequest,
        Self::AssetListResponse,
        Self::PlayerPositionRequest,
        Self::PlayerPositionResponse,
        Self::ChunkRequest,
        Self::ChunkResponse,
    ];

    /// Converts a wire ordinal back into a kind.
    pub const fn from_u8(ordinal: u8) -> Option<Self> {
        if (ordinal as usize) < Self::COUNT {
            Some(Self::ALL[ordinal as usize])
        } else {
            None
        }
    }

    /// The stable display name of this kind, used in logs and metrics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::LoginRequest => "login_request",
            Self::LoginResponse => "login_response",
            Self::SystemChat => "system_chat",
            Self::VersionRequest => "version_request",
            Self::VersionResponse => "version_response",
            Self::AssetRequest => "asset_request",
            Self::AssetResponse => "asset_response",
            Self::AssetListRequest => "asset_list_request",
            Self::AssetListResponse => "asset_list_response",
            Self::PlayerPositionRequest => "player_position_request",
            Self::PlayerPositionResponse => "player_position_response",
            Self::ChunkRequest => "chunk_request",
            Self::ChunkResponse => "chunk_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ordinals_are_dense_and_stable() {
        for (i, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
            assert_eq!(MessageKind::from_u8(i as u8), Some(*kind));
        }

        assert_eq!(MessageKind::from_u8(MessageKind::COUNT as u8), None);
        assert_eq!(MessageKind::from_u8(u8::MAX), None);
    }

    #[test]
    fn version_request_keeps_its_pinned_ordinal() {
        // Ordinal 5 is load-bearing for cross-version compatibility.
        assert_eq!(MessageKind::VersionRequest as u8, 5);
        assert_eq!(MessageKind::VersionResponse as u8, 6);
    }
}
