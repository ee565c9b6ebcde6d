//! The message schema: one body struct per [`MessageKind`] and the closed
//! [`Message`] sum type over them.

use std::io::Write;

use glam::{IVec3, Vec3};
use uuid::Uuid;

use crate::{Decode, Encode, MessageKind};

macro_rules! message_body {
    (
        $(#[$attr:meta])*
        $name:ident { $($field:ident: $ty:ty),+ $(,)? }
    ) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Debug)]
        pub struct $name {
            $(pub $field: $ty,)+
        }

        impl Encode for $name {
            fn encode(&self, mut w: impl Write) -> anyhow::Result<()> {
                $(self.$field.encode(&mut w)?;)+
                Ok(())
            }
        }

        impl Decode for $name {
            fn decode(r: &mut &[u8]) -> anyhow::Result<Self> {
                Ok(Self {
                    $($field: Decode::decode(r)?,)+
                })
            }
        }
    };
}

message_body! {
    /// Client-initiated liveness probe.
    Ping { request_id: Uuid }
}

message_body! {
    /// Server reply to [`Ping`], carrying the server clock in Unix
    /// milliseconds.
    Pong { request_id: Uuid, timestamp_ms: i64 }
}

message_body! {
    LoginRequest { request_id: Uuid, email: String, password: String }
}

message_body! {
    LoginResponse { request_id: Uuid, success: bool, reason: Option<String> }
}

message_body! {
    /// Server-pushed chat line with no correlation id.
    SystemChat { text: String }
}

message_body! {
    VersionRequest { request_id: Uuid }
}

message_body! {
    VersionResponse { request_id: Uuid, version: String }
}

message_body! {
    AssetRequest { request_id: Uuid, name: String }
}

message_body! {
    AssetResponse { request_id: Uuid, name: String, data: Vec<u8> }
}

message_body! {
    AssetListRequest { request_id: Uuid }
}

message_body! {
    AssetListResponse { request_id: Uuid, names: Vec<String> }
}

message_body! {
    /// Client movement update. The server treats the position as
    /// authoritative input and answers with chunk streaming as needed.
    PlayerPositionRequest { position: Vec3, rotation: Vec3 }
}

message_body! {
    /// Server-assigned position, e.g. the spawn point after login.
    PlayerPositionResponse { position: Vec3, rotation: Vec3 }
}

message_body! {
    /// Explicit client pull of chunks by world origin.
    ChunkRequest { origins: Vec<IVec3> }
}

message_body! {
    /// One chunk on the wire: its world origin and one block-kind byte per
    /// cell in x-major, then y, then z order.
    ChunkPayload { origin: IVec3, blocks: Vec<u8> }
}

message_body! {
    ChunkResponse { chunks: Vec<ChunkPayload> }
}

/// A message body type that maps onto exactly one [`MessageKind`].
///
/// This is the hook the typed listener registration of the session manager
/// builds on.
pub trait MessageBody: Encode + Decode + Clone + Send + Sync + 'static {
    const KIND: MessageKind;

    fn from_message(message: &Message) -> Option<&Self>;
    fn into_message(self) -> Message;
}

macro_rules! messages {
    ($($kind:ident),+ $(,)?) => {
        /// The closed union of everything that can appear on the wire.
        #[derive(Clone, PartialEq, Debug)]
        pub enum Message {
            $($kind($kind),)+
        }

        impl Message {
            /// The wire kind of this message.
            pub const fn kind(&self) -> MessageKind {
                match self {
                    $(Self::$kind(_) => MessageKind::$kind,)+
                }
            }

            /// Encodes the body fields, without frame header or codec.
            pub fn encode_body(&self, mut w: impl Write) -> anyhow::Result<()> {
                match self {
                    $(Self::$kind(body) => body.encode(&mut w),)+
                }
            }

            /// Decodes the body fields of the given kind.
            pub fn decode_body(kind: MessageKind, r: &mut &[u8]) -> anyhow::Result<Self> {
                match kind {
                    $(MessageKind::$kind => Ok(Self::$kind($kind::decode(r)?)),)+
                }
            }
        }

        $(
            impl MessageBody for $kind {
                const KIND: MessageKind = MessageKind::$kind;

                fn from_message(message: &Message) -> Option<&Self> {
                    match message {
                        Message::$kind(body) => Some(body),
                        _ => None,
                    }
                }

                fn into_message(self) -> Message {
                    Message::$kind(self)
                }
            }

            impl From<$kind> for Message {
                fn from(body: $kind) -> Self {
                    Self::$kind(body)
                }
            }
        )+
    };
}

messages! {
    Ping,
    Pong,
    LoginRequest,
    LoginResponse,
    SystemChat,
    VersionRequest,
    VersionResponse,
    AssetRequest,
    AssetResponse,
    AssetListRequest,
    AssetListResponse,
    PlayerPositionRequest,
    PlayerPositionResponse,
    ChunkRequest,
    ChunkResponse,
}

impl Message {
    /// The correlation id, for message kinds that participate in
    /// request/response pairing.
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            Self::Ping(m) => Some(m.request_id),
            Self::Pong(m) => Some(m.request_id),
            Self::LoginRequest(m) => Some(m.request_id),
            Self::LoginResponse(m) => Some(m.request_id),
            Self::VersionRequest(m) => Some(m.request_id),
            Self::VersionResponse(m) => Some(m.request_id),
            Self::AssetRequest(m) => Some(m.request_id),
            Self::AssetResponse(m) => Some(m.request_id),
            Self::AssetListRequest(m) => Some(m.request_id),
            Self::AssetListResponse(m) => Some(m.request_id),
            Self::SystemChat(_)
            | Self::PlayerPositionRequest(_)
            | Self::PlayerPositionResponse(_)
            | Self::ChunkRequest(_)
            | Self::ChunkResponse(_) => None,
        }
    }
}
