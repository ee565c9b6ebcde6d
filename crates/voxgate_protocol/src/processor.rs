//! The packet processor: typed messages in, wire frames out, and back.
//!
//! The processor owns no per-session state. Its dispatch table is built
//! from a static manifest at startup and frozen; after that every method
//! takes `&self` and the whole thing is safe to share across threads.

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::messages::*;
use crate::{
    compression, encryption, CompressionKind, EncryptionKey, EncryptionKind, Frame, FrameFlags,
    Message, MessageKind, ProtocolError,
};

/// Which payload transforms this endpoint applies when serializing, and the
/// key material for the encrypting ones.
#[derive(Clone, Debug, Default)]
pub struct CodecConfig {
    pub compression: CompressionKind,
    pub encryption: EncryptionKind,
    pub key: EncryptionKey,
}

type DecodeFn = fn(&mut &[u8]) -> anyhow::Result<Message>;

fn decode_as<T: MessageBody>(r: &mut &[u8]) -> anyhow::Result<Message> {
    T::decode(r).map(T::into_message)
}

/// Serializes messages into frames and dispatches frames back into typed
/// messages.
#[derive(Clone)]
pub struct PacketProcessor {
    codec: CodecConfig,
    table: [Option<DecodeFn>; MessageKind::COUNT],
}

impl PacketProcessor {
    /// Creates a processor with every message kind of the schema
    /// registered.
    pub fn new(codec: CodecConfig) -> Self {
        let mut processor = Self {
            codec,
            table: [None; MessageKind::COUNT],
        };

        processor.register_manifest();
        processor
    }

    /// Creates a processor with an empty dispatch table. Used by tests and
    /// by callers that want a restricted manifest.
    pub fn empty(codec: CodecConfig) -> Self {
        Self {
            codec,
            table: [None; MessageKind::COUNT],
        }
    }

    fn register_manifest(&mut self) {
        self.register_body::<Ping>();
        self.register_body::<Pong>();
        self.register_body::<LoginRequest>();
        self.register_body::<LoginResponse>();
        self.register_body::<SystemChat>();
        self.register_body::<VersionRequest>();
        self.register_body::<VersionResponse>();
        self.register_body::<AssetRequest>();
        self.register_body::<AssetResponse>();
        self.register_body::<AssetListRequest>();
        self.register_body::<AssetListResponse>();
        self.register_body::<PlayerPositionRequest>();
        self.register_body::<PlayerPositionResponse>();
        self.register_body::<ChunkRequest>();
        self.register_body::<ChunkResponse>();
    }

    /// Registers a deserializer for `kind`. Re-registering an occupied
    /// kind keeps the existing entry and logs a warning; this is not an
    /// error. Returns whether the entry was newly installed.
    pub fn register(&mut self, kind: MessageKind, decode: DecodeFn) -> bool {
        let slot = &mut self.table[kind as usize];

        if slot.is_some() {
            warn!(kind = kind.name(), "deserializer already registered; keeping the first");
            return false;
        }

        *slot = Some(decode);
        true
    }

    /// Typed sugar over [`register`](Self::register).
    pub fn register_body<T: MessageBody>(&mut self) -> bool {
        self.register(T::KIND, decode_as::<T>)
    }

    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.table[kind as usize].is_some()
    }

    pub fn codec(&self) -> &CodecConfig {
        &self.codec
    }

    /// Serializes a message into a frame: encode the body, encrypt,
    /// compress, in that order, flagging each transform applied.
    pub fn serialize(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let mut payload = Vec::new();
        message
            .encode_body(&mut payload)
            .map_err(ProtocolError::malformed)?;

        let encrypted = self.codec.encryption != EncryptionKind::None;
        if encrypted {
            payload = encryption::encrypt(self.codec.encryption, &self.codec.key, &payload)?;
        }

        let compressed = self.codec.compression != CompressionKind::None;
        if compressed {
            payload = compression::compress(self.codec.compression, &payload)?;
        }

        Ok(Frame {
            kind: message.kind() as u8,
            flags: FrameFlags::new(compressed, encrypted),
            payload: Bytes::from(payload),
        })
    }

    /// Serializes straight to length-prefixed wire bytes.
    pub fn serialize_to_bytes(&self, message: &Message) -> Result<BytesMut, ProtocolError> {
        self.serialize(message)?.to_bytes()
    }

    /// Decodes a frame back into a typed message, applying exactly the
    /// transforms its flags declare, in reverse order: decompress, then
    /// decrypt, then deserialize.
    pub fn deserialize(&self, frame: &Frame) -> Result<Message, ProtocolError> {
        if frame.flags.has_unknown_bits() {
            return Err(ProtocolError::Malformed(format!(
                "unknown flag bits {:#04x}",
                frame.flags.bits()
            )));
        }

        let kind = MessageKind::from_u8(frame.kind)
            .ok_or(ProtocolError::UnknownMessageKind(frame.kind))?;

        let decode = self.table[kind as usize]
            .ok_or(ProtocolError::UnknownMessageKind(frame.kind))?;

        let mut payload = frame.payload.to_vec();

        if frame.flags.compressed() {
            payload = compression::decompress(self.codec.compression, &payload)?;
        }

        if frame.flags.encrypted() {
            if self.codec.encryption == EncryptionKind::None {
                // Peer encrypted but we have nothing to decrypt with.
                return Err(ProtocolError::Unauthenticated);
            }

            payload = encryption::decrypt(self.codec.encryption, &self.codec.key, &payload)?;
        }

        let mut r = &payload[..];
        let message = decode(&mut r).map_err(ProtocolError::malformed)?;

        if !r.is_empty() {
            return Err(ProtocolError::Malformed(format!(
                "{} trailing bytes after decoding {}",
                r.len(),
                kind.name()
            )));
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::FrameDecoder;

    fn processor(compression: CompressionKind, encryption: EncryptionKind) -> PacketProcessor {
        PacketProcessor::new(CodecConfig {
            compression,
            encryption,
            key: EncryptionKey::generate(encryption),
        })
    }

    fn ping() -> Message {
        Ping { request_id: Uuid::from_u128(7) }.into()
    }

    #[test]
    fn round_trip_every_kind_over_every_codec_pair() {
        let compressions = [
            CompressionKind::None,
            CompressionKind::Brotli,
            CompressionKind::GZip,
            CompressionKind::Deflate,
            CompressionKind::Lz4,
        ];
        let encryptions = [
            EncryptionKind::None,
            EncryptionKind::Aes256,
            EncryptionKind::ChaCha20Poly1305,
        ];

        for compression in compressions {
            for encryption in encryptions {
                let p = processor(compression, encryption);

                for kind in MessageKind::ALL {
                    let message = crate::messages::tests::sample(kind);
                    let bytes = p.serialize_to_bytes(&message).unwrap();

                    let mut dec = FrameDecoder::new();
                    dec.queue_slice(&bytes);
                    let frame = dec.try_next_frame().unwrap().unwrap();

                    assert_eq!(
                        p.deserialize(&frame).unwrap(),
                        message,
                        "{kind:?} under {compression:?}/{encryption:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn flags_reflect_the_applied_transforms() {
        let frame = processor(CompressionKind::None, EncryptionKind::None)
            .serialize(&ping())
            .unwrap();
        assert!(!frame.flags.compressed() && !frame.flags.encrypted());

        let frame = processor(CompressionKind::Lz4, EncryptionKind::ChaCha20Poly1305)
            .serialize(&ping())
            .unwrap();
        assert!(frame.flags.compressed() && frame.flags.encrypted());
    }

    #[test]
    fn unknown_kind_is_reported_not_fatal() {
        let p = processor(CompressionKind::None, EncryptionKind::None);

        let mut frame = p.serialize(&ping()).unwrap();
        frame.kind = 200;

        assert!(matches!(
            p.deserialize(&frame).unwrap_err(),
            ProtocolError::UnknownMessageKind(200)
        ));
    }

    #[test]
    fn unregistered_kind_is_unknown() {
        let empty = PacketProcessor::empty(CodecConfig::default());
        let frame = processor(CompressionKind::None, EncryptionKind::None)
            .serialize(&ping())
            .unwrap();

        assert!(matches!(
            empty.deserialize(&frame).unwrap_err(),
            ProtocolError::UnknownMessageKind(_)
        ));
    }

    #[test]
    fn re_registering_keeps_the_first_entry() {
        let mut p = PacketProcessor::new(CodecConfig::default());

        assert!(!p.register_body::<Ping>());
        assert!(p.is_registered(MessageKind::Ping));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let p = processor(CompressionKind::None, EncryptionKind::None);

        let mut frame = p.serialize(&ping()).unwrap();
        let mut payload = frame.payload.to_vec();
        payload.push(0xff);
        frame.payload = payload.into();

        assert!(matches!(
            p.deserialize(&frame).unwrap_err(),
            ProtocolError::Malformed(_)
        ));
    }

    #[test]
    fn encrypted_frame_without_a_key_fails_authentication() {
        let sender = processor(CompressionKind::None, EncryptionKind::Aes256);
        let receiver = processor(CompressionKind::None, EncryptionKind::None);

        let frame = sender.serialize(&ping()).unwrap();

        assert!(matches!(
            receiver.deserialize(&frame).unwrap_err(),
            ProtocolError::Unauthenticated
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sender = processor(CompressionKind::None, EncryptionKind::ChaCha20Poly1305);
        let receiver = processor(CompressionKind::None, EncryptionKind::ChaCha20Poly1305);

        let frame = sender.serialize(&ping()).unwrap();

        assert!(matches!(
            receiver.deserialize(&frame).unwrap_err(),
            ProtocolError::Unauthenticated
        ));
    }
}
