//! Binary framing.
//!
//! A frame is the on-wire form of one message: a one-byte message kind, a
//! one-byte flag set, a `u32` payload length, and the payload bytes. On the
//! stream each frame is preceded by its own 4-byte little-endian length, so
//! the decoder can reassemble frames from arbitrary read chunks.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ProtocolError, MAX_FRAME_SIZE};

/// Number of header bytes inside a frame: kind, flags, payload length.
const HEADER_LEN: usize = 6;
/// The outer length prefix preceding each frame on the stream.
const LENGTH_PREFIX_LEN: usize = 4;

/// Which payload transforms were applied when the frame was encoded.
///
/// Decoding applies exactly the flagged transforms, in reverse order:
/// decompress first, then decrypt.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub struct FrameFlags(u8);

impl FrameFlags {
    const COMPRESSED: u8 = 1 << 0;
    const ENCRYPTED: u8 = 1 << 1;
    const KNOWN: u8 = Self::COMPRESSED | Self::ENCRYPTED;

    pub const fn new(compressed: bool, encrypted: bool) -> Self {
        let mut bits = 0;
        if compressed {
            bits |= Self::COMPRESSED;
        }
        if encrypted {
            bits |= Self::ENCRYPTED;
        }
        Self(bits)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn compressed(self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    pub const fn encrypted(self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }

    /// True when the flag byte carries bits this implementation does not
    /// understand.
    pub const fn has_unknown_bits(self) -> bool {
        self.0 & !Self::KNOWN != 0
    }
}

/// One decoded (or to-be-encoded) wire frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// The raw message kind ordinal. Mapping onto
    /// [`MessageKind`](crate::MessageKind) happens in the packet
    /// processor, so an unknown ordinal can be logged and dropped without
    /// killing the stream.
    pub kind: u8,
    pub flags: FrameFlags,
    pub payload: Bytes,
}

impl Frame {
    /// Appends this frame, length prefix included, to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let frame_len = HEADER_LEN + self.payload.len();

        if LENGTH_PREFIX_LEN + frame_len > MAX_FRAME_SIZE {
            return Err(ProtocolError::Malformed(format!(
                "frame of {frame_len} bytes exceeds the maximum of {MAX_FRAME_SIZE}"
            )));
        }

        buf.reserve(LENGTH_PREFIX_LEN + frame_len);
        buf.put_u32_le(frame_len as u32);
        buf.put_u8(self.kind);
        buf.put_u8(self.flags.bits());
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_slice(&self.payload);

        Ok(())
    }

    /// Convenience for tests and single-frame sends.
    pub fn to_bytes(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Reassembles frames from a stream of byte chunks.
///
/// Bytes are queued as they arrive; [`try_next_frame`](Self::try_next_frame)
/// yields a frame once one is complete. A frame that fails validation is
/// consumed from the buffer before the error is returned, so the caller can
/// log, drop it, and keep the stream alive.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues freshly received bytes.
    pub fn queue_bytes(&mut self, bytes: BytesMut) {
        self.buf.unsplit(bytes);
    }

    /// Queues freshly received bytes from a borrowed slice.
    pub fn queue_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Splits off spare capacity to read into, avoiding a copy on the
    /// following [`queue_bytes`](Self::queue_bytes).
    pub fn take_capacity(&mut self) -> BytesMut {
        self.buf.split_off(self.buf.len())
    }

    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(None)` until enough bytes have arrived.
    pub fn try_next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let frame_len =
            u32::from_le_bytes(self.buf[..LENGTH_PREFIX_LEN].try_into().unwrap()) as usize;

        if LENGTH_PREFIX_LEN + frame_len > MAX_FRAME_SIZE {
            // Unrecoverable: the stream is desynchronized or hostile.
            return Err(ProtocolError::Malformed(format!(
                "declared frame length {frame_len} exceeds the maximum of {MAX_FRAME_SIZE}"
            )));
        }

        if self.buf.len() < LENGTH_PREFIX_LEN + frame_len {
            // Not enough data arrived yet.
            return Ok(None);
        }

        self.buf.advance(LENGTH_PREFIX_LEN);
        let mut frame = self.buf.split_to(frame_len);

        if frame.len() < HEADER_LEN {
            return Err(ProtocolError::Malformed(format!(
                "frame of {} bytes is shorter than its header",
                frame.len()
            )));
        }

        let kind = frame.get_u8();
        let flags = FrameFlags::from_bits(frame.get_u8());
        let payload_len = frame.get_u32_le() as usize;

        if payload_len != frame.len() {
            return Err(ProtocolError::Malformed(format!(
                "declared payload length {payload_len} does not match the {} remaining bytes",
                frame.len()
            )));
        }

        Ok(Some(Frame {
            kind,
            flags,
            payload: frame.freeze(),
        }))
    }
}
