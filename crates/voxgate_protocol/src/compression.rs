//! Payload compression.
//!
//! Compression is one of the two orthogonal payload transforms (the other
//! being [encryption](crate::encryption)). Both directions are pure
//! byte-array functions selected by [`CompressionKind`]; no state is kept
//! between calls.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The supported payload compression algorithms.
///
/// Every algorithm here is self-delimiting on decode: LZ4 blobs carry their
/// uncompressed length in-band, the others are stream formats.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum CompressionKind {
    #[default]
    None,
    Brotli,
    GZip,
    Deflate,
    #[serde(rename = "LZ4")]
    Lz4,
}

/// Brotli encoder buffer size. Also used by the decompressor.
const BROTLI_BUFFER: usize = 4096;
/// Brotli quality/window. Quality 5 is the speed/ratio sweet spot for
/// payloads that are sent once and never stored.
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;

/// Compresses `data` with the selected algorithm.
///
/// `CompressionKind::None` copies the input. Empty input is valid and
/// produces a (possibly non-empty) blob that decompresses back to empty.
pub fn compress(kind: CompressionKind, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Brotli => {
            let mut out = Vec::new();

            let mut w =
                brotli::CompressorWriter::new(&mut out, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
            w.write_all(data).map_err(ProtocolError::malformed)?;
            w.flush().map_err(ProtocolError::malformed)?;
            drop(w);

            Ok(out)
        }
        CompressionKind::GZip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).map_err(ProtocolError::malformed)?;
            enc.finish().map_err(ProtocolError::malformed)
        }
        CompressionKind::Deflate => {
            let mut enc =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data).map_err(ProtocolError::malformed)?;
            enc.finish().map_err(ProtocolError::malformed)
        }
        CompressionKind::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
    }
}

/// Decompresses `data` that was produced by [`compress`] with the same
/// `kind`.
///
/// Corrupt or truncated input surfaces as [`ProtocolError::Malformed`].
pub fn decompress(kind: CompressionKind, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Brotli => {
            let mut out = Vec::new();

            brotli::Decompressor::new(data, BROTLI_BUFFER)
                .read_to_end(&mut out)
                .map_err(ProtocolError::malformed)?;

            Ok(out)
        }
        CompressionKind::GZip => {
            let mut out = Vec::new();

            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(ProtocolError::malformed)?;

            Ok(out)
        }
        CompressionKind::Deflate => {
            let mut out = Vec::new();

            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(ProtocolError::malformed)?;

            Ok(out)
        }
        CompressionKind::Lz4 => {
            lz4_flex::decompress_size_prepended(data).map_err(ProtocolError::malformed)
        }
    }
}
