//! Compression codec registry: None / LZ4-frame / byte-grouped-4 LZ4 /
//! full-bitslice LZ4 (§4.D).
//!
//! # Identity rules
//! Every codec is identified by a single-byte tag. That tag is written into
//! every xorb chunk header on disk; it is the authoritative identity for
//! dispatch on read. Unlike a UUID registry, tags are small, fixed, and
//! exhaustive — there is no plugin extension point.
//!
//! # Fallback rule
//! Every codec that fails to shrink its input relative to the verbatim
//! length falls back to `None`, carrying a byte-for-byte copy. Callers can
//! rely on `compress(...).bytes.len() < uncompressed_size` whenever the
//! returned tag is not `None`.

use std::io::{Read, Write};
use thiserror::Error;

mod bitslice;
mod byte_grouping;

pub use bitslice::{apply_full_bitslice, reverse_full_bitslice};
pub use byte_grouping::{apply_byte_grouping, reverse_byte_grouping};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression error: {0}")]
    Compression(String),
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("unknown compression type tag {0}")]
    UnknownCompressionType(u8),
    #[error("invalid chunk size: uncompressed={uncompressed}, compressed={compressed}")]
    InvalidChunkSize { uncompressed: u32, compressed: u32 },
}

/// Runtime codec discriminant. The byte value is the on-wire tag written
/// into every xorb chunk header — never renumber these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Lz4 = 1,
    ByteGrouping4Lz4 = 2,
    FullBitsliceLz4 = 3,
}

impl CompressionType {
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            2 => Ok(CompressionType::ByteGrouping4Lz4),
            3 => Ok(CompressionType::FullBitsliceLz4),
            other => Err(CodecError::UnknownCompressionType(other)),
        }
    }
}

/// Result of a compression call: the codec actually used (post-fallback)
/// and the produced bytes.
pub struct Compressed {
    pub tag: CompressionType,
    pub bytes: Vec<u8>,
}

fn lz4_compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    {
        let mut encoder = lz4_flex::frame::FrameEncoder::new(&mut out);
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compression(e.to_string()))?;
    }
    Ok(out)
}

fn lz4_decompress(data: &[u8], uncompressed_size: u32) -> Result<Vec<u8>, CodecError> {
    let mut decoder = lz4_flex::frame::FrameDecoder::new(data);
    let mut out = Vec::with_capacity(uncompressed_size as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Decompression(e.to_string()))?;
    if out.len() != uncompressed_size as usize {
        return Err(CodecError::InvalidChunkSize {
            uncompressed: uncompressed_size,
            compressed: data.len() as u32,
        });
    }
    Ok(out)
}

/// Compress `data` with `preferred`, falling back to `None` if the result
/// would not be smaller than the verbatim input.
pub fn compress(data: &[u8], preferred: CompressionType) -> Result<Compressed, CodecError> {
    let candidate = match preferred {
        CompressionType::None => None,
        CompressionType::Lz4 => Some(lz4_compress(data)?),
        CompressionType::ByteGrouping4Lz4 => {
            let grouped = apply_byte_grouping(data);
            Some(lz4_compress(&grouped)?)
        }
        CompressionType::FullBitsliceLz4 => {
            let sliced = apply_full_bitslice(data);
            Some(lz4_compress(&sliced)?)
        }
    };

    match candidate {
        Some(bytes) if bytes.len() < data.len() => Ok(Compressed { tag: preferred, bytes }),
        _ => Ok(Compressed {
            tag: CompressionType::None,
            bytes: data.to_vec(),
        }),
    }
}

/// Decompress `data` (produced under `tag`) back to exactly
/// `uncompressed_size` bytes.
pub fn decompress(
    data: &[u8],
    tag: CompressionType,
    uncompressed_size: u32,
) -> Result<Vec<u8>, CodecError> {
    match tag {
        CompressionType::None => {
            if data.len() != uncompressed_size as usize {
                return Err(CodecError::InvalidChunkSize {
                    uncompressed: uncompressed_size,
                    compressed: data.len() as u32,
                });
            }
            Ok(data.to_vec())
        }
        CompressionType::Lz4 => lz4_decompress(data, uncompressed_size),
        CompressionType::ByteGrouping4Lz4 => {
            let grouped = lz4_decompress(data, uncompressed_size)?;
            Ok(reverse_byte_grouping(&grouped))
        }
        CompressionType::FullBitsliceLz4 => {
            let sliced = lz4_decompress(data, uncompressed_size)?;
            Ok(reverse_full_bitslice(&sliced))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8], ty: CompressionType) {
        let c = compress(data, ty).unwrap();
        let d = decompress(&c.bytes, c.tag, data.len() as u32).unwrap();
        assert_eq!(d, data);
    }

    #[test]
    fn none_roundtrips() {
        roundtrip(b"hello world", CompressionType::None);
    }

    #[test]
    fn lz4_roundtrips() {
        let data = vec![b'a'; 10_000];
        roundtrip(&data, CompressionType::Lz4);
    }

    #[test]
    fn byte_grouping_roundtrips() {
        let data: Vec<u8> = (0u32..10_000).map(|i| (i % 251) as u8).collect();
        roundtrip(&data, CompressionType::ByteGrouping4Lz4);
    }

    #[test]
    fn bitslice_roundtrips() {
        let data: Vec<u8> = (0u32..4096).map(|i| (i % 197) as u8).collect();
        roundtrip(&data, CompressionType::FullBitsliceLz4);
    }

    #[test]
    fn incompressible_falls_back_to_none() {
        let data = [0x13u8, 0x37, 0x42, 0x99];
        let c = compress(&data, CompressionType::Lz4).unwrap();
        assert_eq!(c.tag, CompressionType::None);
        assert_eq!(c.bytes, data);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            CompressionType::from_tag(200),
            Err(CodecError::UnknownCompressionType(200))
        ));
    }
}
