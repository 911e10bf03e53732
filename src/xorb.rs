//! Xorb container format — unframed concatenation of `(8-byte header,
//! compressed payload)` records (§3, §4.E).
//!
//! # On-disk layout (8-byte chunk header, all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      1   version              (current = 0)
//!    1      3   compressed_size      LE u24, bounded by 0xFFFFFF
//!    4      1   compression tag      0=None 1=LZ4 2=ByteGrouping4LZ4 3=FullBitsliceLZ4
//!    5      3   uncompressed_size    LE u24, bounded by 0xFFFFFF
//! ```
//!
//! No outer framing exists: a xorb is simply `header ‖ payload ‖ header ‖
//! payload ‖ ...`. Chunks are addressed by their 0-based sequential index.
//! A builder refuses new chunks once the estimated serialized size would
//! exceed [`crate::constants::MAX_XORB_SIZE`].

use crate::codec::{self, CodecError, CompressionType};
use crate::constants::{MAX_XORB_SIZE, U24_MAX, XORB_CHUNK_HEADER_SIZE};
use crate::hash::{compute_data_hash, hash_to_hex, Hash, MerkleNode};
use log::debug;
use thiserror::Error;

pub const CHUNK_HEADER_VERSION: u8 = 0;

#[derive(Error, Debug)]
pub enum XorbError {
    #[error("xorb truncated: expected more bytes than remain")]
    Truncated,
    #[error("unsupported xorb chunk header version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid chunk size: uncompressed={uncompressed}, compressed={compressed}")]
    InvalidChunkSize { uncompressed: u32, compressed: u32 },
    #[error("invalid compression type tag {0}")]
    InvalidCompressionType(u8),
    #[error("range out of bounds: requested end {end}, xorb has {available} chunks")]
    RangeOutOfBounds { end: u32, available: u32 },
    #[error("invalid range: start {start} >= end {end}")]
    InvalidRange { start: u32, end: u32 },
    #[error("xorb full: adding this chunk would exceed the {MAX_XORB_SIZE}-byte limit")]
    XorbFull,
    #[error("chunk {index} hash mismatch: expected {expected}, got {actual}")]
    ChunkHashMismatch { index: u32, expected: String, actual: String },
    #[error("expected {expected} chunk hashes for verification, got {actual}")]
    ChunkHashCountMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A chunk ready to be added to a xorb, before compression.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub hash: Hash,
    pub data: Vec<u8>,
    pub index: u32,
}

impl Chunk {
    pub fn new(data: Vec<u8>, index: u32) -> Self {
        let hash = compute_data_hash(&data);
        Chunk { hash, data, index }
    }
}

/// The fixed 8-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub version: u8,
    pub compressed_size: u32,
    pub compression_type: CompressionType,
    pub uncompressed_size: u32,
}

fn write_u24_le(buf: &mut [u8], value: u32) {
    buf[0] = (value & 0xFF) as u8;
    buf[1] = ((value >> 8) & 0xFF) as u8;
    buf[2] = ((value >> 16) & 0xFF) as u8;
}

fn read_u24_le(buf: &[u8]) -> u32 {
    buf[0] as u32 | (buf[1] as u32) << 8 | (buf[2] as u32) << 16
}

impl ChunkHeader {
    pub fn encode(&self) -> [u8; XORB_CHUNK_HEADER_SIZE] {
        let mut buf = [0u8; XORB_CHUNK_HEADER_SIZE];
        buf[0] = self.version;
        write_u24_le(&mut buf[1..4], self.compressed_size);
        buf[4] = self.compression_type.tag();
        write_u24_le(&mut buf[5..8], self.uncompressed_size);
        buf
    }

    pub fn decode(buf: &[u8; XORB_CHUNK_HEADER_SIZE]) -> Result<Self, XorbError> {
        let version = buf[0];
        if version != CHUNK_HEADER_VERSION {
            return Err(XorbError::UnsupportedVersion(version));
        }
        let compressed_size = read_u24_le(&buf[1..4]);
        let compression_type = CompressionType::from_tag(buf[4])
            .map_err(|_| XorbError::InvalidCompressionType(buf[4]))?;
        let uncompressed_size = read_u24_le(&buf[5..8]);

        if compressed_size > U24_MAX || uncompressed_size > U24_MAX {
            return Err(XorbError::InvalidChunkSize { uncompressed: uncompressed_size, compressed: compressed_size });
        }
        if uncompressed_size == 0 && compressed_size > 0 {
            return Err(XorbError::InvalidChunkSize { uncompressed: uncompressed_size, compressed: compressed_size });
        }

        Ok(ChunkHeader { version, compressed_size, compression_type, uncompressed_size })
    }
}

/// Incrementally builds a xorb from raw chunk payloads.
pub struct Builder {
    compression: CompressionType,
    bytes: Vec<u8>,
    leaves: Vec<MerkleNode>,
    chunk_count: u32,
}

impl Builder {
    pub fn new(compression: CompressionType) -> Self {
        Builder { compression, bytes: Vec::new(), leaves: Vec::new(), chunk_count: 0 }
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    pub fn serialized_len(&self) -> usize {
        self.bytes.len()
    }

    /// Compress and append one chunk. Refuses if the estimated resulting
    /// size would exceed [`MAX_XORB_SIZE`].
    pub fn add_chunk(&mut self, data: &[u8]) -> Result<(), XorbError> {
        let estimate = self.bytes.len() + XORB_CHUNK_HEADER_SIZE + data.len();
        if estimate > MAX_XORB_SIZE {
            return Err(XorbError::XorbFull);
        }

        let compressed = codec::compress(data, self.compression)?;
        let header = ChunkHeader {
            version: CHUNK_HEADER_VERSION,
            compressed_size: compressed.bytes.len() as u32,
            compression_type: compressed.tag,
            uncompressed_size: data.len() as u32,
        };

        self.bytes.extend_from_slice(&header.encode());
        self.bytes.extend_from_slice(&compressed.bytes);

        self.leaves.push(MerkleNode { hash: compute_data_hash(data), size: data.len() as u64 });
        self.chunk_count += 1;
        Ok(())
    }

    /// Compress and append many chunks at once, in input order. With the
    /// `parallel` feature enabled, compression runs concurrently across
    /// cores via Rayon; chunks are still appended to the xorb sequentially
    /// so on-disk order matches input order regardless.
    pub fn add_chunks(&mut self, chunks: &[&[u8]]) -> Result<(), XorbError> {
        #[cfg(feature = "parallel")]
        let compressed: Vec<Result<codec::Compressed, CodecError>> = {
            use rayon::prelude::*;
            chunks.par_iter().map(|data| codec::compress(data, self.compression)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let compressed: Vec<Result<codec::Compressed, CodecError>> =
            chunks.iter().map(|data| codec::compress(data, self.compression)).collect();

        for (data, result) in chunks.iter().zip(compressed) {
            let compressed = result?;
            let estimate = self.bytes.len() + XORB_CHUNK_HEADER_SIZE + data.len();
            if estimate > MAX_XORB_SIZE {
                return Err(XorbError::XorbFull);
            }

            let header = ChunkHeader {
                version: CHUNK_HEADER_VERSION,
                compressed_size: compressed.bytes.len() as u32,
                compression_type: compressed.tag,
                uncompressed_size: data.len() as u32,
            };
            self.bytes.extend_from_slice(&header.encode());
            self.bytes.extend_from_slice(&compressed.bytes);
            self.leaves.push(MerkleNode { hash: compute_data_hash(data), size: data.len() as u64 });
            self.chunk_count += 1;
        }
        Ok(())
    }

    /// The xorb's identity hash: a Merkle tree over `{hash, size}` leaves
    /// of every chunk added so far, in insertion order.
    pub fn xorb_hash(&self) -> Hash {
        crate::hash::build_merkle_tree(&self.leaves)
    }

    /// Finalize into the raw on-disk bytes.
    pub fn build(self) -> Vec<u8> {
        debug!("xorb build finalized: {} chunks, {} bytes", self.chunk_count, self.bytes.len());
        self.bytes
    }
}

/// A positional cursor over xorb bytes.
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, position: 0 }
    }

    /// Decode and decompress the next chunk, or `None` at EOF.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, XorbError> {
        if self.position == self.data.len() {
            return Ok(None);
        }
        let remaining = self.data.len() - self.position;
        if remaining < XORB_CHUNK_HEADER_SIZE {
            return Err(XorbError::Truncated);
        }

        let header_bytes: [u8; XORB_CHUNK_HEADER_SIZE] = self.data
            [self.position..self.position + XORB_CHUNK_HEADER_SIZE]
            .try_into()
            .unwrap();
        let header = ChunkHeader::decode(&header_bytes)?;
        self.position += XORB_CHUNK_HEADER_SIZE;

        let remaining = self.data.len() - self.position;
        if remaining < header.compressed_size as usize {
            return Err(XorbError::Truncated);
        }

        let payload = &self.data[self.position..self.position + header.compressed_size as usize];
        self.position += header.compressed_size as usize;

        let decoded = codec::decompress(payload, header.compression_type, header.uncompressed_size)?;
        Ok(Some(decoded))
    }

    /// Linear-scan from the start for the chunk at index `i`.
    pub fn get_chunk(&self, i: u32) -> Result<Vec<u8>, XorbError> {
        let mut reader = Reader::new(self.data);
        let mut idx = 0u32;
        while let Some(chunk) = reader.next_chunk()? {
            if idx == i {
                return Ok(chunk);
            }
            idx += 1;
        }
        Err(XorbError::RangeOutOfBounds { end: i + 1, available: idx })
    }

    /// Concatenate the decompressed bytes of chunks `[start, end)`.
    pub fn extract_chunk_range(&self, start: u32, end: u32) -> Result<Vec<u8>, XorbError> {
        if start >= end {
            return Err(XorbError::InvalidRange { start, end });
        }

        let mut reader = Reader::new(self.data);
        let mut idx = 0u32;
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk()? {
            if idx >= start && idx < end {
                out.extend_from_slice(&chunk);
            }
            idx += 1;
        }

        if idx < end {
            return Err(XorbError::RangeOutOfBounds { end, available: idx });
        }
        Ok(out)
    }

    /// As [`Reader::extract_chunk_range`], but recomputes each decompressed
    /// chunk's keyed-BLAKE3 data hash and checks it against
    /// `expected_hashes[i]` (one entry per chunk in `[start, end)`, in
    /// order) before appending it. Used when verify-on-read is enabled.
    pub fn extract_chunk_range_verified(
        &self,
        start: u32,
        end: u32,
        expected_hashes: &[Hash],
    ) -> Result<Vec<u8>, XorbError> {
        if start >= end {
            return Err(XorbError::InvalidRange { start, end });
        }
        if expected_hashes.len() != (end - start) as usize {
            return Err(XorbError::ChunkHashCountMismatch {
                expected: (end - start) as usize,
                actual: expected_hashes.len(),
            });
        }

        let mut reader = Reader::new(self.data);
        let mut idx = 0u32;
        let mut out = Vec::new();
        while let Some(chunk) = reader.next_chunk()? {
            if idx >= start && idx < end {
                let expected = expected_hashes[(idx - start) as usize];
                let actual = compute_data_hash(&chunk);
                if actual != expected {
                    return Err(XorbError::ChunkHashMismatch {
                        index: idx,
                        expected: hash_to_hex(&expected),
                        actual: hash_to_hex(&actual),
                    });
                }
                out.extend_from_slice(&chunk);
            }
            idx += 1;
        }

        if idx < end {
            return Err(XorbError::RangeOutOfBounds { end, available: idx });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_chunk_round_trip_none_codec() {
        let mut builder = Builder::new(CompressionType::None);
        builder.add_chunk(b"Chunk 0").unwrap();
        builder.add_chunk(b"Chunk 1").unwrap();
        builder.add_chunk(b"Chunk 2").unwrap();
        let bytes = builder.build();

        let reader = Reader::new(&bytes);
        assert_eq!(reader.get_chunk(1).unwrap(), b"Chunk 1");
        assert_eq!(reader.extract_chunk_range(1, 3).unwrap(), b"Chunk 1Chunk 2");
    }

    #[test]
    fn add_chunks_matches_sequential_add_chunk() {
        let payloads: [&[u8]; 3] = [b"alpha", b"beta", b"gamma"];

        let mut sequential = Builder::new(CompressionType::None);
        for p in &payloads {
            sequential.add_chunk(p).unwrap();
        }

        let mut batched = Builder::new(CompressionType::None);
        batched.add_chunks(&payloads).unwrap();

        assert_eq!(sequential.xorb_hash(), batched.xorb_hash());
        assert_eq!(sequential.build(), batched.build());
    }

    #[test]
    fn extract_chunk_range_verified_accepts_matching_hashes() {
        let mut builder = Builder::new(CompressionType::None);
        builder.add_chunk(b"one").unwrap();
        builder.add_chunk(b"two").unwrap();
        let bytes = builder.build();

        let hashes = vec![compute_data_hash(b"one"), compute_data_hash(b"two")];
        let reader = Reader::new(&bytes);
        assert_eq!(reader.extract_chunk_range_verified(0, 2, &hashes).unwrap(), b"onetwo");
    }

    #[test]
    fn extract_chunk_range_verified_rejects_wrong_hash() {
        let mut builder = Builder::new(CompressionType::None);
        builder.add_chunk(b"one").unwrap();
        let bytes = builder.build();

        let wrong = vec![compute_data_hash(b"not one")];
        let reader = Reader::new(&bytes);
        assert!(matches!(
            reader.extract_chunk_range_verified(0, 1, &wrong),
            Err(XorbError::ChunkHashMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn full_iteration_matches_insertion_order() {
        let mut builder = Builder::new(CompressionType::Lz4);
        let payloads = [vec![1u8; 5000], vec![2u8; 9000], vec![3u8; 1234]];
        for p in &payloads {
            builder.add_chunk(p).unwrap();
        }
        let bytes = builder.build();

        let mut reader = Reader::new(&bytes);
        for expected in &payloads {
            assert_eq!(&reader.next_chunk().unwrap().unwrap(), expected);
        }
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn truncated_payload_errors() {
        let mut builder = Builder::new(CompressionType::None);
        builder.add_chunk(b"abc").unwrap();
        let mut bytes = builder.build();
        bytes.truncate(bytes.len() - 1);
        let mut reader = Reader::new(&bytes);
        assert!(matches!(reader.next_chunk(), Err(XorbError::Truncated)));
    }

    #[test]
    fn invalid_range_rejected() {
        let mut builder = Builder::new(CompressionType::None);
        builder.add_chunk(b"x").unwrap();
        let bytes = builder.build();
        let reader = Reader::new(&bytes);
        assert!(matches!(
            reader.extract_chunk_range(5, 5),
            Err(XorbError::InvalidRange { start: 5, end: 5 })
        ));
    }

    #[test]
    fn range_beyond_available_chunks_errors() {
        let mut builder = Builder::new(CompressionType::None);
        builder.add_chunk(b"only one").unwrap();
        let bytes = builder.build();
        let reader = Reader::new(&bytes);
        assert!(matches!(
            reader.extract_chunk_range(0, 3),
            Err(XorbError::RangeOutOfBounds { end: 3, available: 1 })
        ));
    }

    #[test]
    fn xorb_hash_is_deterministic_merkle_over_chunks() {
        let mut a = Builder::new(CompressionType::None);
        let mut b = Builder::new(CompressionType::None);
        for data in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            a.add_chunk(&data).unwrap();
            b.add_chunk(&data).unwrap();
        }
        assert_eq!(a.xorb_hash(), b.xorb_hash());
    }
}
