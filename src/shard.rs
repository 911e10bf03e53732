//! MDB shard format — metadata index mapping file hashes to `(xorb,
//! chunk-range)` sequences and xorbs to chunk descriptors (§3, §4.F).
//!
//! # On-disk layout
//!
//! ```text
//! ShardHeader (48B) ‖ FileInfoSection ‖ Bookend (48B) ‖ CASInfoSection ‖ Bookend (48B) ‖ ShardFooter (200B)
//! ```
//!
//! Every record — in either section — is exactly 48 bytes. Record kinds are
//! distinguished positionally: a section is a sequence of `(header, N ×
//! entry)` groups, where the header's entry count tells the reader how many
//! entry records follow before the next header (or the bookend).
//!
//! ```text
//! ShardHeader (48B, LE)
//!   0  32  magic
//!  32   8  version
//!  40   8  footer_size
//!
//! ShardFooter (200B, LE)
//!   0    8  version
//!   8    8  file_info_offset
//!  16    8  cas_info_offset
//!  24   48  reserved
//!  72   32  chunk_hash_hmac_key   (all-zero = no keyed protection)
//! 104    8  creation_timestamp
//! 112    8  key_expiry
//! 120   72  reserved
//! 192    8  footer_offset
//! ```

use crate::hash::Hash;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const RECORD_SIZE: usize = 48;
pub const SHARD_HEADER_SIZE: usize = 48;
pub const SHARD_FOOTER_SIZE: usize = 200;
pub const SHARD_VERSION: u64 = 1;
pub const MAGIC: &[u8; 32] = b"XETSHARD-MDB-v1\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0";

/// 48-byte sentinel terminating a section. Distinguishable from a real
/// header because no valid header encodes an entry count of `u32::MAX`.
pub const BOOKEND: [u8; RECORD_SIZE] = [0xFFu8; RECORD_SIZE];

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("shard truncated: expected more bytes than remain")]
    Truncated,
    #[error("unsupported shard version {0}")]
    UnsupportedVersion(u64),
    #[error("bad shard magic")]
    BadMagic,
}

fn pad48(mut body: Vec<u8>) -> [u8; RECORD_SIZE] {
    body.resize(RECORD_SIZE, 0u8);
    body.try_into().unwrap()
}

// ── Record kinds ─────────────────────────────────────────────────────────

/// Header preceding a run of [`FileDataSequenceEntry`] records for one file.
#[derive(Debug, Clone, Copy)]
pub struct FileDataSequenceHeader {
    pub file_hash: Hash,
    pub entry_count: u32,
}

impl FileDataSequenceHeader {
    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = Vec::with_capacity(RECORD_SIZE);
        buf.extend_from_slice(self.file_hash.as_bytes());
        buf.extend_from_slice(&self.entry_count.to_le_bytes());
        pad48(buf)
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let file_hash = Hash(buf[0..32].try_into().unwrap());
        let entry_count = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        FileDataSequenceHeader { file_hash, entry_count }
    }
}

/// One `(xorb, chunk-range)` slice contributing to a file, in file order.
#[derive(Debug, Clone, Copy)]
pub struct FileDataSequenceEntry {
    pub xorb_hash: Hash,
    pub chunk_start: u32,
    pub chunk_end: u32,
    pub unpacked_length: u32,
}

impl FileDataSequenceEntry {
    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = Vec::with_capacity(RECORD_SIZE);
        buf.extend_from_slice(self.xorb_hash.as_bytes());
        buf.extend_from_slice(&self.chunk_start.to_le_bytes());
        buf.extend_from_slice(&self.chunk_end.to_le_bytes());
        buf.extend_from_slice(&self.unpacked_length.to_le_bytes());
        pad48(buf)
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        FileDataSequenceEntry {
            xorb_hash: Hash(buf[0..32].try_into().unwrap()),
            chunk_start: u32::from_le_bytes(buf[32..36].try_into().unwrap()),
            chunk_end: u32::from_le_bytes(buf[36..40].try_into().unwrap()),
            unpacked_length: u32::from_le_bytes(buf[40..44].try_into().unwrap()),
        }
    }
}

/// Optional per-file chunk verification hash; defined for format
/// completeness but not produced by [`Builder::add_file_info`], which only
/// emits header + data-sequence entries (mirrors spec.md's `addFileInfo`
/// signature).
#[derive(Debug, Clone, Copy)]
pub struct FileVerificationEntry {
    pub chunk_hash: Hash,
}

impl FileVerificationEntry {
    #[allow(dead_code)]
    fn encode(&self) -> [u8; RECORD_SIZE] {
        pad48(self.chunk_hash.as_bytes().to_vec())
    }
}

/// Opaque per-file metadata extension slot; defined for format
/// completeness, unused by the builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMetadataExt {
    pub bytes: [u8; RECORD_SIZE],
}

/// Header preceding a run of [`CASChunkSequenceEntry`] records for one xorb.
#[derive(Debug, Clone, Copy)]
pub struct CasChunkSequenceHeader {
    pub xorb_hash: Hash,
    pub entry_count: u32,
    pub serialized_size: u32,
    pub total_raw_bytes: u64,
}

impl CasChunkSequenceHeader {
    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = Vec::with_capacity(RECORD_SIZE);
        buf.extend_from_slice(self.xorb_hash.as_bytes());
        buf.extend_from_slice(&self.entry_count.to_le_bytes());
        buf.extend_from_slice(&self.serialized_size.to_le_bytes());
        buf.extend_from_slice(&self.total_raw_bytes.to_le_bytes());
        pad48(buf)
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        CasChunkSequenceHeader {
            xorb_hash: Hash(buf[0..32].try_into().unwrap()),
            entry_count: u32::from_le_bytes(buf[32..36].try_into().unwrap()),
            serialized_size: u32::from_le_bytes(buf[36..40].try_into().unwrap()),
            total_raw_bytes: u64::from_le_bytes(buf[40..48].try_into().unwrap()),
        }
    }
}

/// One chunk's location within its xorb.
#[derive(Debug, Clone, Copy)]
pub struct CasChunkSequenceEntry {
    pub chunk_hash: Hash,
    pub byte_offset: u64,
    pub size: u32,
}

impl CasChunkSequenceEntry {
    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = Vec::with_capacity(RECORD_SIZE);
        buf.extend_from_slice(self.chunk_hash.as_bytes());
        buf.extend_from_slice(&self.byte_offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        pad48(buf)
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        CasChunkSequenceEntry {
            chunk_hash: Hash(buf[0..32].try_into().unwrap()),
            byte_offset: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            size: u32::from_le_bytes(buf[40..44].try_into().unwrap()),
        }
    }
}

/// A resolved chunk location, produced by [`Reader::parse_cas_info`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkLocation {
    pub chunk_hash: Hash,
    pub xorb_hash: Hash,
    pub byte_offset: u64,
    pub size: u32,
}

// ── Header / footer ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShardHeader {
    pub version: u64,
}

impl ShardHeader {
    fn encode(&self) -> [u8; SHARD_HEADER_SIZE] {
        let mut buf = [0u8; SHARD_HEADER_SIZE];
        buf[0..32].copy_from_slice(MAGIC);
        buf[32..40].copy_from_slice(&self.version.to_le_bytes());
        // footer_size is fixed; filled in by the builder at serialize time.
        buf[40..48].copy_from_slice(&(SHARD_FOOTER_SIZE as u64).to_le_bytes());
        buf
    }

    fn decode(buf: &[u8; SHARD_HEADER_SIZE]) -> Result<(Self, u64), ShardError> {
        if &buf[0..32] != MAGIC {
            return Err(ShardError::BadMagic);
        }
        let version = u64::from_le_bytes(buf[32..40].try_into().unwrap());
        if version != SHARD_VERSION {
            return Err(ShardError::UnsupportedVersion(version));
        }
        let footer_size = u64::from_le_bytes(buf[40..48].try_into().unwrap());
        Ok((ShardHeader { version }, footer_size))
    }
}

#[derive(Debug, Clone)]
pub struct ShardFooter {
    pub version: u64,
    pub file_info_offset: u64,
    pub cas_info_offset: u64,
    pub chunk_hash_hmac_key: [u8; 32],
    pub creation_timestamp: u64,
    pub key_expiry: u64,
    pub footer_offset: u64,
}

impl ShardFooter {
    fn encode(&self) -> [u8; SHARD_FOOTER_SIZE] {
        let mut buf = [0u8; SHARD_FOOTER_SIZE];
        buf[0..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.file_info_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.cas_info_offset.to_le_bytes());
        // 24..72 reserved, left zero.
        buf[72..104].copy_from_slice(&self.chunk_hash_hmac_key);
        buf[104..112].copy_from_slice(&self.creation_timestamp.to_le_bytes());
        buf[112..120].copy_from_slice(&self.key_expiry.to_le_bytes());
        // 120..192 reserved, left zero.
        buf[192..200].copy_from_slice(&self.footer_offset.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8; SHARD_FOOTER_SIZE]) -> Self {
        ShardFooter {
            version: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            file_info_offset: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            cas_info_offset: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            chunk_hash_hmac_key: buf[72..104].try_into().unwrap(),
            creation_timestamp: u64::from_le_bytes(buf[104..112].try_into().unwrap()),
            key_expiry: u64::from_le_bytes(buf[112..120].try_into().unwrap()),
            footer_offset: u64::from_le_bytes(buf[192..200].try_into().unwrap()),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Accumulates file-info and CAS-info sections, then serializes a complete
/// shard.
#[derive(Default)]
pub struct Builder {
    file_info: Vec<u8>,
    cas_info: Vec<u8>,
    chunk_hash_hmac_key: [u8; 32],
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    /// Append a `FileDataSequenceHeader` followed by each entry describing
    /// how `file_hash`'s bytes are assembled from CAS chunk ranges.
    pub fn add_file_info(&mut self, file_hash: Hash, entries: &[FileDataSequenceEntry]) {
        let header = FileDataSequenceHeader { file_hash, entry_count: entries.len() as u32 };
        self.file_info.extend_from_slice(&header.encode());
        for entry in entries {
            self.file_info.extend_from_slice(&entry.encode());
        }
    }

    /// Append a `CASChunkSequenceHeader` followed by each chunk-location
    /// entry for `xorb_hash`.
    pub fn add_cas_info(
        &mut self,
        xorb_hash: Hash,
        entries: &[CasChunkSequenceEntry],
        total_raw_bytes: u64,
        serialized_size: u32,
    ) {
        let header = CasChunkSequenceHeader {
            xorb_hash,
            entry_count: entries.len() as u32,
            serialized_size,
            total_raw_bytes,
        };
        self.cas_info.extend_from_slice(&header.encode());
        for entry in entries {
            self.cas_info.extend_from_slice(&entry.encode());
        }
    }

    pub fn serialize(self) -> Vec<u8> {
        let header = ShardHeader { version: SHARD_VERSION };
        let header_bytes = header.encode();

        let file_info_offset = header_bytes.len() as u64;
        let cas_info_offset =
            file_info_offset + self.file_info.len() as u64 + RECORD_SIZE as u64;

        let creation_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut out = Vec::with_capacity(
            header_bytes.len()
                + self.file_info.len()
                + RECORD_SIZE
                + self.cas_info.len()
                + RECORD_SIZE
                + SHARD_FOOTER_SIZE,
        );
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&self.file_info);
        out.extend_from_slice(&BOOKEND);
        out.extend_from_slice(&self.cas_info);
        out.extend_from_slice(&BOOKEND);

        let footer_offset = out.len() as u64;
        let footer = ShardFooter {
            version: SHARD_VERSION,
            file_info_offset,
            cas_info_offset,
            chunk_hash_hmac_key: self.chunk_hash_hmac_key,
            creation_timestamp,
            key_expiry: 0,
            footer_offset,
        };
        out.extend_from_slice(&footer.encode());
        out
    }
}

// ── Reader ───────────────────────────────────────────────────────────────

pub struct Reader<'a> {
    data: &'a [u8],
    pub header: ShardHeader,
    pub footer: ShardFooter,
}

impl<'a> Reader<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ShardError> {
        if data.len() < SHARD_HEADER_SIZE + SHARD_FOOTER_SIZE {
            return Err(ShardError::Truncated);
        }
        let header_buf: [u8; SHARD_HEADER_SIZE] = data[0..SHARD_HEADER_SIZE].try_into().unwrap();
        let (header, _footer_size) = ShardHeader::decode(&header_buf)?;

        let footer_buf: [u8; SHARD_FOOTER_SIZE] =
            data[data.len() - SHARD_FOOTER_SIZE..].try_into().unwrap();
        let footer = ShardFooter::decode(&footer_buf);

        Ok(Reader { data, header, footer })
    }

    /// Walk the CAS-info section, 48 bytes at a time, stopping at the
    /// bookend, yielding resolved [`ChunkLocation`] records in xorb order.
    pub fn parse_cas_info(&self) -> Result<Vec<ChunkLocation>, ShardError> {
        let mut out = Vec::new();
        let mut pos = self.footer.cas_info_offset as usize;

        loop {
            if pos + RECORD_SIZE > self.data.len() {
                return Err(ShardError::Truncated);
            }
            let record: [u8; RECORD_SIZE] = self.data[pos..pos + RECORD_SIZE].try_into().unwrap();
            if record == BOOKEND {
                break;
            }
            let header = CasChunkSequenceHeader::decode(&record);
            pos += RECORD_SIZE;

            for _ in 0..header.entry_count {
                if pos + RECORD_SIZE > self.data.len() {
                    return Err(ShardError::Truncated);
                }
                let entry_buf: [u8; RECORD_SIZE] =
                    self.data[pos..pos + RECORD_SIZE].try_into().unwrap();
                let entry = CasChunkSequenceEntry::decode(&entry_buf);
                out.push(ChunkLocation {
                    chunk_hash: entry.chunk_hash,
                    xorb_hash: header.xorb_hash,
                    byte_offset: entry.byte_offset,
                    size: entry.size,
                });
                pos += RECORD_SIZE;
            }
        }
        Ok(out)
    }

    /// Walk the file-info section the same way, returning each file's
    /// header and its data-sequence entries.
    pub fn parse_file_info(
        &self,
    ) -> Result<Vec<(FileDataSequenceHeader, Vec<FileDataSequenceEntry>)>, ShardError> {
        let mut out = Vec::new();
        let mut pos = self.footer.file_info_offset as usize;

        loop {
            if pos + RECORD_SIZE > self.data.len() {
                return Err(ShardError::Truncated);
            }
            let record: [u8; RECORD_SIZE] = self.data[pos..pos + RECORD_SIZE].try_into().unwrap();
            if record == BOOKEND {
                break;
            }
            let header = FileDataSequenceHeader::decode(&record);
            pos += RECORD_SIZE;

            let mut entries = Vec::with_capacity(header.entry_count as usize);
            for _ in 0..header.entry_count {
                if pos + RECORD_SIZE > self.data.len() {
                    return Err(ShardError::Truncated);
                }
                let entry_buf: [u8; RECORD_SIZE] =
                    self.data[pos..pos + RECORD_SIZE].try_into().unwrap();
                entries.push(FileDataSequenceEntry::decode(&entry_buf));
                pos += RECORD_SIZE;
            }
            out.push((header, entries));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_data_hash;

    #[test]
    fn round_trips_file_and_cas_sections() {
        let file_hash = compute_data_hash(b"file a");
        let xorb_hash = compute_data_hash(b"xorb 1");
        let chunk_hash = compute_data_hash(b"chunk 0");

        let mut builder = Builder::new();
        builder.add_file_info(
            file_hash,
            &[FileDataSequenceEntry {
                xorb_hash,
                chunk_start: 0,
                chunk_end: 1,
                unpacked_length: 42,
            }],
        );
        builder.add_cas_info(
            xorb_hash,
            &[CasChunkSequenceEntry { chunk_hash, byte_offset: 0, size: 42 }],
            42,
            50,
        );
        let bytes = builder.serialize();

        let reader = Reader::parse(&bytes).unwrap();
        let locations = reader.parse_cas_info().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].chunk_hash, chunk_hash);
        assert_eq!(locations[0].xorb_hash, xorb_hash);
        assert_eq!(locations[0].byte_offset, 0);
        assert_eq!(locations[0].size, 42);

        let files = reader.parse_file_info().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0.file_hash, file_hash);
        assert_eq!(files[0].1.len(), 1);
        assert_eq!(files[0].1[0].unpacked_length, 42);
    }

    #[test]
    fn empty_shard_sections_round_trip() {
        let builder = Builder::new();
        let bytes = builder.serialize();
        let reader = Reader::parse(&bytes).unwrap();
        assert!(reader.parse_cas_info().unwrap().is_empty());
        assert!(reader.parse_file_info().unwrap().is_empty());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = Builder::new().serialize();
        bytes[0] = b'X' ^ 0xFF;
        assert!(matches!(Reader::parse(&bytes), Err(ShardError::BadMagic)));
    }

    #[test]
    fn multiple_xorbs_in_cas_section() {
        let mut builder = Builder::new();
        for i in 0..3u8 {
            let xorb_hash = compute_data_hash(&[i]);
            let chunk_hash = compute_data_hash(&[i, i]);
            builder.add_cas_info(
                xorb_hash,
                &[CasChunkSequenceEntry { chunk_hash, byte_offset: 0, size: 10 }],
                10,
                15,
            );
        }
        let bytes = builder.serialize();
        let reader = Reader::parse(&bytes).unwrap();
        let locations = reader.parse_cas_info().unwrap();
        assert_eq!(locations.len(), 3);
    }
}
