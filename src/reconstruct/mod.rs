//! Reconstruction engine — resolve terms, fetch xorb byte ranges, extract
//! chunk ranges, decompress, and assemble the output in strict file order
//! (§4.G).
//!
//! The engine is deliberately decoupled from HTTP: it is driven by a
//! [`ReconstructionResolver`] (the CAS-client boundary, §6) and a
//! [`fetcher::RangeFetcher`] (the byte-range GET boundary, §6). Tests in
//! this crate supply in-memory/local-directory implementations of both.

pub mod fetcher;
pub mod local;

use crate::hash::Hash;
use crate::xorb::{Reader as XorbReader, XorbError};
use fetcher::{FetchConfig, TransportError};
use log::{info, warn};
use std::collections::HashMap;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconstructError {
    #[error("no fetch-info available for xorb {xorb_hash}")]
    MissingFetchInfo { xorb_hash: String },
    #[error("no fetch-info for xorb {xorb_hash} covers chunk range [{start}, {end})")]
    NoMatchingFetchInfo { xorb_hash: String, start: u32, end: u32 },
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("missing result for term {index}")]
    MissingResult { index: usize },
    #[error(transparent)]
    Xorb(#[from] XorbError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("resolver error: {0}")]
    Resolver(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Half-open `[start, end)` chunk-index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u32,
    pub end: u32,
}

/// A single `(xorb, chunk_range)` slice contributing a run of bytes to a
/// reconstructed file.
#[derive(Debug, Clone)]
pub struct ReconstructionTerm {
    pub xorb_hash: Hash,
    pub unpacked_length: u32,
    pub chunk_range: ChunkRange,
    /// Expected keyed-BLAKE3 data hash of each chunk in `chunk_range`, in
    /// order. Checked against the recomputed hash of each decompressed
    /// chunk when [`FetchConfig::verify_on_read`] is enabled.
    pub chunk_hashes: Vec<Hash>,
}

/// A pre-signed URL plus HTTP byte-range known to cover `chunk_range`.
#[derive(Debug, Clone)]
pub struct FetchInfo {
    pub chunk_range: ChunkRange,
    pub url: String,
    pub byte_range: (u64, u64),
}

/// The full response from the CAS-client boundary: terms plus a
/// per-xorb list of fetch-info candidates, and an optional initial skip
/// for range requests.
#[derive(Debug, Clone, Default)]
pub struct ReconstructionInfo {
    pub offset_into_first_range: u64,
    pub terms: Vec<ReconstructionTerm>,
    pub fetch_info: HashMap<String, Vec<FetchInfo>>,
}

/// Resolves a file hash (and optional byte range) to reconstruction
/// instructions. Implemented by the CAS-client HTTP shim in production and
/// by a local-directory stand-in in tests and the demo CLI.
pub trait ReconstructionResolver: Send + Sync {
    fn resolve(
        &self,
        file_hash: &Hash,
        range: Option<(u64, u64)>,
    ) -> Result<ReconstructionInfo, ReconstructError>;
}

/// Output destination for reconstructed bytes: either an in-memory buffer
/// or an arbitrary writer. A small closed variant rather than a trait
/// object, per the engine's dynamic-dispatch design (§9).
pub enum Sink<'a> {
    Buffer(&'a mut Vec<u8>),
    Writer(&'a mut dyn Write),
}

impl<'a> Sink<'a> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Sink::Buffer(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            Sink::Writer(w) => w.write_all(data),
        }
    }
}

/// Find the unique fetch-info whose `chunk_range` is a superset of the
/// term's `chunk_range`, and translate the term's range into local
/// (xorb-relative) chunk indices.
fn resolve_term_range(
    term: &ReconstructionTerm,
    candidates: &[FetchInfo],
) -> Result<(&FetchInfo, u32, u32), ReconstructError> {
    let hit = candidates.iter().find(|fi| {
        fi.chunk_range.start <= term.chunk_range.start && fi.chunk_range.end >= term.chunk_range.end
    });
    match hit {
        Some(fi) => {
            let local_start = term.chunk_range.start - fi.chunk_range.start;
            let local_end = term.chunk_range.end - fi.chunk_range.start;
            Ok((fi, local_start, local_end))
        }
        None => Err(ReconstructError::NoMatchingFetchInfo {
            xorb_hash: crate::hash::hash_to_hex(&term.xorb_hash),
            start: term.chunk_range.start,
            end: term.chunk_range.end,
        }),
    }
}

/// Fetch and extract the bytes contributed by a single term.
pub fn extract_term(
    term: &ReconstructionTerm,
    info: &ReconstructionInfo,
    fetcher: &dyn fetcher::RangeFetcher,
    config: &FetchConfig,
) -> Result<Vec<u8>, ReconstructError> {
    let xorb_hex = crate::hash::hash_to_hex(&term.xorb_hash);
    let candidates = info
        .fetch_info
        .get(&xorb_hex)
        .ok_or_else(|| ReconstructError::MissingFetchInfo { xorb_hash: xorb_hex.clone() })?;

    let (fetch_info, local_start, local_end) = resolve_term_range(term, candidates)?;

    let xorb_bytes = fetcher.fetch_range(&fetch_info.url, fetch_info.byte_range).map_err(|e| {
        if e.is_retryable() {
            warn!("retryable transport error fetching xorb {xorb_hex}: {e}");
        }
        ReconstructError::from(e)
    })?;
    let reader = XorbReader::new(&xorb_bytes);
    let extracted = if config.verify_on_read {
        reader.extract_chunk_range_verified(local_start, local_end, &term.chunk_hashes)?
    } else {
        reader.extract_chunk_range(local_start, local_end)?
    };
    info!(
        "resolved term xorb={xorb_hex} chunks=[{local_start},{local_end}) -> {} bytes",
        extracted.len()
    );
    Ok(extracted)
}

/// Reconstruct the whole file identified by `file_hash` into `sink`.
pub fn reconstruct_file(
    file_hash: &Hash,
    resolver: &dyn ReconstructionResolver,
    fetcher: &dyn fetcher::RangeFetcher,
    config: &FetchConfig,
    mut sink: Sink<'_>,
) -> Result<(), ReconstructError> {
    let info = resolver.resolve(file_hash, None)?;
    for term in &info.terms {
        let bytes = extract_term(term, &info, fetcher, config)?;
        if bytes.len() as u32 != term.unpacked_length {
            return Err(ReconstructError::SizeMismatch {
                expected: term.unpacked_length as u64,
                actual: bytes.len() as u64,
            });
        }
        sink.write_all(&bytes)?;
    }
    Ok(())
}

/// Reconstruct the half-open byte range `[start, end)` of the file into
/// `sink`, applying the resolver's `offset_into_first_range` skip and
/// stopping once `end - start` bytes have been written.
pub fn reconstruct_range(
    file_hash: &Hash,
    start: u64,
    end: u64,
    resolver: &dyn ReconstructionResolver,
    fetcher: &dyn fetcher::RangeFetcher,
    config: &FetchConfig,
    mut sink: Sink<'_>,
) -> Result<(), ReconstructError> {
    let info = resolver.resolve(file_hash, Some((start, end.saturating_sub(1))))?;

    let mut pending_skip = info.offset_into_first_range;
    let mut remaining = end - start;

    for term in &info.terms {
        if remaining == 0 {
            break;
        }
        let bytes = extract_term(term, &info, fetcher, config)?;

        let skip_here = pending_skip.min(bytes.len() as u64) as usize;
        pending_skip -= skip_here as u64;

        let available = bytes.len() - skip_here;
        let take = remaining.min(available as u64) as usize;
        sink.write_all(&bytes[skip_here..skip_here + take])?;
        remaining -= take as u64;
    }

    if remaining != 0 {
        return Err(ReconstructError::SizeMismatch { expected: end - start, actual: end - start - remaining });
    }
    Ok(())
}
