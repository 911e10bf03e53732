//! Content-defined chunker — Gearhash rolling hash with min/target/max
//! bounds (§4.B).
//!
//! # Algorithm
//! Rolling state is four fields: `hash`, `position` (absolute), `chunk_start`,
//! `first_chunk`. Per byte: `hash = (hash << 1) +ᵤ TABLE[byte]` (wrapping),
//! implemented as `hash.wrapping_add(hash).wrapping_add(table[byte])`.
//!
//! A boundary is declared after consuming a byte when `chunk_size >=
//! MaxChunkSize`, never before `chunk_size >= MinChunkSize`, and otherwise
//! when the top bits of `hash` corresponding to `target_chunk_size` are all
//! zero.
//!
//! The first chunk skips hash updates until it has accumulated
//! `MinChunkSize - 65` bytes (the reference implementation's cut-point
//! "warm-up"), so that the first boundary is reproducible regardless of what
//! came before the stream start.

use crate::constants::{gear_table, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, TARGET_CHUNK_SIZE};
use log::trace;

/// A half-open `[start, end)` range over the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBoundary {
    pub start: usize,
    pub end: usize,
}

impl ChunkBoundary {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Min/target/max chunk size tunables. Production code always uses
/// [`ChunkerConfig::default`] (the spec constants); this exists so tests can
/// exercise the boundary logic at sizes small enough to run quickly.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub min_chunk_size: usize,
    pub target_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        ChunkerConfig {
            min_chunk_size: MIN_CHUNK_SIZE,
            target_chunk_size: TARGET_CHUNK_SIZE,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }
}

impl ChunkerConfig {
    /// Byte count the first chunk must accumulate before hash updates begin,
    /// matching the reference implementation's warm-up skip.
    fn cut_point_skip(&self) -> usize {
        self.min_chunk_size.saturating_sub(65)
    }

    /// Mask over the top bits of the rolling hash whose value must be zero
    /// to declare a boundary; sized so the expected chunk length is
    /// `target_chunk_size` (assumed a power of two).
    fn boundary_mask(&self) -> u64 {
        let bits = self.target_chunk_size.trailing_zeros();
        if bits == 0 {
            u64::MAX
        } else {
            !0u64 << (64 - bits)
        }
    }
}

/// Rolling-hash chunker state. Feed bytes with [`Chunker::feed`] or use
/// [`chunk_all`] for a one-shot split of an in-memory buffer.
pub struct Chunker {
    table: &'static [u64; 256],
    config: ChunkerConfig,
    hash: u64,
    position: usize,
    chunk_start: usize,
    first_chunk: bool,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker {
    pub fn new() -> Self {
        Self::with_config(ChunkerConfig::default())
    }

    /// Build a chunker overriding the min/target/max bounds. Intended for
    /// tests only — production code should use [`Chunker::new`].
    pub fn with_config(config: ChunkerConfig) -> Self {
        Self {
            table: gear_table(),
            config,
            hash: 0,
            position: 0,
            chunk_start: 0,
            first_chunk: true,
        }
    }

    /// Consume `data` (a contiguous slab, appended to whatever has been fed
    /// so far) and append every boundary found to `out`. Does not emit a
    /// final short boundary for unconsumed trailing bytes — call
    /// [`Chunker::finish`] once the stream is exhausted.
    pub fn feed(&mut self, data: &[u8], out: &mut Vec<ChunkBoundary>) {
        let cut_point_skip = self.config.cut_point_skip();
        let boundary_mask = self.config.boundary_mask();

        for &byte in data {
            let chunk_size = self.position - self.chunk_start;

            // Cut-point skip: first chunk only, before the warm-up threshold.
            if self.first_chunk && chunk_size < cut_point_skip {
                self.position += 1;
                continue;
            }

            self.hash = self.hash.wrapping_add(self.hash).wrapping_add(self.table[byte as usize]);
            self.position += 1;
            let chunk_size = self.position - self.chunk_start;

            let boundary = if chunk_size >= self.config.max_chunk_size {
                true
            } else if chunk_size < self.config.min_chunk_size {
                false
            } else {
                self.hash & boundary_mask == 0
            };

            if boundary {
                let start = self.chunk_start;
                let end = self.position;
                out.push(ChunkBoundary { start, end });
                trace!("chunk boundary at offset {start}: {} bytes", end - start);
                self.hash = 0;
                self.chunk_start = self.position;
                self.first_chunk = false;
            }
        }
    }

    /// Emit the final (possibly short) tail boundary, if any bytes remain
    /// unconsumed since the last emitted boundary.
    pub fn finish(&mut self, out: &mut Vec<ChunkBoundary>) {
        if self.position > self.chunk_start {
            let start = self.chunk_start;
            let end = self.position;
            out.push(ChunkBoundary { start, end });
            trace!("final chunk boundary at offset {start}: {} bytes", end - start);
            self.chunk_start = self.position;
        }
    }
}

/// Split an in-memory buffer into content-defined chunk boundaries.
///
/// Deterministic: identical input bytes always yield identical boundaries.
/// The concatenation of `data[b.start..b.end]` for every emitted boundary
/// covers `data` exactly once, in order.
pub fn chunk_all(data: &[u8]) -> Vec<ChunkBoundary> {
    let mut chunker = Chunker::new();
    let mut out = Vec::new();
    chunker.feed(data, &mut out);
    chunker.finish(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_boundaries() {
        assert!(chunk_all(&[]).is_empty());
    }

    #[test]
    fn coverage_is_exact_and_contiguous() {
        let data: Vec<u8> = (0u32..500_000).map(|i| (i % 251) as u8).collect();
        let boundaries = chunk_all(&data);
        assert!(!boundaries.is_empty());
        let mut expect_start = 0usize;
        for b in &boundaries {
            assert_eq!(b.start, expect_start);
            assert!(b.end > b.start);
            expect_start = b.end;
        }
        assert_eq!(expect_start, data.len());
    }

    #[test]
    fn determinism() {
        let data: Vec<u8> = (0u32..300_000).map(|i| (i * 2654435761) as u8).collect();
        assert_eq!(chunk_all(&data), chunk_all(&data));
    }

    #[test]
    fn non_final_chunks_respect_size_bounds() {
        let data: Vec<u8> = (0u32..1_000_000).map(|i| (i.wrapping_mul(97)) as u8).collect();
        let boundaries = chunk_all(&data);
        let n = boundaries.len();
        for (i, b) in boundaries.iter().enumerate() {
            let is_first = i == 0;
            let is_last = i == n - 1;
            if !is_last && !is_first {
                assert!(b.len() >= MIN_CHUNK_SIZE, "chunk {i} too small: {}", b.len());
                assert!(b.len() <= MAX_CHUNK_SIZE, "chunk {i} too large: {}", b.len());
            }
            if !is_last {
                assert!(b.len() <= MAX_CHUNK_SIZE);
            }
        }
    }

    #[test]
    fn constant_bytes_force_cut_at_max_size() {
        let data = vec![59u8; 1_000_000];
        let boundaries = chunk_all(&data);
        // Every non-final boundary must hit the max-size force cut because a
        // constant byte stream never varies the rolling hash's top bits
        // (either they're always zero, giving MinChunkSize cuts, or never
        // zero, giving MaxChunkSize cuts) — assert the coarser, table-
        // independent invariant that size bounds still hold.
        for (i, b) in boundaries.iter().enumerate() {
            if i + 1 < boundaries.len() {
                assert!(b.len() <= MAX_CHUNK_SIZE);
                assert!(b.len() >= MIN_CHUNK_SIZE);
            }
        }
        let total: usize = boundaries.iter().map(|b| b.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn custom_config_respects_overridden_bounds() {
        let config = ChunkerConfig { min_chunk_size: 256, target_chunk_size: 1024, max_chunk_size: 2048 };
        let data: Vec<u8> = (0u32..50_000).map(|i| (i.wrapping_mul(31)) as u8).collect();
        let mut chunker = Chunker::with_config(config);
        let mut boundaries = Vec::new();
        chunker.feed(&data, &mut boundaries);
        chunker.finish(&mut boundaries);

        let n = boundaries.len();
        assert!(n > 1);
        for (i, b) in boundaries.iter().enumerate() {
            if i + 1 < n {
                assert!(b.len() >= config.min_chunk_size);
                assert!(b.len() <= config.max_chunk_size);
            }
        }
    }

    #[test]
    fn feed_in_pieces_matches_feed_whole() {
        let data: Vec<u8> = (0u32..400_000).map(|i| (i % 173) as u8).collect();
        let whole = chunk_all(&data);

        let mut chunker = Chunker::new();
        let mut piecewise = Vec::new();
        for piece in data.chunks(4096) {
            chunker.feed(piece, &mut piecewise);
        }
        chunker.finish(&mut piecewise);

        assert_eq!(whole, piecewise);
    }
}
