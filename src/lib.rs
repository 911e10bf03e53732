//! xet-core — client-side implementation of the Xet content-addressed
//! storage protocol.
//!
//! Format guarantees:
//! - All multi-byte fields are little-endian; never negotiated.
//! - Every hash is keyed BLAKE3 under one of four fixed domain keys; hashes
//!   render as 64-character lowercase "API hex".
//! - A xorb is an unframed concatenation of `(8-byte header, compressed
//!   payload)` records; chunks are addressed by sequential index.
//! - An MDB shard is `header(48B) . file-info . bookend(48B) . cas-info .
//!   bookend(48B) . footer(200B)`; every record is exactly 48 bytes.
//! - Reconstruction assembly is strictly ordered by term index even though
//!   fetching happens concurrently (see [`reconstruct::fetcher`]).

pub mod cas_client;
pub mod chunker;
pub mod codec;
pub mod constants;
pub mod download;
pub mod hash;
pub mod reconstruct;
pub mod shard;
pub mod xorb;

pub use chunker::{chunk_all, ChunkBoundary, Chunker};
pub use hash::{
    build_merkle_tree, compute_data_hash, compute_file_hash, compute_file_hash_salted,
    compute_internal_node_hash, hash_to_hex, hex_to_hash, transform_chunk_hash, Hash, HashError,
    MerkleNode,
};
pub use reconstruct::{
    reconstruct_file, reconstruct_range, ChunkRange, FetchInfo, ReconstructError,
    ReconstructionInfo, ReconstructionResolver, ReconstructionTerm, Sink,
};
