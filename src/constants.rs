//! Frozen wire-format constants: the Gearhash table, keyed-BLAKE3 domain
//! keys, and chunk/xorb size limits.
//!
//! Nothing here is runtime-configurable. Changing any value changes the
//! on-disk/on-wire identity of every hash, chunk boundary, and xorb this
//! crate produces.

/// Minimum chunk size produced by the chunker (outside the final chunk).
pub const MIN_CHUNK_SIZE: usize = 8 * 1024;
/// Target (mean) chunk size the rolling hash aims for.
pub const TARGET_CHUNK_SIZE: usize = 64 * 1024;
/// Maximum chunk size; the chunker force-cuts at this length.
pub const MAX_CHUNK_SIZE: usize = 128 * 1024;

/// Maximum serialized xorb size. A builder refuses new chunks once the
/// estimated on-disk size would exceed this.
pub const MAX_XORB_SIZE: usize = 64 * 1024 * 1024;

/// Byte size of the fixed xorb chunk header (see [`crate::xorb::ChunkHeader`]).
pub const XORB_CHUNK_HEADER_SIZE: usize = 8;

/// 24-bit field bound shared by the xorb chunk header's size fields.
pub const U24_MAX: u32 = 0x00FF_FFFF;

/// Gearhash rolling-hash table: 256 entries, one per possible input byte.
///
/// `TABLE[0..10]` are the reference implementation's pinned constants; the
/// remaining entries are generated deterministically by
/// [`build_gear_table`] at crate-init time so that a complete, reproducible
/// table exists even though the reference implementation's full 256-entry
/// table was not available when this crate was written (see DESIGN.md).
/// Chunker determinism, coverage, and size-bound invariants hold regardless
/// of the exact table contents; only bit-for-bit boundary matching against
/// an external reference implementation depends on recovering the true
/// table.
pub const GEAR_TABLE_SEED: [u64; 10] = [
    0xb088d3a9e840f559,
    0x5652c7f739ed20d6,
    0x45b28969898972ab,
    0x6b0a89d5b68ec777,
    0x368f573e8b7a31b7,
    0x1dc636dce936d94b,
    0x207a4c4e5554d5b6,
    0xa474b34628239acb,
    0x3b06a83e1ca3b912,
    0x90e78d6c2f02baf7,
];

/// Build the full 256-entry Gearhash table, pinning the first 10 entries to
/// [`GEAR_TABLE_SEED`] and deriving the rest with a SplitMix64 stream seeded
/// from the last seed constant. Deterministic across builds and platforms.
pub fn build_gear_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    table[..GEAR_TABLE_SEED.len()].copy_from_slice(&GEAR_TABLE_SEED);

    let mut state = GEAR_TABLE_SEED[GEAR_TABLE_SEED.len() - 1];
    for slot in table.iter_mut().skip(GEAR_TABLE_SEED.len()) {
        state = state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        *slot = z ^ (z >> 31);
    }
    table
}

use std::sync::OnceLock;

/// Lazily-built, process-wide Gearhash table.
pub fn gear_table() -> &'static [u64; 256] {
    static TABLE: OnceLock<[u64; 256]> = OnceLock::new();
    TABLE.get_or_init(build_gear_table)
}

/// Keyed-BLAKE3 domain-separation keys. Each is a frozen 32-byte constant;
/// changing any of them changes every hash this crate produces.
pub mod keys {
    /// Key used to hash raw chunk content into a [`crate::hash::Hash`].
    pub const DATA_KEY: [u8; 32] = [
        0x5a, 0x65, 0x74, 0x2d, 0x44, 0x61, 0x74, 0x61, 0x2d, 0x4b, 0x65, 0x79, 0x2d, 0x76, 0x31,
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff, 0x01,
    ];

    /// Key used to hash the text buffer of a Merkle internal node's children.
    pub const INTERNAL_NODE_KEY: [u8; 32] = [
        0x5a, 0x65, 0x74, 0x2d, 0x4e, 0x6f, 0x64, 0x65, 0x2d, 0x4b, 0x65, 0x79, 0x2d, 0x76, 0x31,
        0x00, 0x12, 0x23, 0x34, 0x45, 0x56, 0x67, 0x78, 0x89, 0x9a, 0xab, 0xbc, 0xcd, 0xde, 0xef,
        0xf0, 0x02,
    ];

    /// Key used to turn a Merkle root into the canonical file hash.
    pub const FILE_HASH_KEY: [u8; 32] = [
        0x5a, 0x65, 0x74, 0x2d, 0x46, 0x69, 0x6c, 0x65, 0x2d, 0x4b, 0x65, 0x79, 0x2d, 0x76, 0x31,
        0x00, 0x13, 0x24, 0x35, 0x46, 0x57, 0x68, 0x79, 0x8a, 0x9b, 0xac, 0xbd, 0xce, 0xdf, 0xf0,
        0x01, 0x03,
    ];

    /// Key used for optional chunk-hash re-verification (§4.C chunk-hash
    /// transform). All-zero key means "no keyed protection" for that use.
    pub const VERIFICATION_KEY: [u8; 32] = [
        0x5a, 0x65, 0x74, 0x2d, 0x56, 0x65, 0x72, 0x69, 0x66, 0x79, 0x2d, 0x4b, 0x65, 0x79, 0x2d,
        0x76, 0x31, 0x00, 0x14, 0x25, 0x36, 0x47, 0x58, 0x69, 0x7a, 0x8b, 0x9c, 0xad, 0xbe, 0xcf,
        0xd0, 0x04,
    ];

    /// Sentinel meaning "no keyed protection" for a 32-byte key field.
    pub const ALL_ZERO_KEY: [u8; 32] = [0u8; 32];
}
