//! Keyed BLAKE3 hashing, hex codec, and variable-branching Merkle
//! aggregation (§4.C).

use crate::constants::keys;
use thiserror::Error;

/// A 32-byte keyed-BLAKE3 hash. The canonical wire identity of a chunk,
/// xorb, or file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HashError {
    #[error("hash hex string must be exactly 64 characters, got {actual}")]
    InvalidHexLength { actual: usize },
    #[error("hash hex string contains a non-hex-digit character")]
    InvalidHexChar,
}

/// Render a [`Hash`] as 64 lowercase hex digits: the 32 bytes are read as
/// four little-endian u64 words, each emitted MSB-first as 16 hex digits.
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut out = String::with_capacity(64);
    for word_idx in 0..4 {
        let start = word_idx * 8;
        let word = u64::from_le_bytes(hash.0[start..start + 8].try_into().unwrap());
        out.push_str(&format!("{word:016x}"));
    }
    out
}

/// Parse the "API hex" form produced by [`hash_to_hex`] back into a [`Hash`].
pub fn hex_to_hash(s: &str) -> Result<Hash, HashError> {
    if s.len() != 64 {
        return Err(HashError::InvalidHexLength { actual: s.len() });
    }
    let mut bytes = [0u8; 32];
    for word_idx in 0..4 {
        let chunk = &s[word_idx * 16..word_idx * 16 + 16];
        let word = u64::from_str_radix(chunk, 16).map_err(|_| HashError::InvalidHexChar)?;
        bytes[word_idx * 8..word_idx * 8 + 8].copy_from_slice(&word.to_le_bytes());
    }
    Ok(Hash(bytes))
}

#[inline]
fn keyed_blake3(key: &[u8; 32], data: &[u8]) -> Hash {
    Hash(*blake3::keyed_hash(key, data).as_bytes())
}

/// Hash raw chunk content under the data domain key.
pub fn compute_data_hash(data: &[u8]) -> Hash {
    keyed_blake3(&keys::DATA_KEY, data)
}

/// Hash a Merkle internal-node text buffer under the internal-node domain key.
pub fn compute_internal_node_hash(data: &[u8]) -> Hash {
    keyed_blake3(&keys::INTERNAL_NODE_KEY, data)
}

/// Turn a Merkle root into the canonical file hash.
pub fn compute_file_hash(merkle_root: &Hash) -> Hash {
    keyed_blake3(&keys::FILE_HASH_KEY, &merkle_root.0)
}

/// File-hash with a custom 32-byte salt. `salt = [0u8; 32]` is identical to
/// [`compute_file_hash`].
pub fn compute_file_hash_salted(merkle_root: &Hash, salt: &[u8; 32]) -> Hash {
    if *salt == keys::ALL_ZERO_KEY {
        return compute_file_hash(merkle_root);
    }
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(salt);
    buf[32..].copy_from_slice(&merkle_root.0);
    keyed_blake3(&keys::FILE_HASH_KEY, &buf)
}

/// Keyed chunk-hash transform (§4.C): pass-through if `key` is all zero,
/// otherwise re-hash under the given key.
pub fn transform_chunk_hash(hash: &Hash, key: &[u8; 32]) -> Hash {
    if *key == keys::ALL_ZERO_KEY {
        *hash
    } else {
        keyed_blake3(key, &hash.0)
    }
}

// ── Merkle aggregation ───────────────────────────────────────────────────

/// A node in the Merkle tree: leaves carry chunk hashes, internal nodes
/// carry the aggregated hash of a variable-width group of children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleNode {
    pub hash: Hash,
    pub size: u64,
}

/// Minimum and maximum children per aggregation group; mean branching
/// factor 4 (scan window `[i+2, i+9]`, trigger on `hash_tail % 4 == 0`).
const MIN_GROUP: usize = 2;
const MAX_GROUP: usize = 9;
const BRANCH_MODULUS: u64 = 4;

/// Read the last 8 bytes of a hash as a little-endian u64, used to decide
/// where a Merkle aggregation group ends.
fn group_trigger_value(hash: &Hash) -> u64 {
    u64::from_le_bytes(hash.0[24..32].try_into().unwrap())
}

/// Merge a group of sibling nodes into one internal node: hash the
/// concatenation of `"{hex} : {size}\n"` per child under the internal-node
/// key; the merged size is the sum of child sizes.
fn merge_group(children: &[MerkleNode]) -> MerkleNode {
    let mut buf = String::new();
    let mut total_size = 0u64;
    for child in children {
        buf.push_str(&hash_to_hex(&child.hash));
        buf.push_str(" : ");
        buf.push_str(&child.size.to_string());
        buf.push('\n');
        total_size += child.size;
    }
    MerkleNode {
        hash: compute_internal_node_hash(buf.as_bytes()),
        size: total_size,
    }
}

/// One pass over `nodes`, grouping left-to-right with the variable
/// branching rule and returning the (shorter) list of merged nodes.
fn merge_pass(nodes: &[MerkleNode]) -> Vec<MerkleNode> {
    let mut out = Vec::with_capacity(nodes.len() / 2 + 1);
    let mut i = 0usize;
    while i < nodes.len() {
        let window_end = (i + MAX_GROUP).min(nodes.len());
        let mut group_end = window_end;
        let mut found = false;
        let mut k = i + MIN_GROUP;
        while k < window_end {
            if group_trigger_value(&nodes[k].hash) % BRANCH_MODULUS == 0 {
                group_end = k + 1;
                found = true;
                break;
            }
            k += 1;
        }
        let _ = found;
        out.push(merge_group(&nodes[i..group_end]));
        i = group_end;
    }
    out
}

/// Aggregate an ordered list of leaf nodes into a single 32-byte Merkle
/// root. Empty input yields the all-zero hash; a single leaf's hash passes
/// through unchanged.
pub fn build_merkle_tree(leaves: &[MerkleNode]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    if leaves.len() == 1 {
        return leaves[0].hash;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = merge_pass(&level);
    }
    level[0].hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let h = compute_data_hash(b"hello world");
        let hex = hash_to_hex(&h);
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(hex_to_hash(&hex).unwrap(), h);
    }

    #[test]
    fn hex_rejects_wrong_length() {
        assert_eq!(hex_to_hash("abcd"), Err(HashError::InvalidHexLength { actual: 4 }));
    }

    #[test]
    fn hex_rejects_non_hex_chars() {
        let bad = "g".repeat(64);
        assert_eq!(hex_to_hash(&bad), Err(HashError::InvalidHexChar));
    }

    #[test]
    fn merkle_empty_is_zero() {
        assert_eq!(build_merkle_tree(&[]), Hash::ZERO);
    }

    #[test]
    fn merkle_single_leaf_is_identity() {
        let leaf = MerkleNode { hash: compute_data_hash(b"x"), size: 42 };
        assert_eq!(build_merkle_tree(&[leaf]), leaf.hash);
    }

    #[test]
    fn merkle_is_deterministic() {
        let leaves: Vec<MerkleNode> = (0u8..50)
            .map(|i| MerkleNode { hash: compute_data_hash(&[i]), size: i as u64 + 1 })
            .collect();
        assert_eq!(build_merkle_tree(&leaves), build_merkle_tree(&leaves));
    }

    #[test]
    fn chunk_hash_transform_passthrough_on_zero_key() {
        let h = compute_data_hash(b"payload");
        assert_eq!(transform_chunk_hash(&h, &keys::ALL_ZERO_KEY), h);
    }

    #[test]
    fn chunk_hash_transform_rekeys_on_nonzero_key() {
        let h = compute_data_hash(b"payload");
        let key = [7u8; 32];
        let transformed = transform_chunk_hash(&h, &key);
        assert_ne!(transformed, h);
    }

    #[test]
    fn salted_file_hash_matches_unsalted_on_zero_salt() {
        let root = compute_data_hash(b"root");
        assert_eq!(compute_file_hash_salted(&root, &[0u8; 32]), compute_file_hash(&root));
    }
}
