//! Universal invariants from the testable-properties set, run as property
//! tests over arbitrary byte buffers rather than fixed vectors.

use proptest::prelude::*;
use xet_core::chunker::chunk_all;
use xet_core::codec::{apply_byte_grouping, apply_full_bitslice, compress, decompress, reverse_byte_grouping, reverse_full_bitslice, CompressionType};
use xet_core::hash::{build_merkle_tree, compute_data_hash, hash_to_hex, hex_to_hash, MerkleNode};

proptest! {
    #[test]
    fn chunker_coverage_and_determinism(data in prop::collection::vec(any::<u8>(), 0..20_000)) {
        let a = chunk_all(&data);
        let b = chunk_all(&data);
        prop_assert_eq!(&a, &b);

        let mut cursor = 0usize;
        for boundary in &a {
            prop_assert_eq!(boundary.start, cursor);
            cursor = boundary.end;
        }
        prop_assert_eq!(cursor, data.len());
    }

    #[test]
    fn hash_hex_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let h = compute_data_hash(&data);
        let hex = hash_to_hex(&h);
        prop_assert_eq!(hex.len(), 64);
        prop_assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        prop_assert_eq!(hex_to_hash(&hex).unwrap(), h);
    }

    #[test]
    fn byte_grouping_is_its_own_inverse_pair(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let grouped = apply_byte_grouping(&data);
        prop_assert_eq!(reverse_byte_grouping(&grouped), data);
    }

    #[test]
    fn bitslice_is_its_own_inverse_pair(data in prop::collection::vec(any::<u8>(), 1..2048)) {
        let sliced = apply_full_bitslice(&data);
        prop_assert_eq!(reverse_full_bitslice(&sliced), data);
    }

    #[test]
    fn codec_round_trip_for_every_type(data in prop::collection::vec(any::<u8>(), 0..8192)) {
        for ty in [CompressionType::None, CompressionType::Lz4, CompressionType::ByteGrouping4Lz4, CompressionType::FullBitsliceLz4] {
            let c = compress(&data, ty).unwrap();
            let d = decompress(&c.bytes, c.tag, data.len() as u32).unwrap();
            prop_assert_eq!(d, data.clone());
        }
    }

    #[test]
    fn codec_fallback_never_grows_beyond_verbatim(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let c = compress(&data, CompressionType::Lz4).unwrap();
        if c.tag == CompressionType::None {
            prop_assert_eq!(&c.bytes, &data);
        } else {
            prop_assert!(c.bytes.len() < data.len());
        }
    }

    #[test]
    fn merkle_single_leaf_is_identity(seed in any::<u64>(), size in any::<u64>()) {
        let leaf = MerkleNode { hash: compute_data_hash(&seed.to_le_bytes()), size };
        prop_assert_eq!(build_merkle_tree(&[leaf]), leaf.hash);
    }
}

#[test]
fn merkle_empty_list_is_zero_hash() {
    assert_eq!(build_merkle_tree(&[]), xet_core::hash::Hash::ZERO);
}
