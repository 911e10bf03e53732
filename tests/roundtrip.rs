//! Cross-module integration test: chunk a file, pack it into a xorb plus
//! shard on disk, then reconstruct it through [`LocalDirectoryResolver`]
//! and check the bytes match byte-for-byte.

use xet_core::chunker::chunk_all;
use xet_core::codec::CompressionType;
use xet_core::hash::{compute_data_hash, compute_file_hash, hash_to_hex, build_merkle_tree, MerkleNode};
use xet_core::reconstruct::fetcher::FetchConfig;
use xet_core::reconstruct::local::LocalDirectoryResolver;
use xet_core::reconstruct::{reconstruct_file, Sink};
use xet_core::shard::{Builder as ShardBuilder, CasChunkSequenceEntry, FileDataSequenceEntry};
use xet_core::xorb::Builder as XorbBuilder;

fn file_hash(data: &[u8]) -> xet_core::hash::Hash {
    let leaves: Vec<MerkleNode> = chunk_all(data)
        .iter()
        .map(|b| MerkleNode { hash: compute_data_hash(&data[b.start..b.end]), size: b.len() as u64 })
        .collect();
    compute_file_hash(&build_merkle_tree(&leaves))
}

#[test]
fn pack_then_reconstruct_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let data: Vec<u8> = (0u32..300_000).map(|i| (i % 241) as u8).collect();
    let boundaries = chunk_all(&data);

    let mut xorb = XorbBuilder::new(CompressionType::Lz4);
    for b in &boundaries {
        xorb.add_chunk(&data[b.start..b.end]).unwrap();
    }
    let xorb_hash = xorb.xorb_hash();
    let xorb_bytes = xorb.build();
    std::fs::write(dir.path().join(format!("{}.xorb", hash_to_hex(&xorb_hash))), &xorb_bytes).unwrap();

    let cas_entries: Vec<CasChunkSequenceEntry> = boundaries
        .iter()
        .map(|b| CasChunkSequenceEntry {
            chunk_hash: compute_data_hash(&data[b.start..b.end]),
            byte_offset: b.start as u64,
            size: b.len() as u32,
        })
        .collect();

    let mut shard = ShardBuilder::new();
    shard.add_cas_info(xorb_hash, &cas_entries, data.len() as u64, xorb_bytes.len() as u32);

    let hash = file_hash(&data);
    shard.add_file_info(
        hash,
        &[FileDataSequenceEntry {
            xorb_hash,
            chunk_start: 0,
            chunk_end: boundaries.len() as u32,
            unpacked_length: data.len() as u32,
        }],
    );
    std::fs::write(dir.path().join("shard.mdb"), shard.serialize()).unwrap();

    let resolver = LocalDirectoryResolver::open(dir.path()).unwrap();
    let mut out = Vec::new();
    reconstruct_file(&hash, &resolver, &resolver, &FetchConfig::default(), Sink::Buffer(&mut out)).unwrap();

    assert_eq!(out, data);
}

#[test]
fn reconstruct_of_unknown_file_hash_errors() {
    let dir = tempfile::tempdir().unwrap();
    let shard = ShardBuilder::new();
    std::fs::write(dir.path().join("shard.mdb"), shard.serialize()).unwrap();

    let resolver = LocalDirectoryResolver::open(dir.path()).unwrap();
    let mut out = Vec::new();
    let result = reconstruct_file(
        &xet_core::hash::Hash::ZERO,
        &resolver,
        &resolver,
        &FetchConfig::default(),
        Sink::Buffer(&mut out),
    );
    assert!(result.is_err());
    assert!(out.is_empty());
}
