//! Demo CLI over the xet-core library: chunk/hash files, pack and inspect
//! xorbs and shards, and reconstruct a file from a local directory of
//! xorbs (no network — see [`xet_core::reconstruct::local`]).

use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;
use xet_core::chunker::chunk_all;
use xet_core::codec::CompressionType;
use xet_core::hash::{compute_data_hash, compute_file_hash, hash_to_hex, hex_to_hash, Hash};
use xet_core::reconstruct::fetcher::FetchConfig;
use xet_core::reconstruct::local::LocalDirectoryResolver;
use xet_core::reconstruct::{reconstruct_file, Sink};
use xet_core::shard::{Builder as ShardBuilder, CasChunkSequenceEntry, FileDataSequenceEntry, Reader as ShardReader};
use xet_core::xorb::{Builder as XorbBuilder, Reader as XorbReader};

#[derive(Parser)]
#[command(name = "xet-cli", about = "Xet CAS chunker/xorb/shard toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a file into content-defined chunks and print their boundaries.
    Chunk { path: PathBuf },
    /// Compute the canonical file hash (Merkle root over chunk hashes).
    HashFile { path: PathBuf },
    /// Pack a file's chunks into a xorb under `out_dir`.
    PackXorb {
        path: PathBuf,
        #[arg(long, default_value = "lz4")]
        compression: String,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the chunk list of an existing xorb file.
    InspectXorb { path: PathBuf },
    /// Pack one or more files into xorbs plus a shard under `out_dir`.
    PackShard {
        paths: Vec<PathBuf>,
        #[arg(long, default_value = "lz4")]
        compression: String,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the file-info and CAS-info sections of a shard.
    InspectShard { path: PathBuf },
    /// Reconstruct a file hash from a local directory of xorbs + shard.
    Reconstruct {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        file_hash: String,
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_compression(s: &str) -> CompressionType {
    match s {
        "none" => CompressionType::None,
        "lz4" => CompressionType::Lz4,
        "bytegroup" => CompressionType::ByteGrouping4Lz4,
        "bitslice" => CompressionType::FullBitsliceLz4,
        other => {
            eprintln!("unknown compression '{other}', defaulting to lz4");
            CompressionType::Lz4
        }
    }
}

fn file_hash_for(data: &[u8]) -> Hash {
    let leaves: Vec<_> = chunk_all(data)
        .iter()
        .map(|b| xet_core::hash::MerkleNode {
            hash: compute_data_hash(&data[b.start..b.end]),
            size: b.len() as u64,
        })
        .collect();
    let root = xet_core::hash::build_merkle_tree(&leaves);
    compute_file_hash(&root)
}

fn cmd_chunk(path: PathBuf) -> anyhow::Result<()> {
    let data = fs::read(&path)?;
    let boundaries = chunk_all(&data);
    for (i, b) in boundaries.iter().enumerate() {
        let hash = compute_data_hash(&data[b.start..b.end]);
        println!("chunk {i}: [{}, {}) len={} hash={}", b.start, b.end, b.len(), hash_to_hex(&hash));
    }
    println!("{} chunks, {} bytes", boundaries.len(), data.len());
    Ok(())
}

fn cmd_hash_file(path: PathBuf) -> anyhow::Result<()> {
    let data = fs::read(&path)?;
    println!("{}", hash_to_hex(&file_hash_for(&data)));
    Ok(())
}

fn cmd_pack_xorb(path: PathBuf, compression: String, out_dir: PathBuf) -> anyhow::Result<()> {
    let data = fs::read(&path)?;
    let ty = parse_compression(&compression);
    let mut builder = XorbBuilder::new(ty);
    for b in chunk_all(&data) {
        builder.add_chunk(&data[b.start..b.end])?;
    }
    let hash = builder.xorb_hash();
    let bytes = builder.build();

    fs::create_dir_all(&out_dir)?;
    let out_path = out_dir.join(format!("{}.xorb", hash_to_hex(&hash)));
    fs::write(&out_path, &bytes)?;
    info!("wrote xorb {} ({} bytes)", out_path.display(), bytes.len());
    println!("{}", hash_to_hex(&hash));
    Ok(())
}

fn cmd_inspect_xorb(path: PathBuf) -> anyhow::Result<()> {
    let bytes = fs::read(&path)?;
    let mut reader = XorbReader::new(&bytes);
    let mut idx = 0u32;
    while let Some(chunk) = reader.next_chunk()? {
        println!("chunk {idx}: {} bytes", chunk.len());
        idx += 1;
    }
    Ok(())
}

fn cmd_pack_shard(paths: Vec<PathBuf>, compression: String, out_dir: PathBuf) -> anyhow::Result<()> {
    fs::create_dir_all(&out_dir)?;
    let ty = parse_compression(&compression);
    let mut shard = ShardBuilder::new();

    for path in paths {
        let data = fs::read(&path)?;
        let boundaries = chunk_all(&data);

        let mut xorb = XorbBuilder::new(ty);
        for b in &boundaries {
            xorb.add_chunk(&data[b.start..b.end])?;
        }
        let xorb_hash = xorb.xorb_hash();
        let xorb_bytes = xorb.build();
        fs::write(out_dir.join(format!("{}.xorb", hash_to_hex(&xorb_hash))), &xorb_bytes)?;

        let cas_entries: Vec<CasChunkSequenceEntry> = boundaries
            .iter()
            .map(|b| CasChunkSequenceEntry {
                chunk_hash: compute_data_hash(&data[b.start..b.end]),
                byte_offset: b.start as u64,
                size: b.len() as u32,
            })
            .collect();
        shard.add_cas_info(xorb_hash, &cas_entries, data.len() as u64, xorb_bytes.len() as u32);

        let file_hash = file_hash_for(&data);
        shard.add_file_info(
            file_hash,
            &[FileDataSequenceEntry {
                xorb_hash,
                chunk_start: 0,
                chunk_end: boundaries.len() as u32,
                unpacked_length: data.len() as u32,
            }],
        );
        println!("{} -> file {} xorb {}", path.display(), hash_to_hex(&file_hash), hash_to_hex(&xorb_hash));
    }

    fs::write(out_dir.join("shard.mdb"), shard.serialize())?;
    Ok(())
}

fn cmd_inspect_shard(path: PathBuf) -> anyhow::Result<()> {
    let bytes = fs::read(&path)?;
    let reader = ShardReader::parse(&bytes)?;
    for (header, entries) in reader.parse_file_info()? {
        println!("file {} ({} entries)", hash_to_hex(&header.file_hash), entries.len());
        for e in entries {
            println!("  xorb {} chunks [{}, {}) len={}", hash_to_hex(&e.xorb_hash), e.chunk_start, e.chunk_end, e.unpacked_length);
        }
    }
    for loc in reader.parse_cas_info()? {
        println!("cas: xorb {} chunk {} @ {} ({} bytes)", hash_to_hex(&loc.xorb_hash), hash_to_hex(&loc.chunk_hash), loc.byte_offset, loc.size);
    }
    Ok(())
}

fn cmd_reconstruct(dir: PathBuf, file_hash: String, out: PathBuf) -> anyhow::Result<()> {
    let resolver = LocalDirectoryResolver::open(&dir)?;
    let hash = hex_to_hash(&file_hash)?;
    let mut buf = Vec::new();
    reconstruct_file(&hash, &resolver, &resolver, &FetchConfig::default(), Sink::Buffer(&mut buf))?;
    fs::write(&out, &buf)?;
    info!("reconstructed {} bytes to {}", buf.len(), out.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Chunk { path } => cmd_chunk(path),
        Command::HashFile { path } => cmd_hash_file(path),
        Command::PackXorb { path, compression, out_dir } => cmd_pack_xorb(path, compression, out_dir),
        Command::InspectXorb { path } => cmd_inspect_xorb(path),
        Command::PackShard { paths, compression, out_dir } => cmd_pack_shard(paths, compression, out_dir),
        Command::InspectShard { path } => cmd_inspect_shard(path),
        Command::Reconstruct { dir, file_hash, out } => cmd_reconstruct(dir, file_hash, out),
    }
}
