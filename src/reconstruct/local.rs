//! Local-directory resolver — an offline stand-in for the CAS client
//! boundary, used by the demo CLI's `reconstruct` subcommand and by
//! integration tests so the engine can be exercised without a live HTTP
//! server.
//!
//! Layout: a directory holding one `<xorb-hex>.xorb` file per xorb and one
//! `shard.mdb` file (this crate's shard format) recording which files map
//! to which xorb chunk ranges.

use super::fetcher::{RangeFetcher, TransportError};
use super::{ChunkRange, FetchInfo, ReconstructError, ReconstructionInfo, ReconstructionResolver, ReconstructionTerm};
use crate::hash::{hash_to_hex, Hash};
use crate::shard::Reader as ShardReader;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves reconstruction info from a local directory of xorb files plus
/// one shard file, instead of a remote CAS endpoint.
pub struct LocalDirectoryResolver {
    dir: PathBuf,
    xorbs: HashMap<String, Vec<u8>>,
    shard_bytes: Vec<u8>,
}

impl LocalDirectoryResolver {
    /// Load every `*.xorb` file and `shard.mdb` from `dir` into memory.
    pub fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut xorbs = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("xorb") {
                let hex = path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_string();
                xorbs.insert(hex, fs::read(&path)?);
            }
        }
        let shard_bytes = fs::read(dir.join("shard.mdb"))?;
        Ok(LocalDirectoryResolver { dir, xorbs, shard_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Per-xorb ordered list of chunk hashes, read once from the shard's
    /// CAS-info section via [`ShardReader::parse_cas_info`].
    fn chunk_hashes_by_xorb(&self) -> Result<HashMap<Hash, Vec<Hash>>, ReconstructError> {
        let reader = ShardReader::parse(&self.shard_bytes)
            .map_err(|e| ReconstructError::Resolver(e.to_string()))?;
        let locations = reader.parse_cas_info().map_err(|e| ReconstructError::Resolver(e.to_string()))?;
        let mut out: HashMap<Hash, Vec<Hash>> = HashMap::new();
        for loc in locations {
            out.entry(loc.xorb_hash).or_default().push(loc.chunk_hash);
        }
        Ok(out)
    }
}

impl ReconstructionResolver for LocalDirectoryResolver {
    fn resolve(
        &self,
        file_hash: &Hash,
        _range: Option<(u64, u64)>,
    ) -> Result<ReconstructionInfo, ReconstructError> {
        let reader =
            ShardReader::parse(&self.shard_bytes).map_err(|e| ReconstructError::Resolver(e.to_string()))?;
        let files = reader.parse_file_info().map_err(|e| ReconstructError::Resolver(e.to_string()))?;

        let (_, entries) = files
            .into_iter()
            .find(|(h, _)| h.file_hash == *file_hash)
            .ok_or_else(|| ReconstructError::Resolver(format!("no such file: {}", hash_to_hex(file_hash))))?;

        let chunk_hashes_by_xorb = self.chunk_hashes_by_xorb()?;
        let mut terms = Vec::with_capacity(entries.len());
        let mut fetch_info: HashMap<String, Vec<FetchInfo>> = HashMap::new();

        for entry in entries {
            let xorb_chunk_hashes = chunk_hashes_by_xorb.get(&entry.xorb_hash).ok_or_else(|| {
                ReconstructError::MissingFetchInfo { xorb_hash: hash_to_hex(&entry.xorb_hash) }
            })?;
            let chunk_hashes = xorb_chunk_hashes
                .get(entry.chunk_start as usize..entry.chunk_end as usize)
                .ok_or_else(|| ReconstructError::NoMatchingFetchInfo {
                    xorb_hash: hash_to_hex(&entry.xorb_hash),
                    start: entry.chunk_start,
                    end: entry.chunk_end,
                })?
                .to_vec();

            terms.push(ReconstructionTerm {
                xorb_hash: entry.xorb_hash,
                unpacked_length: entry.unpacked_length,
                chunk_range: ChunkRange { start: entry.chunk_start, end: entry.chunk_end },
                chunk_hashes,
            });

            let hex = hash_to_hex(&entry.xorb_hash);
            if !fetch_info.contains_key(&hex) {
                let total_chunks = xorb_chunk_hashes.len() as u32;
                fetch_info.insert(
                    hex.clone(),
                    vec![FetchInfo {
                        chunk_range: ChunkRange { start: 0, end: total_chunks },
                        url: hex,
                        byte_range: (0, self.xorbs.get(&hash_to_hex(&entry.xorb_hash)).map(|b| b.len() as u64).unwrap_or(0)),
                    }],
                );
            }
        }

        Ok(ReconstructionInfo { offset_into_first_range: 0, terms, fetch_info })
    }
}

impl RangeFetcher for LocalDirectoryResolver {
    fn fetch_range(&self, url: &str, _byte_range: (u64, u64)) -> Result<Vec<u8>, TransportError> {
        self.xorbs.get(url).cloned().ok_or(TransportError::NotFound)
    }
}
