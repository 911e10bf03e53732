//! Model-download helper — HF token exchange plus the reconstruction
//! engine entry point (§6, component J — boundary, not core).
//!
//! `HF_TOKEN` is read here and nowhere else; the core always takes the
//! access token as an explicit parameter.

use crate::cas_client::CasClient;
use crate::hash::Hash;
use crate::reconstruct::fetcher::{fetch_all, FetchConfig};
use crate::reconstruct::{reconstruct_file, ReconstructError, ReconstructionResolver, Sink};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HF_TOKEN environment variable is not set")]
    MissingToken,
    #[error("token exchange request failed: {0}")]
    Request(String),
    #[error("token exchange returned a non-success status: {0}")]
    ExchangeFailed(u16),
    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub repo_type: String,
    pub repo_id: String,
    pub revision: String,
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "casUrl")]
    cas_url: String,
    #[allow(dead_code)]
    exp: u64,
}

/// Exchange a Hugging Face Hub token for a short-lived CAS access token and
/// CAS base URL (§6 token-exchange collaborator).
pub fn exchange_token(hub_token: &str, config: &DownloadConfig) -> Result<(String, String), DownloadError> {
    let url = format!(
        "https://huggingface.co/api/{}s/{}/xet-read-token/{}",
        config.repo_type, config.repo_id, config.revision
    );

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client construction must not fail with default TLS config");

    let response = client
        .get(&url)
        .bearer_auth(hub_token)
        .send()
        .map_err(|e| DownloadError::Request(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::ExchangeFailed(response.status().as_u16()));
    }

    let parsed: TokenExchangeResponse =
        response.json().map_err(|e| DownloadError::Request(e.to_string()))?;
    Ok((parsed.cas_url, parsed.access_token))
}

/// Read `HF_TOKEN` from the environment and fetch `file_hash` into an
/// in-memory buffer, end to end: token exchange, CAS client construction,
/// and whole-file reconstruction.
pub fn download_file(file_hash: &Hash, config: &DownloadConfig) -> Result<Vec<u8>, DownloadError> {
    let hub_token = std::env::var("HF_TOKEN").map_err(|_| DownloadError::MissingToken)?;
    let (cas_url, access_token) = exchange_token(&hub_token, config)?;
    let client = CasClient::new(cas_url, access_token, &config.fetch);

    let mut out = Vec::new();
    reconstruct_file(file_hash, &client, &client, &config.fetch, Sink::Buffer(&mut out))?;
    Ok(out)
}

/// As [`download_file`], but resolves reconstruction terms through the
/// parallel fetcher instead of the single-threaded engine path.
pub fn download_file_parallel(file_hash: &Hash, config: &DownloadConfig) -> Result<Vec<u8>, DownloadError> {
    let hub_token = std::env::var("HF_TOKEN").map_err(|_| DownloadError::MissingToken)?;
    let (cas_url, access_token) = exchange_token(&hub_token, config)?;
    let client = CasClient::new(cas_url, access_token, &config.fetch);

    let info = client.resolve(file_hash, None)?;
    let parts = fetch_all(&info, &client, &config.fetch)?;
    Ok(parts.into_iter().flatten().collect())
}
