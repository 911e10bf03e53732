//! Parallel fetcher — a worker pool wrapping per-term reconstruction work
//! (§4.H, §5).
//!
//! Shared state is limited to three things, each protected by a single
//! mutex: the work stack, the results array (workers write disjoint
//! indices), and the first-error slot. Everything else — HTTP client, xorb
//! reader, per-term buffers — is worker-local.

use super::{extract_term, ReconstructError, ReconstructionInfo, ReconstructionTerm};
use log::{debug, error};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Transport-layer failure classification. `is_retryable` is part of the
/// public contract: the core never retries internally, but callers need to
/// know which failures are worth retrying.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("range not satisfiable")]
    RangeNotSatisfiable,
    #[error("too many requests")]
    TooManyRequests,
    #[error("internal server error")]
    InternalServerError,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("gateway timeout")]
    GatewayTimeout,
    #[error("network error")]
    Network,
}

impl TransportError {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            TransportError::TooManyRequests
                | TransportError::InternalServerError
                | TransportError::ServiceUnavailable
                | TransportError::GatewayTimeout
                | TransportError::Network
        )
    }

    /// Classify an HTTP status code per the taxonomy in §6/§7.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(TransportError::BadRequest),
            401 => Some(TransportError::Unauthorized),
            403 => Some(TransportError::Forbidden),
            404 => Some(TransportError::NotFound),
            416 => Some(TransportError::RangeNotSatisfiable),
            429 => Some(TransportError::TooManyRequests),
            500 => Some(TransportError::InternalServerError),
            503 => Some(TransportError::ServiceUnavailable),
            504 => Some(TransportError::GatewayTimeout),
            _ => None,
        }
    }
}

/// Issues a byte-range GET against a pre-signed URL. Each worker owns its
/// own fetcher instance (isolated connection pool); implementations must
/// be `Send + Sync` so the pool can share one across worker closures.
pub trait RangeFetcher: Send + Sync {
    fn fetch_range(&self, url: &str, byte_range: (u64, u64)) -> Result<Vec<u8>, TransportError>;
}

/// Tunables for the parallel fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub worker_count: usize,
    /// Per-request timeout applied by HTTP-backed [`RangeFetcher`]
    /// implementations (e.g. [`crate::cas_client::CasClient`]).
    pub timeout: Duration,
    /// When set, every extracted term's chunks have their keyed-BLAKE3 data
    /// hash recomputed and checked before assembly (§4.H's "optionally
    /// verifies" step).
    pub verify_on_read: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            worker_count: num_cpus::get().max(1),
            timeout: Duration::from_secs(60),
            verify_on_read: true,
        }
    }
}

struct WorkItem {
    index: usize,
    term: ReconstructionTerm,
}

/// Drives `info.terms` through a bounded worker pool, returning the
/// extracted bytes for every term in original term order.
pub fn fetch_all(
    info: &ReconstructionInfo,
    fetcher: &(dyn RangeFetcher + 'static),
    config: &FetchConfig,
) -> Result<Vec<Vec<u8>>, ReconstructError> {
    let n = info.terms.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let work: Vec<WorkItem> = info
        .terms
        .iter()
        .enumerate()
        .map(|(index, term)| WorkItem { index, term: term.clone() })
        .collect();

    let queue = Arc::new(Mutex::new(work));
    let results: Arc<Mutex<Vec<Option<Vec<u8>>>>> = Arc::new(Mutex::new(vec![None; n]));
    let error: Arc<Mutex<Option<ReconstructError>>> = Arc::new(Mutex::new(None));

    let worker_count = config.worker_count.max(1).min(n);

    thread::scope(|scope| {
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let error = Arc::clone(&error);
            scope.spawn(move || {
                debug!("fetcher worker {worker_id} starting");
                loop {
                    if error.lock().unwrap().is_some() {
                        break;
                    }
                    let item = {
                        let mut q = queue.lock().unwrap();
                        q.pop()
                    };
                    let Some(item) = item else { break };

                    match extract_term(&item.term, info, fetcher, config) {
                        Ok(bytes) => {
                            if bytes.len() as u32 != item.term.unpacked_length {
                                let mut err = error.lock().unwrap();
                                if err.is_none() {
                                    let e = ReconstructError::SizeMismatch {
                                        expected: item.term.unpacked_length as u64,
                                        actual: bytes.len() as u64,
                                    };
                                    error!("fetcher worker {worker_id} captured fatal error: {e}");
                                    *err = Some(e);
                                }
                                break;
                            }
                            results.lock().unwrap()[item.index] = Some(bytes);
                        }
                        Err(e) => {
                            let mut err = error.lock().unwrap();
                            if err.is_none() {
                                error!("fetcher worker {worker_id} captured fatal error: {e}");
                                *err = Some(e);
                            }
                            break;
                        }
                    }
                }
                debug!("fetcher worker {worker_id} stopping");
            });
        }
    });

    if let Some(e) = error.lock().unwrap().take() {
        return Err(e);
    }

    let mut results = results.lock().unwrap();
    let mut out = Vec::with_capacity(n);
    for (index, slot) in results.iter_mut().enumerate() {
        match slot.take() {
            Some(bytes) => out.push(bytes),
            None => return Err(ReconstructError::MissingResult { index }),
        }
    }
    Ok(out)
}
