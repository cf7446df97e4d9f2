//! CPU mining worker implementation
//!
//! Runs the scrypt nonce search on the blocking thread pool so the async
//! runtime keeps serving RPC calls and signals while hashing.

use super::{MiningStats, MiningWorker};
use crate::header::BlockHeader;
use crate::search::{AnyOf, Deadline, NonceSearcher, SearchOutcome};
use crate::types::Target;
use crate::utils::{compute_hash_rate, format_hash_rate};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Single-threaded CPU mining worker
pub struct CpuWorker {
    searcher: NonceSearcher,
    stats: Arc<Mutex<MiningStats>>,
}

impl CpuWorker {
    /// Create a CPU worker around a searcher
    pub fn new(searcher: NonceSearcher) -> Self {
        Self {
            searcher,
            stats: Arc::new(Mutex::new(MiningStats::default())),
        }
    }
}

#[async_trait]
impl MiningWorker for CpuWorker {
    fn worker_type(&self) -> &'static str {
        "cpu"
    }

    async fn mine(
        &self,
        header: BlockHeader,
        target: Target,
        deadline: Option<Instant>,
        cancellation: CancellationToken,
    ) -> Result<(BlockHeader, SearchOutcome)> {
        debug!(
            start_nonce = %header.nonce(),
            difficulty_bits = target.leading_zero_bits(),
            "Starting CPU search"
        );

        let searcher = self.searcher.clone();
        let stop = AnyOf(cancellation, deadline.map(Deadline));
        let start = Instant::now();

        let (header, outcome) = task::spawn_blocking(move || {
            let mut header = header;
            let outcome = searcher.search(&mut header, &target, &stop);
            (header, outcome)
        })
        .await
        .map_err(|e| Error::worker(format!("Search task failed: {}", e)))?;

        let outcome = outcome?;
        let elapsed = start.elapsed();
        let hash_rate = compute_hash_rate(outcome.iterations(), elapsed);

        self.stats.lock().record_search(&outcome, elapsed);

        info!(
            hashes = outcome.iterations(),
            found = outcome.is_found(),
            elapsed = %humantime::format_duration(elapsed),
            hash_rate = %format_hash_rate(hash_rate),
            "CPU search finished"
        );

        Ok((header, outcome))
    }

    fn stats(&self) -> MiningStats {
        self.stats.lock().clone()
    }
}
