//! Mining workers
//!
//! A worker takes one parsed header and target and runs the nonce search
//! until it finds a solution, the work goes stale or the caller cancels.

use crate::header::BlockHeader;
use crate::search::SearchOutcome;
use crate::types::Target;
use crate::utils::compute_hash_rate;
use crate::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Span;

pub mod cpu;

pub use cpu::CpuWorker;

/// Mining statistics for a worker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiningStats {
    /// Total hashes computed
    pub total_hashes: u64,
    /// Number of searches run
    pub searches: u64,
    /// Number of solutions found
    pub solutions_found: u64,
    /// Wall time spent searching
    pub mining_time: Duration,
}

impl MiningStats {
    /// Account for one finished search
    pub fn record_search(&mut self, outcome: &SearchOutcome, elapsed: Duration) {
        self.total_hashes += outcome.iterations();
        self.searches += 1;
        if outcome.is_found() {
            self.solutions_found += 1;
        }
        self.mining_time += elapsed;
    }

    /// Average hash rate over all searches (hashes per second)
    pub fn average_hash_rate(&self) -> f64 {
        compute_hash_rate(self.total_hashes, self.mining_time)
    }
}

/// Mining worker trait
#[async_trait]
pub trait MiningWorker: Send + Sync {
    /// Get the worker type name for logging
    fn worker_type(&self) -> &'static str;

    /// Search the header's nonce space for a digest below `target`
    ///
    /// The header is returned with the nonce the search stopped at. The
    /// search stops early when `cancellation` fires or `deadline` passes,
    /// which is reported as [`SearchOutcome::Cancelled`], not as an error.
    async fn mine(
        &self,
        header: BlockHeader,
        target: Target,
        deadline: Option<Instant>,
        cancellation: CancellationToken,
    ) -> Result<(BlockHeader, SearchOutcome)>;

    /// Get current mining statistics
    fn stats(&self) -> MiningStats {
        MiningStats::default()
    }
}

/// Create a tracing span for mining operations
pub fn mining_span(worker_type: &str, cycle: u64) -> Span {
    tracing::info_span!("mining", worker_type = worker_type, cycle = cycle)
}
