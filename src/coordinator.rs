//! Mining coordinator
//!
//! Drives the fetch, parse, search, serialize and submit cycle against a
//! [`WorkSource`] and retries cycles that failed for transient reasons.

use crate::client::WorkSource;
use crate::config::Config;
use crate::header::HeaderBuilder;
use crate::search::SearchOutcome;
use crate::types::Nonce;
use crate::utils::format_hash_rate;
use crate::worker::{mining_span, MiningStats, MiningWorker};
use crate::Result;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long to search one template before fetching fresh work
    pub work_timeout: Option<Duration>,
    /// Pause after a retryable cycle failure
    pub retry_delay: Duration,
    /// Stop after the first submitted solution
    pub once: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            work_timeout: Some(Duration::from_secs(60)),
            retry_delay: Duration::from_secs(1),
            once: false,
        }
    }
}

impl From<&Config> for CoordinatorConfig {
    fn from(config: &Config) -> Self {
        Self {
            work_timeout: Some(config.work_timeout_duration()),
            retry_delay: config.max_retry_delay_duration(),
            once: config.once,
        }
    }
}

/// Result of one mining cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A solution was found and submitted
    Submitted { nonce: Nonce, accepted: bool },
    /// The work timeout passed before a solution was found
    Expired { iterations: u64 },
    /// The caller cancelled the cycle
    Cancelled { iterations: u64 },
}

/// Per-cycle counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub expired: u64,
    pub failed: u64,
}

/// Main mining coordinator
pub struct MiningCoordinator<S, W> {
    source: S,
    worker: W,
    config: CoordinatorConfig,
    stats: Mutex<CycleStats>,
}

impl<S, W> MiningCoordinator<S, W>
where
    S: WorkSource,
    W: MiningWorker,
{
    /// Create a new mining coordinator
    pub fn new(source: S, worker: W, config: CoordinatorConfig) -> Self {
        Self {
            source,
            worker,
            config,
            stats: Mutex::new(CycleStats::default()),
        }
    }

    /// Work source the coordinator mines against
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cycle counters so far
    pub fn stats(&self) -> CycleStats {
        self.stats.lock().clone()
    }

    /// Hashing statistics of the worker
    pub fn worker_stats(&self) -> MiningStats {
        self.worker.stats()
    }

    /// Run one fetch/search/submit cycle
    ///
    /// Any failure aborts the cycle and is returned to the caller.
    pub async fn run_cycle(&self, cancellation: &CancellationToken) -> Result<CycleOutcome> {
        let cycle = {
            let mut stats = self.stats.lock();
            stats.cycles += 1;
            stats.cycles
        };

        self.execute_cycle(cancellation)
            .instrument(mining_span(self.worker.worker_type(), cycle))
            .await
    }

    async fn execute_cycle(&self, cancellation: &CancellationToken) -> Result<CycleOutcome> {
        let template = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                return Ok(CycleOutcome::Cancelled { iterations: 0 });
            }
            template = self.source.fetch() => template?,
        };

        let header = HeaderBuilder::parse(&template)?;
        let target = HeaderBuilder::parse_target(&template)?;

        info!(
            start_nonce = %header.nonce(),
            difficulty_bits = target.leading_zero_bits(),
            "Got work"
        );
        debug!(work_target = %target, "Parsed work target");

        let deadline = self.config.work_timeout.map(|timeout| Instant::now() + timeout);
        let (_, outcome) = self
            .worker
            .mine(header, target, deadline, cancellation.clone())
            .await?;

        match outcome {
            SearchOutcome::Found {
                nonce,
                digest,
                iterations,
            } => {
                let solution = HeaderBuilder::serialize_solution(&template.data, &nonce)?;
                info!(%nonce, %digest, iterations, "Found solution, submitting");

                let accepted = self.source.submit(&solution).await?;
                {
                    let mut stats = self.stats.lock();
                    if accepted {
                        stats.accepted += 1;
                    } else {
                        stats.rejected += 1;
                    }
                }
                Ok(CycleOutcome::Submitted { nonce, accepted })
            }
            SearchOutcome::Cancelled { iterations } if cancellation.is_cancelled() => {
                Ok(CycleOutcome::Cancelled { iterations })
            }
            SearchOutcome::Cancelled { iterations } => {
                self.stats.lock().expired += 1;
                info!(iterations, "Work timeout reached, getting new work");
                Ok(CycleOutcome::Expired { iterations })
            }
        }
    }

    /// Mine until cancelled, a fatal error occurs, or `once` is satisfied
    pub async fn run(&self, cancellation: CancellationToken) -> Result<CycleStats> {
        info!("Starting mining coordinator");

        let result = loop {
            if cancellation.is_cancelled() {
                break Ok(());
            }

            match self.run_cycle(&cancellation).await {
                Ok(CycleOutcome::Submitted { .. }) if self.config.once => break Ok(()),
                Ok(CycleOutcome::Cancelled { .. }) => {
                    info!("Mining cancelled");
                    break Ok(());
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    self.stats.lock().failed += 1;
                    warn!(
                        category = e.category(),
                        "Retryable error in mining cycle: {}. Retrying in {}",
                        e,
                        humantime::format_duration(self.config.retry_delay)
                    );
                    tokio::select! {
                        _ = sleep(self.config.retry_delay) => {}
                        _ = cancellation.cancelled() => break Ok(()),
                    }
                }
                Err(e) => {
                    self.stats.lock().failed += 1;
                    error!(category = e.category(), "Fatal error in mining cycle: {}", e);
                    break Err(e);
                }
            }
        };

        let stats = self.stats();
        let worker_stats = self.worker.stats();
        info!(
            cycles = stats.cycles,
            accepted = stats.accepted,
            rejected = stats.rejected,
            expired = stats.expired,
            hashes = worker_stats.total_hashes,
            hash_rate = %format_hash_rate(worker_stats.average_hash_rate()),
            "Mining coordinator stopped"
        );

        result.map(|()| stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ScryptHasher;
    use crate::search::NonceSearcher;
    use crate::types::WorkTemplate;
    use crate::worker::CpuWorker;
    use crate::Error;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    const SAMPLE_DATA: &str = "0000000120c8222d6eb3a66a64f1fd9a463d75b3904aae5670d7fd6211cb3b8a00000000000000009a9b9b0dec4d6d4d2e5b1bf0a6c2e3d8f9a0b1c2d3e4f5061728394a5b6c7d8e0000000012345678";

    struct MemorySource {
        work: Mutex<VecDeque<Result<WorkTemplate>>>,
        submissions: Mutex<Vec<String>>,
        accept: bool,
    }

    impl MemorySource {
        fn new(work: Vec<Result<WorkTemplate>>, accept: bool) -> Self {
            Self {
                work: Mutex::new(work.into()),
                submissions: Mutex::new(Vec::new()),
                accept,
            }
        }
    }

    #[async_trait]
    impl WorkSource for MemorySource {
        async fn fetch(&self) -> Result<WorkTemplate> {
            self.work
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::rpc("no more work")))
        }

        async fn submit(&self, solution_hex: &str) -> Result<bool> {
            self.submissions.lock().push(solution_hex.to_string());
            Ok(self.accept)
        }
    }

    fn coordinator(
        source: MemorySource,
        config: CoordinatorConfig,
    ) -> MiningCoordinator<MemorySource, CpuWorker> {
        let worker = CpuWorker::new(NonceSearcher::new(ScryptHasher::new().unwrap()));
        MiningCoordinator::new(source, worker, config)
    }

    fn once() -> CoordinatorConfig {
        CoordinatorConfig {
            work_timeout: None,
            retry_delay: Duration::from_millis(1),
            once: true,
        }
    }

    #[tokio::test]
    async fn test_easy_target_submits_unmodified_header() {
        let template = WorkTemplate::new(SAMPLE_DATA, "ff".repeat(32));
        let coordinator = coordinator(MemorySource::new(vec![Ok(template)], true), once());

        let outcome = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_matches!(outcome, CycleOutcome::Submitted { accepted: true, .. });
        assert_eq!(*coordinator.source().submissions.lock(), vec![SAMPLE_DATA.to_string()]);
        assert_eq!(coordinator.stats().accepted, 1);
        assert_eq!(coordinator.worker_stats().total_hashes, 1);
    }

    #[tokio::test]
    async fn test_finds_and_submits_genesis() {
        let start = "000000010000000000000000000000000000000000000000000000000000000000000000edd4ced9b7f73011e29badfaafff2353a13232a36cdf3e7ce6be97fd97ddfbba4e8eaab91e0ffff07a3f51cd";
        let solved = "000000010000000000000000000000000000000000000000000000000000000000000000edd4ced9b7f73011e29badfaafff2353a13232a36cdf3e7ce6be97fd97ddfbba4e8eaab91e0ffff07c3f51cd";
        let target = "000000000000000000000000000000000000000000000000000000f0ff0f0000";

        let source = MemorySource::new(vec![Ok(WorkTemplate::new(start, target))], true);
        let coordinator = coordinator(source, once());

        let stats = coordinator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(*coordinator.source().submissions.lock(), vec![solved.to_string()]);
        assert_eq!(coordinator.worker_stats().total_hashes, 3);
    }

    #[tokio::test]
    async fn test_rejected_submission_is_counted() {
        let template = WorkTemplate::new(SAMPLE_DATA, "ff".repeat(32));
        let coordinator = coordinator(MemorySource::new(vec![Ok(template)], false), once());

        let stats = coordinator.run(CancellationToken::new()).await.unwrap();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.accepted, 0);
    }

    #[tokio::test]
    async fn test_malformed_work_is_fatal() {
        let template = WorkTemplate::new("zz".repeat(80), "ff".repeat(32));
        let coordinator = coordinator(MemorySource::new(vec![Ok(template)], true), once());

        let result = coordinator.run(CancellationToken::new()).await;

        assert_matches!(result, Err(Error::Format { .. }));
        assert!(coordinator.source().submissions.lock().is_empty());
        assert_eq!(coordinator.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_retryable_error_then_success() {
        let template = WorkTemplate::new(SAMPLE_DATA, "ff".repeat(32));
        let source = MemorySource::new(
            vec![Err(Error::network("connection refused")), Ok(template)],
            true,
        );
        let coordinator = coordinator(source, once());

        let stats = coordinator.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.accepted, 1);
    }

    #[tokio::test]
    async fn test_work_timeout_expires_cycle() {
        let template = WorkTemplate::new(SAMPLE_DATA, "00".repeat(32));
        let config = CoordinatorConfig {
            work_timeout: Some(Duration::ZERO),
            ..once()
        };
        let coordinator = coordinator(MemorySource::new(vec![Ok(template)], true), config);

        let outcome = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Expired { iterations: 0 });
        assert_eq!(coordinator.stats().expired, 1);
        assert!(coordinator.source().submissions.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let coordinator = coordinator(MemorySource::new(Vec::new(), true), once());
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let stats = coordinator.run(cancellation).await.unwrap();
        assert_eq!(stats.cycles, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_search() {
        let template = WorkTemplate::new(SAMPLE_DATA, "00".repeat(32));
        let coordinator = coordinator(MemorySource::new(vec![Ok(template)], true), once());
        let cancellation = CancellationToken::new();

        let canceller = cancellation.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let stats = coordinator.run(cancellation).await.unwrap();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.expired, 0);
        assert!(coordinator.source().submissions.lock().is_empty());
    }
}
