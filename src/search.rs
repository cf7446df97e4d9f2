//! Nonce search
//!
//! The search loop hashes the header, compares the digest with the target
//! and increments the header's nonce in place until a digest falls below the
//! target or the caller asks it to stop. The stop signal is polled once per
//! iteration; a single scrypt evaluation is never interrupted.

use crate::crypto::ScryptHasher;
use crate::header::BlockHeader;
use crate::types::{Digest, Nonce, Target};
use crate::utils::{compute_hash_rate, format_hash_rate};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default number of hashes between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Cooperative cancellation polled between search iterations
pub trait StopSignal {
    /// Return true once the search should stop
    fn should_stop(&self) -> bool;
}

impl StopSignal for CancellationToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

impl StopSignal for AtomicBool {
    fn should_stop(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<F> StopSignal for F
where
    F: Fn() -> bool,
{
    fn should_stop(&self) -> bool {
        self()
    }
}

impl<S: StopSignal> StopSignal for Option<S> {
    fn should_stop(&self) -> bool {
        self.as_ref().is_some_and(StopSignal::should_stop)
    }
}

/// Stop signal that fires once a point in time has passed
#[derive(Debug, Clone, Copy)]
pub struct Deadline(pub Instant);

impl StopSignal for Deadline {
    fn should_stop(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// Stop signal that fires when either of two signals fires
#[derive(Debug, Clone)]
pub struct AnyOf<A, B>(pub A, pub B);

impl<A: StopSignal, B: StopSignal> StopSignal for AnyOf<A, B> {
    fn should_stop(&self) -> bool {
        self.0.should_stop() || self.1.should_stop()
    }
}

/// Terminal result of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A digest below the target was found; the header holds `nonce`
    Found {
        nonce: Nonce,
        digest: Digest,
        iterations: u64,
    },
    /// The stop signal fired; the header nonce was incremented `iterations` times
    Cancelled { iterations: u64 },
}

impl SearchOutcome {
    /// Number of hashes computed by the search
    pub fn iterations(&self) -> u64 {
        match self {
            SearchOutcome::Found { iterations, .. } => *iterations,
            SearchOutcome::Cancelled { iterations } => *iterations,
        }
    }

    /// True when the search ended with a solution
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

/// Single-threaded nonce searcher
#[derive(Clone)]
pub struct NonceSearcher {
    hasher: ScryptHasher,
    progress_interval: u64,
}

impl NonceSearcher {
    /// Create a searcher around a hasher
    pub fn new(hasher: ScryptHasher) -> Self {
        Self {
            hasher,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Set how many hashes pass between progress log lines (0 disables them)
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Search from the header's current nonce until found or stopped
    ///
    /// On `Found` the header's nonce field holds the winning nonce. On
    /// `Cancelled` it holds the next nonce that would have been tried.
    /// Hash failures are propagated as errors.
    pub fn search<S>(&self, header: &mut BlockHeader, target: &Target, stop: &S) -> Result<SearchOutcome>
    where
        S: StopSignal + ?Sized,
    {
        let start = Instant::now();
        let mut iterations = 0u64;

        debug!(nonce = %header.nonce(), work_target = %target, "Starting nonce search");

        let digest = loop {
            if stop.should_stop() {
                debug!(iterations, nonce = %header.nonce(), "Nonce search cancelled");
                return Ok(SearchOutcome::Cancelled { iterations });
            }

            let (meets_target, digest) = self.hasher.hash_and_check(header, target)?;
            iterations += 1;

            if meets_target {
                break digest;
            }

            trace!(nonce = %header.nonce(), digest = %digest, "Digest above target");
            header.increment_nonce();

            if self.progress_interval > 0 && iterations % self.progress_interval == 0 {
                let hash_rate = compute_hash_rate(iterations, start.elapsed());
                debug!(
                    iterations,
                    hash_rate = %format_hash_rate(hash_rate),
                    "Nonce search progress"
                );
            }
        };

        let nonce = header.nonce();
        debug!(iterations, nonce = %nonce, digest = %digest, "Nonce search succeeded");
        Ok(SearchOutcome::Found {
            nonce,
            digest,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderBuilder;
    use crate::types::WorkTemplate;
    use assert_matches::assert_matches;
    use std::cell::Cell;
    use std::time::Duration;

    const HEADER_HEX: &str = "0000000120c8222d6eb3a66a64f1fd9a463d75b3904aae5670d7fd6211cb3b8a00000000000000009a9b9b0dec4d6d4d2e5b1bf0a6c2e3d8f9a0b1c2d3e4f5061728394a5b6c7d8e0000000012345678";

    fn searcher() -> NonceSearcher {
        NonceSearcher::new(ScryptHasher::new().unwrap())
    }

    fn sample_header() -> BlockHeader {
        HeaderBuilder::parse(&WorkTemplate::new(HEADER_HEX, "00".repeat(32))).unwrap()
    }

    #[test]
    fn test_max_target_found_on_first_iteration() {
        let mut header = sample_header();
        let initial = header.nonce();

        let outcome = searcher().search(&mut header, &Target::max(), &|| false).unwrap();

        assert_matches!(outcome, SearchOutcome::Found { nonce, iterations: 1, .. } if nonce == initial);
        assert_eq!(header.nonce(), initial);
    }

    #[test]
    fn test_cancelled_after_n_iterations() {
        let mut header = sample_header();
        let initial = header.nonce();
        let polls = Cell::new(0u64);
        let n = 5;

        let stop = || {
            let seen = polls.get();
            polls.set(seen + 1);
            seen >= n
        };
        let outcome = searcher().search(&mut header, &Target::min(), &stop).unwrap();

        assert_eq!(outcome, SearchOutcome::Cancelled { iterations: n });
        let mut expected = initial;
        for _ in 0..n {
            expected.increment();
        }
        assert_eq!(header.nonce(), expected);
    }

    #[test]
    fn test_pre_cancelled_token_does_no_work() {
        let mut header = sample_header();
        let initial = header.nonce();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = searcher().search(&mut header, &Target::max(), &token).unwrap();

        assert_eq!(outcome, SearchOutcome::Cancelled { iterations: 0 });
        assert_eq!(header.nonce(), initial);
    }

    #[test]
    fn test_expired_deadline_stops_immediately() {
        let mut header = sample_header();
        let deadline = Deadline(Instant::now());

        let outcome = searcher().search(&mut header, &Target::max(), &deadline).unwrap();
        assert!(!outcome.is_found());
        assert_eq!(outcome.iterations(), 0);
    }

    #[test]
    fn test_atomic_flag_and_any_of() {
        let far = Deadline(Instant::now() + Duration::from_secs(3600));
        let combined = AnyOf(AtomicBool::new(false), far);
        assert!(!combined.should_stop());

        combined.0.store(true, Ordering::Relaxed);
        assert!(combined.should_stop());

        assert!(!None::<Deadline>.should_stop());
        assert!(Some(Deadline(Instant::now())).should_stop());
    }

    #[test]
    fn test_finds_genesis_nonce() {
        // Litecoin genesis header in getwork form, with the nonce word lowered by two
        let data = "000000010000000000000000000000000000000000000000000000000000000000000000edd4ced9b7f73011e29badfaafff2353a13232a36cdf3e7ce6be97fd97ddfbba4e8eaab91e0ffff07a3f51cd";
        let target = "000000000000000000000000000000000000000000000000000000f0ff0f0000";
        let template = WorkTemplate::new(data, target);
        let mut header = HeaderBuilder::parse(&template).unwrap();
        let target = HeaderBuilder::parse_target(&template).unwrap();

        let outcome = searcher().search(&mut header, &target, &|| false).unwrap();

        assert_matches!(
            outcome,
            SearchOutcome::Found { nonce, iterations: 3, .. } if nonce == Nonce::new([0xcd, 0x51, 0x3f, 0x7c])
        );
    }
}
