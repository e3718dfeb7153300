//! Parallel proof-of-work sealing.
//!
//! The sealer always reports the smallest nonce that meets the target, the
//! same value a sequential scan from zero would find, so any node re-checking
//! the header only has to call [`verify`](crate::verify).

use crate::compact::{compact_to_target, meets_target};
use crate::nonce::{CancelToken, NonceSchedule};
use primitive_types::U256;
use sealchain_core::{BlockHeader, Coded, ErrorCode, Hash, HeaderHasher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why a sealing run ended without a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every nonce below `max_nonce` was tried.
    Exhausted,
    Cancelled,
    TimedOut,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "nonce space exhausted"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::TimedOut => write!(f, "timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SealError {
    #[error("sealing stopped without a solution: {reason}")]
    Exhausted { reason: StopReason },
}

impl SealError {
    pub fn reason(&self) -> StopReason {
        match self {
            SealError::Exhausted { reason } => *reason,
        }
    }
}

impl Coded for SealError {
    fn code(&self) -> ErrorCode {
        ErrorCode::SealingExhausted
    }
}

/// Default search bound: every nonce up to and including 10^13.
pub const DEFAULT_MAX_NONCE: u64 = 10_000_000_000_001;

/// Sealer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealConfig {
    /// Number of search threads.
    pub workers: usize,
    /// Nonces are searched in `0..max_nonce`.
    pub max_nonce: u64,
    /// Nonces per scheduled batch.
    pub batch_size: u64,
    pub timeout: Option<Duration>,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            max_nonce: DEFAULT_MAX_NONCE,
            batch_size: 4_096,
            timeout: None,
        }
    }
}

impl SealConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A header carrying a satisfying nonce, with its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub header: BlockHeader,
    pub hash: Hash,
}

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Shared state of one sealing run.
struct Search<'a, H: ?Sized> {
    template: &'a BlockHeader,
    hasher: &'a H,
    target: U256,
    schedule: NonceSchedule,
    cancel: &'a CancelToken,
    deadline: Option<Instant>,
    /// Smallest satisfying nonce found so far.
    best: AtomicU64,
    halted: AtomicU8,
    attempts: AtomicU64,
}

impl<H: HeaderHasher + ?Sized> Search<'_, H> {
    fn halt(&self, reason: u8) {
        let _ = self
            .halted
            .compare_exchange(RUNNING, reason, Ordering::Relaxed, Ordering::Relaxed);
    }

    fn should_stop(&self) -> bool {
        if self.halted.load(Ordering::Relaxed) != RUNNING {
            return true;
        }
        if self.cancel.is_cancelled() {
            self.halt(CANCELLED);
            return true;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.halt(TIMED_OUT);
            return true;
        }
        false
    }

    fn run_worker(&self, worker: usize) {
        let mut header = self.template.clone();
        let mut attempts = 0u64;

        'batches: for range in self.schedule.batches(worker) {
            // Everything left for this worker is above a known solution.
            if range.start() > self.best.load(Ordering::Relaxed) {
                break;
            }
            for nonce in range {
                if self.should_stop() {
                    break 'batches;
                }
                attempts += 1;
                header.nonce = nonce;
                if meets_target(&self.hasher.hash_header(&header), &self.target) {
                    self.best.fetch_min(nonce, Ordering::Relaxed);
                    break 'batches;
                }
            }
        }

        self.attempts.fetch_add(attempts, Ordering::Relaxed);
    }
}

/// Searches for the minimal nonce sealing a header template.
#[derive(Debug, Clone, Default)]
pub struct Sealer {
    config: SealConfig,
}

impl Sealer {
    pub fn new(config: SealConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    /// Seal `template` under its own `bits`, blocking until a solution is
    /// found or the search stops.
    #[instrument(skip_all, fields(height = template.height, bits = template.bits))]
    pub fn seal<H>(
        &self,
        template: &BlockHeader,
        hasher: &H,
        cancel: &CancelToken,
    ) -> Result<Sealed, SealError>
    where
        H: HeaderHasher + ?Sized,
    {
        let started = Instant::now();
        let Some(target) = compact_to_target(template.bits) else {
            warn!("negative target, no hash can meet it");
            return Err(SealError::Exhausted {
                reason: StopReason::Exhausted,
            });
        };
        let schedule = NonceSchedule::new(
            self.config.max_nonce,
            self.config.batch_size,
            self.config.workers,
        );
        let search = Search {
            template,
            hasher,
            target,
            schedule,
            cancel,
            deadline: self.config.timeout.map(|t| started + t),
            best: AtomicU64::new(u64::MAX),
            halted: AtomicU8::new(RUNNING),
            attempts: AtomicU64::new(0),
        };

        debug!(
            workers = schedule.workers(),
            max_nonce = self.config.max_nonce,
            "sealing started"
        );

        thread::scope(|scope| {
            for worker in 0..schedule.workers() {
                let search = &search;
                scope.spawn(move || search.run_worker(worker));
            }
        });

        let attempts = search.attempts.load(Ordering::Relaxed);
        let reason = match search.halted.load(Ordering::Relaxed) {
            CANCELLED => Some(StopReason::Cancelled),
            TIMED_OUT => Some(StopReason::TimedOut),
            _ => None,
        };
        if let Some(reason) = reason {
            warn!(%reason, attempts, "sealing stopped");
            return Err(SealError::Exhausted { reason });
        }

        let nonce = search.best.load(Ordering::Relaxed);
        if nonce == u64::MAX {
            warn!(attempts, "no nonce satisfies the target");
            return Err(SealError::Exhausted {
                reason: StopReason::Exhausted,
            });
        }

        let header = template.with_nonce(nonce);
        let hash = hasher.hash_header(&header);
        info!(
            nonce,
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "header sealed"
        );
        Ok(Sealed { header, hash })
    }

    /// Seal on a background thread.
    pub fn spawn<H>(&self, template: BlockHeader, hasher: H) -> SealHandle
    where
        H: HeaderHasher + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let sealer = self.clone();
        let handle = thread::spawn(move || sealer.seal(&template, &hasher, &token));
        SealHandle { cancel, handle }
    }
}

/// A sealing run in progress on another thread.
pub struct SealHandle {
    cancel: CancelToken,
    handle: thread::JoinHandle<Result<Sealed, SealError>>,
}

impl SealHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result. A panic inside a worker is resumed here.
    pub fn join(self) -> Result<Sealed, SealError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
