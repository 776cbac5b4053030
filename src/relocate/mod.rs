//! Relocation worker pool
//!
//! Records are either handled one by one on the calling thread (sequential
//! mode, scan order kept) or pushed through a bounded queue that a fixed set
//! of rayon workers drains (parallel mode, order not kept). A failing record
//! never stops its siblings.

pub mod inflight;
pub mod transfer;

use crate::config::{ConcurrencyMode, Config, ConflictPolicy, TransferMode};
use crate::error::Result;
use crate::scan::FileRecord;
use inflight::{ConcurrencyLimiter, DestinationClaim, DestinationClaims};
use rayon::ThreadPool;
use std::path::PathBuf;
use tracing::{debug, error, info, trace, warn};

pub use transfer::Transfer;

/// Queue slots per worker; the producer blocks once they are all taken
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Status of one relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationStatus {
    /// File is at its destination
    Relocated,
    /// Destination was taken; source left in place
    Skipped,
    /// Transfer failed; see the error message
    Failed,
}

/// Result of relocating a single record
#[derive(Debug, Clone)]
pub struct RelocationResult {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: RelocationStatus,
    /// Reason for a skip or failure
    pub error: Option<String>,
}

impl RelocationResult {
    fn new(record: FileRecord, status: RelocationStatus, error: Option<String>) -> Self {
        Self {
            source: record.source,
            destination: record.destination,
            status,
            error,
        }
    }
}

/// Performs copy/move for classified records
pub struct WorkerPool {
    transfer: TransferMode,
    on_conflict: ConflictPolicy,
    workers: usize,
    threads: Option<ThreadPool>,
    limiter: ConcurrencyLimiter,
    claims: DestinationClaims,
}

impl WorkerPool {
    /// Build the pool for a run. Threads are only started in parallel mode.
    pub fn new(config: &Config) -> Result<Self> {
        let (workers, threads) = match config.concurrency {
            ConcurrencyMode::Sequential => (1, None),
            ConcurrencyMode::Parallel => {
                let workers = config.effective_workers();
                let threads = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("picgroup-worker-{i}"))
                    .build()?;
                (workers, Some(threads))
            }
        };

        let max_inflight = config.effective_inflight();
        debug!(
            mode = ?config.concurrency,
            workers,
            max_inflight,
            "Worker pool ready"
        );

        Ok(Self {
            transfer: config.transfer,
            on_conflict: config.on_conflict,
            workers,
            threads,
            limiter: ConcurrencyLimiter::new(max_inflight),
            claims: DestinationClaims::default(),
        })
    }

    /// Worker count (1 in sequential mode)
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Relocate every record and report one result per record
    pub fn relocate(&self, records: Vec<FileRecord>) -> Vec<RelocationResult> {
        let results = match self.threads {
            None => records
                .into_iter()
                .map(|record| self.relocate_one(record))
                .collect(),
            Some(ref threads) => self.relocate_parallel(threads, records),
        };
        debug_assert!(self.claims.is_empty());
        results
    }

    fn relocate_parallel(
        &self,
        threads: &ThreadPool,
        records: Vec<FileRecord>,
    ) -> Vec<RelocationResult> {
        let total = records.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = self.workers.min(total);
        let (queue_tx, queue_rx) =
            crossbeam_channel::bounded::<FileRecord>(workers * QUEUE_DEPTH_PER_WORKER);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<RelocationResult>();

        threads.in_place_scope(|scope| {
            for worker in 0..workers {
                let queue = queue_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move |_| {
                    let mut handled = 0usize;
                    for record in queue.iter() {
                        handled += 1;
                        if results.send(self.relocate_one(record)).is_err() {
                            break;
                        }
                    }
                    trace!(worker, handled, "Worker finished");
                });
            }
            // Only the workers hold receivers from here on, so a send fails
            // instead of blocking forever if they are all gone.
            drop(queue_rx);

            for record in records {
                // Blocks while the queue is full
                if queue_tx.send(record).is_err() {
                    break;
                }
            }
            // Closing the queue lets the workers run dry and exit
            drop(queue_tx);
        });

        drop(result_tx);
        let results: Vec<_> = result_rx.try_iter().collect();
        debug_assert_eq!(results.len(), total);
        results
    }

    fn relocate_one(&self, record: FileRecord) -> RelocationResult {
        let Some(_claim) = self.claim(&record) else {
            warn!(
                source = ?record.source,
                destination = ?record.destination,
                "Another file is being written to the same destination, skipping"
            );
            return RelocationResult::new(
                record,
                RelocationStatus::Skipped,
                Some("destination is taken by another file in this run".into()),
            );
        };

        if self.on_conflict == ConflictPolicy::Skip {
            match record.destination.try_exists() {
                Ok(false) => {}
                Ok(true) => {
                    warn!(
                        source = ?record.source,
                        destination = ?record.destination,
                        "Destination already exists, skipping"
                    );
                    return RelocationResult::new(
                        record,
                        RelocationStatus::Skipped,
                        Some("destination already exists".into()),
                    );
                }
                Err(e) => {
                    error!(destination = ?record.destination, error = %e, "Failed to check destination");
                    return RelocationResult::new(record, RelocationStatus::Failed, Some(e.to_string()));
                }
            }
        }

        let _permit = self.limiter.acquire();
        match transfer::transfer(&record.source, &record.destination, self.transfer) {
            Ok(transfer) => {
                info!(
                    source = ?record.source,
                    destination = ?record.destination,
                    ?transfer,
                    "Relocated file"
                );
                RelocationResult::new(record, RelocationStatus::Relocated, None)
            }
            Err(e) => {
                error!(error = %e, "Failed to relocate file");
                RelocationResult::new(record, RelocationStatus::Failed, Some(e.to_string()))
            }
        }
    }

    /// Take the destination for this record. Under the skip policy a held
    /// destination means the record will be skipped; under overwrite the
    /// record waits its turn.
    fn claim(&self, record: &FileRecord) -> Option<DestinationClaim<'_>> {
        match self.on_conflict {
            ConflictPolicy::Skip => self.claims.try_claim(&record.destination),
            ConflictPolicy::Overwrite => Some(self.claims.claim(&record.destination)),
        }
    }
}
