//! Bookkeeping for transfers in flight
//!
//! [`ConcurrencyLimiter`] caps how many transfers hold open file handles at
//! once, independently of the worker count. [`DestinationClaims`] makes sure
//! two in-flight records never write the same destination path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// A counting semaphore for transfers
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    state: Arc<SemaphoreState>,
}

struct SemaphoreState {
    available: Mutex<usize>,
    condvar: Condvar,
    max: usize,
}

impl SemaphoreState {
    fn lock(&self) -> MutexGuard<'_, usize> {
        // The counter stays consistent even if a holder panicked
        self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter with `max_concurrent` permits (at least one)
    pub fn new(max_concurrent: usize) -> Self {
        let max = max_concurrent.max(1);
        Self {
            state: Arc::new(SemaphoreState {
                available: Mutex::new(max),
                condvar: Condvar::new(),
                max,
            }),
        }
    }

    /// Acquire a permit (blocks until available)
    pub fn acquire(&self) -> ConcurrencyPermit {
        let mut available = self.state.lock();

        while *available == 0 {
            available = self
                .state
                .condvar
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *available -= 1;

        ConcurrencyPermit {
            state: self.state.clone(),
        }
    }

    /// Get the maximum number of concurrent transfers allowed
    pub fn max_concurrent(&self) -> usize {
        self.state.max
    }

    /// Get the current number of available permits
    pub fn available(&self) -> usize {
        *self.state.lock()
    }
}

/// Permission to run one transfer; released on drop
pub struct ConcurrencyPermit {
    state: Arc<SemaphoreState>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        let mut available = self.state.lock();
        *available += 1;
        self.state.condvar.notify_one();
    }
}

/// Destination paths currently being written
#[derive(Default)]
pub struct DestinationClaims {
    claimed: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl DestinationClaims {
    /// Claim `path`, or `None` if another transfer holds it
    pub fn try_claim(&self, path: &Path) -> Option<DestinationClaim<'_>> {
        let mut claimed = self.lock();
        if !claimed.insert(path.to_path_buf()) {
            return None;
        }
        Some(DestinationClaim {
            claims: self,
            path: path.to_path_buf(),
        })
    }

    /// Claim `path`, waiting for the current holder to finish
    pub fn claim(&self, path: &Path) -> DestinationClaim<'_> {
        let mut claimed = self.lock();
        while claimed.contains(path) {
            claimed = self
                .released
                .wait(claimed)
                .unwrap_or_else(PoisonError::into_inner);
        }
        claimed.insert(path.to_path_buf());
        DestinationClaim {
            claims: self,
            path: path.to_path_buf(),
        }
    }

    /// Number of destinations currently claimed
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on a destination path; released on drop
pub struct DestinationClaim<'a> {
    claims: &'a DestinationClaims,
    path: PathBuf,
}

impl Drop for DestinationClaim<'_> {
    fn drop(&mut self) {
        self.claims.lock().remove(&self.path);
        self.claims.released.notify_all();
    }
}
