//! Controllable clock for ledger tests.

use crate::traits::TimeProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Clock shared between a test and the ledger it drives.
///
/// Clones observe the same instant, so a test can hold one handle and move
/// time while the ledger stamps events with the other.
#[derive(Debug, Clone)]
pub struct MockTime {
    current_time: Arc<AtomicU64>,
}

impl MockTime {
    pub fn new(initial_time: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(initial_time)),
        }
    }

    /// Clock parked at 2024-01-01 00:00:00 UTC.
    pub fn default_time() -> Self {
        Self::new(1_704_067_200)
    }

    pub fn set(&self, timestamp: u64) {
        self.current_time.store(timestamp, Ordering::SeqCst);
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: u64) {
        self.current_time.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

impl Default for MockTime {
    fn default() -> Self {
        Self::default_time()
    }
}

impl TimeProvider for MockTime {
    fn now_unix(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}
