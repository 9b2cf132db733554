//! Clock abstraction used to stamp committed ledger events.

use std::sync::Arc;

use crate::config::now_unix;

/// Source of the current Unix timestamp (seconds).
///
/// The ledger reads the clock once per transaction, so every event of a
/// transaction carries the same timestamp.
pub trait TimeProvider: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Wall clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
    pub const fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_unix(&self) -> u64 {
        now_unix()
    }
}

impl<T: TimeProvider + ?Sized> TimeProvider for Arc<T> {
    fn now_unix(&self) -> u64 {
        (**self).now_unix()
    }
}
