//! Shared ledger handle for front-ends.
//!
//! `SharedLedger` lets several tasks drive one ledger. The ledger stays
//! single-writer: every mutating call holds the write lock for the whole
//! transaction, which serializes operations the way a chain would.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::ledger::Ledger;
use crate::marketplace::EventRecord;
use crate::traits::{SystemTimeProvider, TimeProvider};

pub struct SharedLedger<T: TimeProvider = SystemTimeProvider> {
    inner: Arc<RwLock<Ledger<T>>>,
}

impl<T: TimeProvider> Clone for SharedLedger<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TimeProvider> SharedLedger<T> {
    pub fn new(ledger: Ledger<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Ledger<T>> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Ledger<T>> {
        self.inner.write()
    }

    /// Run one read-only query under the read lock.
    pub fn query<R>(&self, f: impl FnOnce(&Ledger<T>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run one or more calls under a single write lock.
    pub fn execute<R>(&self, f: impl FnOnce(&mut Ledger<T>) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.inner.read().subscribe()
    }
}

impl Default for SharedLedger<SystemTimeProvider> {
    fn default() -> Self {
        Self::new(Ledger::new())
    }
}
