//! Pending and committed event storage.

use tracing::debug;

use crate::marketplace::{Address, EventRecord, MarketEvent};
use crate::traits::EventSink;

/// Append-only event log plus the events of the transaction in flight.
#[derive(Debug, Default)]
pub struct EventJournal {
    records: Vec<EventRecord>,
    pending: Vec<(Address, MarketEvent)>,
}

impl EventJournal {
    pub const fn from_records(records: Vec<EventRecord>) -> Self {
        Self {
            records,
            pending: Vec::new(),
        }
    }

    /// Number of pending events, used as a rollback mark.
    pub fn checkpoint(&self) -> usize {
        self.pending.len()
    }

    /// Drop pending events written after `mark`.
    pub fn truncate(&mut self, mark: usize) {
        if self.pending.len() > mark {
            debug!("Discarding {} pending event(s)", self.pending.len() - mark);
        }
        self.pending.truncate(mark);
    }

    /// Move pending events into the log. Returns the newly committed records.
    pub fn commit(&mut self, tx: u64, timestamp: u64) -> &[EventRecord] {
        let start = self.records.len();
        for (source, event) in self.pending.drain(..) {
            let seq = self.records.len() as u64;
            self.records.push(EventRecord {
                seq,
                tx,
                timestamp,
                source,
                event,
            });
        }
        &self.records[start..]
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `seq >= from`.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl EventSink for EventJournal {
    fn emit(&mut self, source: Address, event: MarketEvent) {
        self.pending.push((source, event));
    }
}
