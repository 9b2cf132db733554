//! Output channel for marketplace notifications.

use crate::marketplace::{Address, MarketEvent};

/// Append-only sink that contract logic writes notifications to.
///
/// Writes are provisional: the ledger only publishes them once the
/// surrounding transaction commits.
pub trait EventSink {
    fn emit(&mut self, source: Address, event: MarketEvent);
}

/// Collecting sink, handy for driving contract logic directly.
pub type EventBuffer = Vec<(Address, MarketEvent)>;

impl EventSink for EventBuffer {
    fn emit(&mut self, source: Address, event: MarketEvent) {
        self.push((source, event));
    }
}
