//! Trait abstractions at the boundary with the execution environment.
//!
//! Contract logic only sees these seams, so it can be driven by the
//! in-process ledger, by tests, or by another host.

pub mod events;
pub mod time;

pub use events::{EventBuffer, EventSink};
pub use time::{SystemTimeProvider, TimeProvider};
