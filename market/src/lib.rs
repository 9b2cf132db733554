pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod marketplace;
pub mod shared_state;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use config::*;
pub use crypto::{Commitment, PublicKeyRecord};
pub use error::{MarketError, MarketResult};
pub use ledger::{Account, Ledger, WorldState};
pub use marketplace::{
    Address, EventRecord, KeyRegistry, Listing, ListingParams, ListingState, MarketEvent,
    Registry, VerifyOutcome,
};
pub use shared_state::SharedLedger;
pub use traits::{EventSink, SystemTimeProvider, TimeProvider};
