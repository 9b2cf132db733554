pub mod address;
pub mod events;
pub mod key_registry;
pub mod listing;
pub mod registry;

pub use address::Address;
pub use events::{EventRecord, MarketEvent};
pub use key_registry::KeyRegistry;
pub use listing::{Listing, ListingParams, ListingState, VerifyOutcome};
pub use registry::Registry;
