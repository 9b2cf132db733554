use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Address, MarketEvent};
use crate::traits::EventSink;

/// Directory of listings, optionally binding one shared key registry to
/// every listing deployed through it.
///
/// Entries are append-only and unique; the registry holds addresses only,
/// the listings themselves live in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    address: Address,
    owner: Address,
    key_registry: Option<Address>,
    listings: Vec<Address>,
}

impl Registry {
    pub const fn new(address: Address, owner: Address, key_registry: Option<Address>) -> Self {
        Self {
            address,
            owner,
            key_registry,
            listings: Vec::new(),
        }
    }

    /// Append `listing` unless it is already tracked.
    ///
    /// Returns `false` for a duplicate, which leaves the registry untouched
    /// and emits nothing.
    pub fn track(&mut self, listing: Address, events: &mut impl EventSink) -> bool {
        if self.contains(&listing) {
            debug!("Listing {} already tracked by {}", listing, self.address);
            return false;
        }

        self.listings.push(listing);
        events.emit(
            self.address,
            MarketEvent::ListingRegistered {
                registry: self.address,
                listing,
            },
        );
        info!(
            "Registry {} now tracks {} listing(s)",
            self.address,
            self.listings.len()
        );
        true
    }

    pub fn contains(&self, listing: &Address) -> bool {
        self.listings.contains(listing)
    }

    /// Tracked listings in registration order.
    pub fn listings(&self) -> &[Address] {
        &self.listings
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn owner(&self) -> Address {
        self.owner
    }

    pub const fn key_registry(&self) -> Option<Address> {
        self.key_registry
    }
}
