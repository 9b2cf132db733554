use serde::{Deserialize, Serialize};

use super::Address;
use crate::crypto::Commitment;
use crate::util::amount_string;

/// Notifications written to the ledger's append-only event log.
///
/// These are the only coordination signal between sellers and buyers: the
/// seller watches for `Purchased`, delivers off-channel, and the buyer
/// answers with a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum MarketEvent {
    KeyRegistered {
        registry: Address,
        identity: Address,
    },
    ListingDeployed {
        listing: Address,
        owner: Address,
        #[serde(with = "amount_string")]
        price: u128,
        data_hash: Commitment,
    },
    ListingRegistered {
        registry: Address,
        listing: Address,
    },
    Purchased {
        listing: Address,
        owner: Address,
        buyer: Address,
        #[serde(with = "amount_string")]
        payment: u128,
        /// The buyer's registered key, so the owner can encrypt the delivery.
        buyer_key: Option<String>,
    },
    Verified {
        listing: Address,
        owner: Address,
        buyer: Address,
        success: bool,
    },
    ListingBanned {
        listing: Address,
        buyer: Address,
    },
    DataUploaded {
        listing: Address,
        owner: Address,
        buyer: Address,
        reference: String,
    },
    Withdrawn {
        listing: Address,
        owner: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
}

impl MarketEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::KeyRegistered { .. } => "KeyRegistered",
            Self::ListingDeployed { .. } => "ListingDeployed",
            Self::ListingRegistered { .. } => "ListingRegistered",
            Self::Purchased { .. } => "Purchased",
            Self::Verified { .. } => "Verified",
            Self::ListingBanned { .. } => "ListingBanned",
            Self::DataUploaded { .. } => "DataUploaded",
            Self::Withdrawn { .. } => "Withdrawn",
        }
    }
}

/// A committed event as stored in the ledger log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0.
    pub seq: u64,
    /// Transaction that emitted the event.
    pub tx: u64,
    /// Unix timestamp of the transaction.
    pub timestamp: u64,
    /// Contract that emitted the event.
    pub source: Address,
    pub event: MarketEvent,
}
