use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Address, KeyRegistry, MarketEvent};
use crate::config::RETRY_LIMIT;
use crate::crypto::Commitment;
use crate::error::{MarketError, MarketResult};
use crate::traits::EventSink;
use crate::util::amount_string;

/// Lifecycle of a listing.
///
/// `ForSale -> InProgress -> {ForSale | Banned}`; `Banned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingState {
    /// Open for purchase
    ForSale,
    /// A buyer has paid and is waiting to verify the delivery
    InProgress,
    /// Retry limit exhausted; no purchase or withdrawal ever succeeds again
    Banned,
}

/// Result of a verification attempt that was accepted by the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyOutcome {
    /// Revealed value opened the commitment; listing is for sale again
    Confirmed,
    /// Wrong value; the buyer may try again
    Rejected { attempts: u32 },
    /// Wrong value and the retry limit is reached
    Banned,
}

/// Construction parameters for a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingParams {
    #[serde(with = "amount_string")]
    pub price: u128,
    pub data_hash: Commitment,
    pub key_registry: Option<Address>,
    pub denied_buyers: Vec<Address>,
    pub metadata_keys: Vec<String>,
    pub metadata_values: Vec<String>,
}

impl ListingParams {
    pub const fn new(price: u128, data_hash: Commitment) -> Self {
        Self {
            price,
            data_hash,
            key_registry: None,
            denied_buyers: Vec::new(),
            metadata_keys: Vec::new(),
            metadata_values: Vec::new(),
        }
    }

    /// Gate purchases on identities registered in `registry`.
    #[must_use]
    pub const fn key_registry(mut self, registry: Address) -> Self {
        self.key_registry = Some(registry);
        self
    }

    #[must_use]
    pub fn denied_buyers(mut self, denied: impl IntoIterator<Item = Address>) -> Self {
        self.denied_buyers = denied.into_iter().collect();
        self
    }

    /// Parallel key and value lists; lengths are checked at deployment.
    #[must_use]
    pub fn metadata<K, V>(mut self, keys: K, values: V) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        self.metadata_keys = keys.into_iter().map(Into::into).collect();
        self.metadata_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Check the parameters and pair up the metadata.
    ///
    /// A repeated metadata key overwrites the earlier value in place.
    fn validate(&self, max_metadata: usize) -> MarketResult<Vec<(String, String)>> {
        if self.price == 0 {
            return Err(MarketError::InvalidPrice);
        }
        if self.metadata_keys.len() != self.metadata_values.len() {
            return Err(MarketError::MetadataLengthMismatch {
                keys: self.metadata_keys.len(),
                values: self.metadata_values.len(),
            });
        }
        if self.metadata_keys.len() > max_metadata {
            return Err(MarketError::Validation(format!(
                "{} metadata entries exceed the limit of {}",
                self.metadata_keys.len(),
                max_metadata
            )));
        }

        let mut info: Vec<(String, String)> = Vec::with_capacity(self.metadata_keys.len());
        for (key, value) in self.metadata_keys.iter().zip(&self.metadata_values) {
            match info.iter_mut().find(|(existing, _)| existing == key) {
                Some(entry) => entry.1.clone_from(value),
                None => info.push((key.clone(), value.clone())),
            }
        }
        Ok(info)
    }
}

/// One escrowed sale offer for a data item identified by its commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    address: Address,
    owner: Address,
    #[serde(with = "amount_string")]
    price: u128,
    data_hash: Commitment,
    state: ListingState,
    progress_buyer: Option<Address>,
    trial_count: u32,
    confirmed_buyers: BTreeSet<Address>,
    denied_buyers: BTreeSet<Address>,
    additional_info: Vec<(String, String)>,
    key_registry: Option<Address>,
    #[serde(with = "amount_string")]
    escrow: u128,
}

impl Listing {
    /// Create a listing owned by `owner` at `address`.
    pub fn new(
        address: Address,
        owner: Address,
        params: &ListingParams,
        max_metadata: usize,
    ) -> MarketResult<Self> {
        let additional_info = params.validate(max_metadata)?;

        Ok(Self {
            address,
            owner,
            price: params.price,
            data_hash: params.data_hash,
            state: ListingState::ForSale,
            progress_buyer: None,
            trial_count: 0,
            confirmed_buyers: BTreeSet::new(),
            denied_buyers: params.denied_buyers.iter().copied().collect(),
            additional_info,
            key_registry: params.key_registry,
            escrow: 0,
        })
    }

    /// Pay `payment` into escrow and become the buyer in progress.
    ///
    /// `key_registry` must be the registry this listing is gated on, if any.
    /// Checks run in order: state, deny list, payment, key registration.
    pub fn purchase(
        &mut self,
        caller: Address,
        payment: u128,
        key_registry: Option<&KeyRegistry>,
        events: &mut impl EventSink,
    ) -> MarketResult<()> {
        if self.state != ListingState::ForSale {
            return Err(MarketError::NotForSale);
        }
        if self.denied_buyers.contains(&caller) {
            return Err(MarketError::AccessDenied);
        }
        if payment < self.price {
            return Err(MarketError::NotEnoughFunds {
                price: self.price,
                paid: payment,
            });
        }
        let buyer_key = match self.key_registry {
            None => None,
            Some(expected) => {
                let registry = key_registry
                    .filter(|registry| registry.address() == expected)
                    .ok_or(MarketError::UnknownAccount(expected))?;
                Some(registry.get_key(&caller)?.material.clone())
            }
        };

        let escrow = self.escrow.checked_add(payment).ok_or_else(|| {
            MarketError::Validation(format!("escrow overflow on {}", self.address))
        })?;

        self.escrow = escrow;
        self.state = ListingState::InProgress;
        self.progress_buyer = Some(caller);
        self.trial_count = 0;

        events.emit(
            self.address,
            MarketEvent::Purchased {
                listing: self.address,
                owner: self.owner,
                buyer: caller,
                payment,
                buyer_key,
            },
        );
        info!(
            "Listing {} purchased by {} for {} (escrow now {})",
            self.address, caller, payment, self.escrow
        );
        Ok(())
    }

    /// Check `revealed` against the commitment on behalf of the buyer in progress.
    pub fn verify(
        &mut self,
        caller: Address,
        revealed: &[u8],
        events: &mut impl EventSink,
    ) -> MarketResult<VerifyOutcome> {
        if self.state != ListingState::InProgress {
            return Err(MarketError::NotInProgress);
        }
        if self.progress_buyer != Some(caller) {
            return Err(MarketError::NotBuyer);
        }

        let success = self.data_hash.opens_with(revealed);
        events.emit(
            self.address,
            MarketEvent::Verified {
                listing: self.address,
                owner: self.owner,
                buyer: caller,
                success,
            },
        );

        if success {
            self.confirmed_buyers.insert(caller);
            self.state = ListingState::ForSale;
            self.progress_buyer = None;
            self.trial_count = 0;
            info!("Buyer {} confirmed delivery on {}", caller, self.address);
            return Ok(VerifyOutcome::Confirmed);
        }

        self.trial_count += 1;
        if self.trial_count >= RETRY_LIMIT {
            let attempts = self.trial_count;
            self.state = ListingState::Banned;
            self.progress_buyer = None;
            self.trial_count = 0;
            events.emit(
                self.address,
                MarketEvent::ListingBanned {
                    listing: self.address,
                    buyer: caller,
                },
            );
            warn!(
                "Listing {} banned after {} failed verifications by {}",
                self.address, attempts, caller
            );
            return Ok(VerifyOutcome::Banned);
        }

        debug!(
            "Verification {}/{} failed for {} on {}",
            self.trial_count, RETRY_LIMIT, caller, self.address
        );
        Ok(VerifyOutcome::Rejected {
            attempts: self.trial_count,
        })
    }

    /// Empty the escrow for the owner. Returns the amount released.
    ///
    /// Allowed in any non-banned state, including with an empty escrow.
    pub fn withdraw(&mut self, caller: Address, events: &mut impl EventSink) -> MarketResult<u128> {
        if self.state == ListingState::Banned {
            return Err(MarketError::Banned);
        }
        if caller != self.owner {
            return Err(MarketError::NotOwner);
        }

        let amount = std::mem::take(&mut self.escrow);
        events.emit(
            self.address,
            MarketEvent::Withdrawn {
                listing: self.address,
                owner: self.owner,
                amount,
            },
        );
        info!("Owner withdrew {} from {}", amount, self.address);
        Ok(amount)
    }

    /// Tell the buyer in progress where the delivery can be fetched.
    pub fn emit_upload(
        &self,
        caller: Address,
        reference: &str,
        events: &mut impl EventSink,
    ) -> MarketResult<()> {
        let buyer = match (self.state, self.progress_buyer) {
            (ListingState::InProgress, Some(buyer)) => buyer,
            _ => return Err(MarketError::NotInProgress),
        };
        if caller != self.owner {
            return Err(MarketError::NotOwner);
        }

        events.emit(
            self.address,
            MarketEvent::DataUploaded {
                listing: self.address,
                owner: self.owner,
                buyer,
                reference: reference.to_string(),
            },
        );
        debug!("Upload reference for {} posted on {}", buyer, self.address);
        Ok(())
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn owner(&self) -> Address {
        self.owner
    }

    pub const fn price(&self) -> u128 {
        self.price
    }

    pub const fn data_hash(&self) -> &Commitment {
        &self.data_hash
    }

    pub const fn state(&self) -> ListingState {
        self.state
    }

    pub const fn progress_buyer(&self) -> Option<Address> {
        self.progress_buyer
    }

    pub const fn trial_count(&self) -> u32 {
        self.trial_count
    }

    pub const fn retry_limit(&self) -> u32 {
        RETRY_LIMIT
    }

    /// Funds held by the listing and not yet withdrawn.
    pub const fn escrow(&self) -> u128 {
        self.escrow
    }

    pub fn is_confirmed_buyer(&self, identity: &Address) -> bool {
        self.confirmed_buyers.contains(identity)
    }

    pub fn is_denied(&self, identity: &Address) -> bool {
        self.denied_buyers.contains(identity)
    }

    /// Metadata pairs in insertion order.
    pub fn additional_info(&self) -> &[(String, String)] {
        &self.additional_info
    }

    pub fn info(&self, key: &str) -> Option<&str> {
        self.additional_info
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub const fn key_registry(&self) -> Option<Address> {
        self.key_registry
    }
}
