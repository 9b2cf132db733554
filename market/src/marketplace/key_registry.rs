use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Address, MarketEvent};
use crate::crypto::PublicKeyRecord;
use crate::error::{MarketError, MarketResult};
use crate::traits::EventSink;

/// Directory of published public keys, at most one per identity.
///
/// Listings that reference a registry only sell to identities found here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegistry {
    address: Address,
    keys: BTreeMap<Address, PublicKeyRecord>,
}

impl KeyRegistry {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            keys: BTreeMap::new(),
        }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    /// Validate and store `material` as the key of `identity`.
    ///
    /// Re-registration replaces the earlier key. Returns `true` when a
    /// previous key was replaced.
    pub fn register_key(
        &mut self,
        identity: Address,
        material: &str,
        events: &mut impl EventSink,
    ) -> MarketResult<bool> {
        let record = PublicKeyRecord::parse(material)?;
        let bits = record.modulus_bits;
        let replaced = self.keys.insert(identity, record).is_some();

        events.emit(
            self.address,
            MarketEvent::KeyRegistered {
                registry: self.address,
                identity,
            },
        );
        info!(
            "Registered {}-bit key for {} in {} (replaced: {})",
            bits, identity, self.address, replaced
        );
        Ok(replaced)
    }

    /// Look up the key published by `identity`.
    pub fn get_key(&self, identity: &Address) -> MarketResult<&PublicKeyRecord> {
        self.keys.get(identity).ok_or_else(|| {
            debug!("No key registered for {} in {}", identity, self.address);
            MarketError::NotRegistered(*identity)
        })
    }

    pub fn has_key(&self, identity: &Address) -> bool {
        self.keys.contains_key(identity)
    }

    /// Number of identities with a registered key.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
