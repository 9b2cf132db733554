//! In-process ledger hosting the marketplace contracts.
//!
//! Every mutating call is one transaction: the world state is checkpointed
//! first and restored if the call fails, together with any events it wrote.
//! Committed events get a sequence number and timestamp and are broadcast
//! to live subscribers.

pub mod journal;
pub mod state;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use journal::EventJournal;
pub use state::{Account, Checkpoint, WorldState};

use crate::config::{MarketConfig, MAX_SNAPSHOT_SIZE};
use crate::crypto::PublicKeyRecord;
use crate::error::{MarketError, MarketResult};
use crate::marketplace::{
    Address, EventRecord, KeyRegistry, Listing, ListingParams, MarketEvent, Registry,
    VerifyOutcome,
};
use crate::traits::{EventSink, SystemTimeProvider, TimeProvider};
use crate::util::{cbor_from_limited_reader, cbor_to_vec};

#[derive(Serialize)]
struct SnapshotRef<'a> {
    tx_count: u64,
    state: &'a WorldState,
    events: &'a [EventRecord],
}

#[derive(Deserialize)]
struct Snapshot {
    tx_count: u64,
    state: WorldState,
    events: Vec<EventRecord>,
}

/// Execution environment for key registries, listings and registries.
pub struct Ledger<T: TimeProvider = SystemTimeProvider> {
    config: MarketConfig,
    time: T,
    state: WorldState,
    journal: EventJournal,
    tx_count: u64,
    events_tx: broadcast::Sender<EventRecord>,
}

impl Ledger<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_config(MarketConfig::default(), SystemTimeProvider::new())
    }
}

impl Default for Ledger<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> Ledger<T> {
    pub fn with_config(config: MarketConfig, time: T) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            config,
            time,
            state: WorldState::default(),
            journal: EventJournal::default(),
            tx_count: 0,
            events_tx,
        }
    }

    pub const fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Read-only view of the world state.
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    /// Number of committed transactions.
    pub const fn tx_count(&self) -> u64 {
        self.tx_count
    }

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.events_tx.subscribe()
    }

    /// The committed event log.
    pub fn events(&self) -> &[EventRecord] {
        self.journal.records()
    }

    /// Committed events with sequence number `seq` or later.
    pub fn events_since(&self, seq: u64) -> &[EventRecord] {
        self.journal.since(seq)
    }

    fn transact<R>(
        &mut self,
        op: &'static str,
        caller: Address,
        f: impl FnOnce(&mut WorldState, &mut EventJournal) -> MarketResult<R>,
    ) -> MarketResult<R> {
        let checkpoint = self.state.checkpoint();
        let mark = self.journal.checkpoint();

        match f(&mut self.state, &mut self.journal) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(e) => {
                self.state.restore(checkpoint);
                self.journal.truncate(mark);
                warn!("{} by {} rejected: {}", op, caller, e);
                Err(e)
            }
        }
    }

    fn commit(&mut self) {
        self.state.commit();
        self.tx_count += 1;
        let timestamp = self.time.now_unix();
        let committed = self.journal.commit(self.tx_count, timestamp);
        for record in committed {
            debug!("Event #{} {} from {}", record.seq, record.event.name(), record.source);
            // No live subscribers is not an error.
            let _ = self.events_tx.send(record.clone());
        }
    }

    /// Credit native balance to `identity`.
    pub fn fund(&mut self, identity: Address, amount: u128) -> MarketResult<()> {
        self.transact("fund", identity, |state, _| {
            state.credit(identity, amount)?;
            info!("Funded {} with {}", identity, amount);
            Ok(())
        })
    }

    pub fn balance_of(&self, identity: &Address) -> u128 {
        self.state.balance_of(identity)
    }

    pub fn deploy_key_registry(&mut self, caller: Address) -> MarketResult<Address> {
        self.transact("deploy_key_registry", caller, |state, _| {
            let address = state.next_address(caller);
            state.insert(address, Account::KeyRegistry(KeyRegistry::new(address)));
            info!("{} deployed key registry {}", caller, address);
            Ok(address)
        })
    }

    /// Deploy a standalone listing owned by `caller`.
    pub fn deploy_listing(&mut self, caller: Address, params: ListingParams) -> MarketResult<Address> {
        let max_metadata = self.config.max_metadata_entries;
        self.transact("deploy_listing", caller, |state, events| {
            create_listing(state, events, caller, &params, max_metadata)
        })
    }

    /// Deploy a registry, optionally sharing `key_registry` with every
    /// listing it creates.
    pub fn deploy_registry(
        &mut self,
        caller: Address,
        key_registry: Option<Address>,
    ) -> MarketResult<Address> {
        self.transact("deploy_registry", caller, |state, _| {
            if let Some(shared) = key_registry {
                state.key_registry(&shared)?;
            }
            let address = state.next_address(caller);
            state.insert(
                address,
                Account::Registry(Registry::new(address, caller, key_registry)),
            );
            info!("{} deployed registry {}", caller, address);
            Ok(address)
        })
    }

    /// Publish `material` as the key of `caller` in `registry`.
    pub fn register_key(
        &mut self,
        caller: Address,
        registry: Address,
        material: &str,
    ) -> MarketResult<()> {
        let max_len = self.config.max_key_material_len;
        self.transact("register_key", caller, |state, events| {
            if material.len() > max_len {
                return Err(MarketError::Validation(format!(
                    "key material of {} bytes exceeds the limit of {}",
                    material.len(),
                    max_len
                )));
            }
            state.update_key_registry(registry, |keys| {
                keys.register_key(caller, material, events).map(|_| ())
            })
        })
    }

    pub fn key_of(&self, registry: &Address, identity: &Address) -> MarketResult<&PublicKeyRecord> {
        self.state.key_registry(registry)?.get_key(identity)
    }

    pub fn has_key(&self, registry: &Address, identity: &Address) -> MarketResult<bool> {
        Ok(self.state.key_registry(registry)?.has_key(identity))
    }

    /// Pay `payment` from `caller`'s balance into the listing's escrow.
    ///
    /// The listing's own checks run before the debit.
    pub fn purchase(&mut self, caller: Address, listing: Address, payment: u128) -> MarketResult<()> {
        self.transact("purchase", caller, |state, events| {
            state.update_listing(listing, |entry, world| {
                let key_registry = match entry.key_registry() {
                    Some(address) => Some(world.key_registry(&address)?),
                    None => None,
                };
                entry.purchase(caller, payment, key_registry, events)
            })?;
            state.debit(caller, payment)
        })
    }

    /// Reveal a value to the listing. A wrong value still commits the
    /// attempt.
    pub fn verify(
        &mut self,
        caller: Address,
        listing: Address,
        revealed: &[u8],
    ) -> MarketResult<VerifyOutcome> {
        self.transact("verify", caller, |state, events| {
            state.update_listing(listing, |entry, _| entry.verify(caller, revealed, events))
        })
    }

    /// Move the listing's escrow to the owner's balance.
    pub fn withdraw(&mut self, caller: Address, listing: Address) -> MarketResult<u128> {
        self.transact("withdraw", caller, |state, events| {
            let amount = state.update_listing(listing, |entry, _| entry.withdraw(caller, events))?;
            state.credit(caller, amount)?;
            Ok(amount)
        })
    }

    pub fn emit_upload(
        &mut self,
        caller: Address,
        listing: Address,
        reference: &str,
    ) -> MarketResult<()> {
        let max_len = self.config.max_reference_len;
        self.transact("emit_upload", caller, |state, events| {
            if reference.len() > max_len {
                return Err(MarketError::Validation(format!(
                    "upload reference of {} bytes exceeds the limit of {}",
                    reference.len(),
                    max_len
                )));
            }
            state.listing(&listing)?.emit_upload(caller, reference, events)
        })
    }

    /// Deploy a listing owned by `caller` and track it in `registry`.
    ///
    /// A registry with a shared key registry gates every listing it creates
    /// on that key registry.
    pub fn registry_deploy_listing(
        &mut self,
        caller: Address,
        registry: Address,
        params: ListingParams,
    ) -> MarketResult<Address> {
        let max_metadata = self.config.max_metadata_entries;
        self.transact("registry_deploy_listing", caller, |state, events| {
            let mut params = params;
            if let Some(shared) = state.registry(&registry)?.key_registry() {
                params.key_registry = Some(shared);
            }
            let address = create_listing(state, events, caller, &params, max_metadata)?;
            state.update_registry(registry, |directory| {
                directory.track(address, events);
                Ok(())
            })?;
            Ok(address)
        })
    }

    /// Track an already deployed listing. Returns `false` if it was tracked
    /// before.
    pub fn register_listing(
        &mut self,
        caller: Address,
        registry: Address,
        listing: Address,
    ) -> MarketResult<bool> {
        self.transact("register_listing", caller, |state, events| {
            state.listing(&listing)?;
            state.update_registry(registry, |directory| Ok(directory.track(listing, events)))
        })
    }

    pub fn listings_of(&self, registry: &Address) -> MarketResult<&[Address]> {
        Ok(self.state.registry(registry)?.listings())
    }

    pub fn listing(&self, address: &Address) -> MarketResult<&Listing> {
        self.state.listing(address)
    }

    pub fn key_registry(&self, address: &Address) -> MarketResult<&KeyRegistry> {
        self.state.key_registry(address)
    }

    pub fn registry(&self, address: &Address) -> MarketResult<&Registry> {
        self.state.registry(address)
    }

    /// Serialize world state and the event log to CBOR.
    pub fn snapshot_cbor(&self) -> MarketResult<Vec<u8>> {
        cbor_to_vec(&SnapshotRef {
            tx_count: self.tx_count,
            state: &self.state,
            events: self.journal.records(),
        })
    }

    /// Replace world state and the event log with a snapshot.
    ///
    /// Live subscribers stay attached.
    pub fn restore_cbor(&mut self, data: &[u8]) -> MarketResult<()> {
        let snapshot: Snapshot = cbor_from_limited_reader(data, MAX_SNAPSHOT_SIZE)?;
        info!(
            "Restored ledger at tx {} with {} event(s)",
            snapshot.tx_count,
            snapshot.events.len()
        );
        self.tx_count = snapshot.tx_count;
        self.state = snapshot.state;
        self.journal = EventJournal::from_records(snapshot.events);
        Ok(())
    }
}

fn create_listing(
    state: &mut WorldState,
    events: &mut EventJournal,
    owner: Address,
    params: &ListingParams,
    max_metadata: usize,
) -> MarketResult<Address> {
    if let Some(registry) = params.key_registry {
        state.key_registry(&registry)?;
    }
    let address = state.next_address(owner);
    let listing = Listing::new(address, owner, params, max_metadata)?;

    events.emit(
        address,
        MarketEvent::ListingDeployed {
            listing: address,
            owner,
            price: listing.price(),
            data_hash: *listing.data_hash(),
        },
    );
    info!(
        "{} deployed listing {} at price {}",
        owner,
        address,
        listing.price()
    );
    state.insert(address, Account::Listing(listing));
    Ok(address)
}
