//! Account arena and native balances with an undo log for rollback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MarketError, MarketResult};
use crate::marketplace::{Address, KeyRegistry, Listing, Registry};

/// A contract living at an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Account {
    KeyRegistry(KeyRegistry),
    Listing(Listing),
    Registry(Registry),
}

impl Account {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeyRegistry(_) => "KeyRegistry",
            Self::Listing(_) => "Listing",
            Self::Registry(_) => "Registry",
        }
    }
}

/// Prior value of a slot touched during the current transaction.
#[derive(Debug, Clone)]
enum Change {
    Account(Address, Option<Account>),
    Balance(Address, Option<u128>),
    Nonce(Address, Option<u64>),
}

/// Position in the undo log to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    undo_log_index: usize,
}

/// Everything the ledger persists: contracts, balances and deployer nonces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    accounts: BTreeMap<Address, Account>,
    balances: BTreeMap<Address, u128>,
    nonces: BTreeMap<Address, u64>,
    #[serde(skip)]
    undo_log: Vec<Change>,
}

impl PartialEq for WorldState {
    fn eq(&self, other: &Self) -> bool {
        self.accounts == other.accounts
            && self.balances == other.balances
            && self.nonces == other.nonces
    }
}

impl WorldState {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            undo_log_index: self.undo_log.len(),
        }
    }

    /// Undo every change made after `checkpoint`, newest first.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        while self.undo_log.len() > checkpoint.undo_log_index {
            let Some(change) = self.undo_log.pop() else {
                break;
            };
            match change {
                Change::Account(address, prior) => restore_slot(&mut self.accounts, address, prior),
                Change::Balance(address, prior) => restore_slot(&mut self.balances, address, prior),
                Change::Nonce(address, prior) => restore_slot(&mut self.nonces, address, prior),
            }
        }
    }

    /// Forget the undo history once a transaction has committed.
    pub fn commit(&mut self) {
        self.undo_log.clear();
    }

    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, address: Address, amount: u128) -> MarketResult<()> {
        let current = self.balance_of(&address);
        let updated = current.checked_add(amount).ok_or_else(|| {
            MarketError::Validation(format!("balance overflow crediting {amount} to {address}"))
        })?;
        self.set_balance(address, updated);
        Ok(())
    }

    pub fn debit(&mut self, address: Address, amount: u128) -> MarketResult<()> {
        let available = self.balance_of(&address);
        if available < amount {
            return Err(MarketError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.set_balance(address, available - amount);
        Ok(())
    }

    fn set_balance(&mut self, address: Address, amount: u128) {
        let prior = self.balances.insert(address, amount);
        self.undo_log.push(Change::Balance(address, prior));
    }

    /// Allocate a fresh contract address for `deployer`, skipping any
    /// address that is already occupied.
    pub fn next_address(&mut self, deployer: Address) -> Address {
        let prior = self.nonces.get(&deployer).copied();
        let mut nonce = prior.unwrap_or(0);
        let mut address = Address::derive(&deployer, nonce);
        while self.accounts.contains_key(&address) {
            nonce += 1;
            address = Address::derive(&deployer, nonce);
        }
        self.nonces.insert(deployer, nonce + 1);
        self.undo_log.push(Change::Nonce(deployer, prior));
        address
    }

    pub fn insert(&mut self, address: Address, account: Account) {
        let prior = self.accounts.insert(address, account);
        self.undo_log.push(Change::Account(address, prior));
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn listing(&self, address: &Address) -> MarketResult<&Listing> {
        match self.accounts.get(address) {
            Some(Account::Listing(listing)) => Ok(listing),
            _ => Err(MarketError::UnknownAccount(*address)),
        }
    }

    pub fn key_registry(&self, address: &Address) -> MarketResult<&KeyRegistry> {
        match self.accounts.get(address) {
            Some(Account::KeyRegistry(registry)) => Ok(registry),
            _ => Err(MarketError::UnknownAccount(*address)),
        }
    }

    pub fn registry(&self, address: &Address) -> MarketResult<&Registry> {
        match self.accounts.get(address) {
            Some(Account::Registry(registry)) => Ok(registry),
            _ => Err(MarketError::UnknownAccount(*address)),
        }
    }

    /// Run `f` on the listing at `address` with read access to the rest of
    /// the world. The prior listing is journaled before `f` runs.
    pub fn update_listing<R>(
        &mut self,
        address: Address,
        f: impl FnOnce(&mut Listing, &Self) -> MarketResult<R>,
    ) -> MarketResult<R> {
        let mut listing = match self.take(address)? {
            Account::Listing(listing) => listing,
            other => return Err(self.put_back(address, other)),
        };
        let result = f(&mut listing, self);
        self.accounts.insert(address, Account::Listing(listing));
        result
    }

    pub fn update_key_registry<R>(
        &mut self,
        address: Address,
        f: impl FnOnce(&mut KeyRegistry) -> MarketResult<R>,
    ) -> MarketResult<R> {
        let mut registry = match self.take(address)? {
            Account::KeyRegistry(registry) => registry,
            other => return Err(self.put_back(address, other)),
        };
        let result = f(&mut registry);
        self.accounts
            .insert(address, Account::KeyRegistry(registry));
        result
    }

    pub fn update_registry<R>(
        &mut self,
        address: Address,
        f: impl FnOnce(&mut Registry) -> MarketResult<R>,
    ) -> MarketResult<R> {
        let mut registry = match self.take(address)? {
            Account::Registry(registry) => registry,
            other => return Err(self.put_back(address, other)),
        };
        let result = f(&mut registry);
        self.accounts.insert(address, Account::Registry(registry));
        result
    }

    /// Total of all native balances; escrow is held outside this sum.
    pub fn total_balances(&self) -> u128 {
        self.balances.values().sum()
    }

    /// Total escrow held across all listings.
    pub fn total_escrow(&self) -> u128 {
        self.accounts
            .values()
            .filter_map(|account| match account {
                Account::Listing(listing) => Some(listing.escrow()),
                _ => None,
            })
            .sum()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    fn take(&mut self, address: Address) -> MarketResult<Account> {
        let account = self
            .accounts
            .remove(&address)
            .ok_or(MarketError::UnknownAccount(address))?;
        self.undo_log
            .push(Change::Account(address, Some(account.clone())));
        Ok(account)
    }

    fn put_back(&mut self, address: Address, account: Account) -> MarketError {
        debug!("{} holds a {}, not the account kind requested", address, account.kind());
        self.accounts.insert(address, account);
        MarketError::UnknownAccount(address)
    }
}

fn restore_slot<V>(map: &mut BTreeMap<Address, V>, address: Address, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(address, value);
        }
        None => {
            map.remove(&address);
        }
    }
}
