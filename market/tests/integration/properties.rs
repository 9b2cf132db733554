//! Invariants checked after every step of longer operation sequences.

use datamarket::mocks::{sample_public_key, SAMPLE_PUBLIC_KEY};
use datamarket::{ListingState, MarketError, VerifyOutcome};

use crate::common::{MarketHarness, DATA, PRICE};

const BAD: &[u8] = b"bad";

#[test]
fn test_invariants_hold_through_mixed_sequence() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_open_listing();
    let buyer = harness.buyer;
    let other = harness.market_owner;
    let owner = harness.iot_owner;
    let total = harness.total_value();

    // (caller, revealed) pairs; `None` means purchase instead of verify.
    let script = [
        (buyer, None),
        (buyer, Some(BAD)),
        (other, Some(DATA)),
        (buyer, Some(BAD)),
        (other, None),
        (buyer, Some(DATA)),
        (other, None),
        (other, Some(BAD)),
        (other, Some(DATA)),
        (buyer, None),
    ];

    for (caller, revealed) in script {
        let _ = match revealed {
            None => harness.ledger.purchase(caller, listing, PRICE).map(|()| None),
            Some(value) => harness.ledger.verify(caller, listing, value).map(Some),
        };
        harness.assert_invariants(listing);
        let _ = harness.ledger.withdraw(owner, listing);
        harness.assert_invariants(listing);
        assert_eq!(harness.total_value(), total);
    }

    let entry = harness.listing(listing);
    assert_eq!(entry.state(), ListingState::InProgress);
    assert_eq!(entry.progress_buyer(), Some(buyer));
    assert!(entry.is_confirmed_buyer(&buyer));
    assert!(entry.is_confirmed_buyer(&other));
}

#[test]
fn test_successful_verify_resets_failures() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();

    for _ in 0..9 {
        harness.ledger.verify(harness.buyer, listing, b"bad").unwrap();
    }
    assert_eq!(harness.listing(listing).trial_count(), 9);

    assert_eq!(
        harness.ledger.verify(harness.buyer, listing, DATA),
        Ok(VerifyOutcome::Confirmed)
    );
    let entry = harness.listing(listing);
    assert_eq!(entry.trial_count(), 0);
    assert_eq!(entry.progress_buyer(), None);
    assert_eq!(entry.state(), ListingState::ForSale);
}

#[test]
fn test_ban_is_irreversible() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();
    for _ in 0..10 {
        harness.ledger.verify(harness.buyer, listing, b"bad").unwrap();
        harness.assert_invariants(listing);
    }
    let entry = harness.listing(listing);
    assert_eq!(entry.progress_buyer(), None);
    assert_eq!(entry.trial_count(), 0);

    assert_eq!(
        harness.ledger.verify(harness.buyer, listing, DATA),
        Err(MarketError::NotInProgress)
    );
    assert_eq!(
        harness.ledger.purchase(harness.market_owner, listing, PRICE),
        Err(MarketError::NotForSale)
    );
    assert_eq!(
        harness.ledger.emit_upload(harness.iot_owner, listing, "late"),
        Err(MarketError::NotInProgress)
    );
    assert_eq!(
        harness.ledger.withdraw(harness.iot_owner, listing),
        Err(MarketError::Banned)
    );
    assert_eq!(harness.listing(listing).state(), ListingState::Banned);
    harness.assert_invariants(listing);
}

#[test]
fn test_key_reregistration_overwrites() {
    let mut harness = MarketHarness::new();
    let replacement = sample_public_key(42);

    harness.register_key(harness.buyer);
    harness
        .ledger
        .register_key(harness.buyer, harness.key_registry, &replacement)
        .unwrap();

    let stored = harness
        .ledger
        .key_of(&harness.key_registry, &harness.buyer)
        .unwrap();
    assert_eq!(stored.material, replacement);
    assert_ne!(stored.material, SAMPLE_PUBLIC_KEY);
    assert_eq!(harness.ledger.key_registry(&harness.key_registry).unwrap().len(), 1);
}

#[test]
fn test_permissive_withdraw() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_open_listing();

    // Fresh listing: zero-value withdrawal succeeds.
    assert_eq!(harness.ledger.withdraw(harness.iot_owner, listing), Ok(0));

    // Mid-purchase withdrawal is also allowed.
    harness.ledger.purchase(harness.buyer, listing, PRICE).unwrap();
    assert_eq!(harness.ledger.withdraw(harness.iot_owner, listing), Ok(PRICE));
    assert_eq!(harness.listing(listing).state(), ListingState::InProgress);
}

#[test]
fn test_withdraw_by_stranger() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();

    assert_eq!(
        harness.ledger.withdraw(harness.buyer, listing),
        Err(MarketError::NotOwner)
    );
    assert_eq!(harness.listing(listing).escrow(), PRICE);
}

#[test]
fn test_verify_by_other_identity() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();

    assert_eq!(
        harness.ledger.verify(harness.market_owner, listing, DATA),
        Err(MarketError::NotBuyer)
    );
    assert_eq!(
        harness.ledger.verify(harness.iot_owner, listing, DATA),
        Err(MarketError::NotBuyer)
    );
    assert_eq!(harness.listing(listing).trial_count(), 0);
}

#[test]
fn test_listing_addresses_are_unique() {
    let mut harness = MarketHarness::new();
    let mut seen = std::collections::BTreeSet::new();

    for _ in 0..20 {
        assert!(seen.insert(harness.deploy_registry_listing()));
    }
    assert_eq!(harness.ledger.listings_of(&harness.registry).unwrap().len(), 20);
}
