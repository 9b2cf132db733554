//! Snapshot and restore of a running marketplace.

use datamarket::mocks::MockTime;
use datamarket::{Ledger, ListingState, MarketConfig, MarketError, VerifyOutcome};

use crate::common::{MarketHarness, DATA, PRICE};

#[test]
fn test_purchase_resumes_after_restore() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_registry_listing();
    harness.register_key(harness.buyer);
    harness.ledger.purchase(harness.buyer, listing, PRICE).unwrap();
    harness.ledger.verify(harness.buyer, listing, b"bad").unwrap();

    let snapshot = harness.ledger.snapshot_cbor().unwrap();
    let mut restored = Ledger::with_config(MarketConfig::default(), MockTime::new(9_000));
    restored.restore_cbor(&snapshot).unwrap();

    let entry = restored.listing(&listing).unwrap();
    assert_eq!(entry.state(), ListingState::InProgress);
    assert_eq!(entry.trial_count(), 1);
    assert_eq!(entry.escrow(), PRICE);
    assert_eq!(
        restored.key_of(&harness.key_registry, &harness.buyer),
        harness.ledger.key_of(&harness.key_registry, &harness.buyer)
    );

    assert_eq!(
        restored.verify(harness.buyer, listing, DATA),
        Ok(VerifyOutcome::Confirmed)
    );
    assert_eq!(restored.withdraw(harness.iot_owner, listing), Ok(PRICE));
    assert_eq!(
        restored.events().last().map(|r| r.timestamp),
        Some(9_000)
    );
    assert_eq!(
        restored.events().len(),
        harness.ledger.events().len() + 2
    );
}

#[test]
fn test_large_amounts_survive_snapshot() {
    let mut harness = MarketHarness::new();
    let whale = datamarket::mocks::make_test_address(99);
    let amount = u128::from(u64::MAX) * 1_000;
    harness.ledger.fund(whale, amount).unwrap();
    let listing = harness.deploy_open_listing();
    harness.ledger.purchase(whale, listing, amount).unwrap();

    let snapshot = harness.ledger.snapshot_cbor().unwrap();
    let mut restored = Ledger::with_config(MarketConfig::default(), MockTime::new(0));
    restored.restore_cbor(&snapshot).unwrap();

    assert_eq!(restored.listing(&listing).unwrap().escrow(), amount);
    assert_eq!(restored.events(), harness.ledger.events());
}

#[test]
fn test_truncated_snapshot_is_rejected() {
    let mut harness = MarketHarness::new();
    harness.deploy_open_listing();
    let snapshot = harness.ledger.snapshot_cbor().unwrap();

    let mut restored = Ledger::with_config(MarketConfig::default(), MockTime::new(0));
    let result = restored.restore_cbor(&snapshot[..snapshot.len() / 2]);

    assert!(matches!(result, Err(MarketError::Serialization(_))));
    assert_eq!(restored.tx_count(), 0);
    assert!(restored.events().is_empty());
}
