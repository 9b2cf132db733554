//! Rejected operations leave no trace: state, balances, nonces and the
//! event log are exactly as before the call.

use datamarket::{Commitment, ListingParams, MarketConfig, MarketError, MarketResult, WorldState};

use crate::common::{MarketHarness, PRICE};

struct Before {
    state: WorldState,
    events: usize,
    tx_count: u64,
}

fn capture(harness: &MarketHarness) -> Before {
    Before {
        state: harness.ledger.state().clone(),
        events: harness.ledger.events().len(),
        tx_count: harness.ledger.tx_count(),
    }
}

fn assert_rejected<T: std::fmt::Debug>(
    harness: &MarketHarness,
    before: &Before,
    result: MarketResult<T>,
    expected: &MarketError,
) {
    match result {
        Err(e) => assert_eq!(&e, expected),
        Ok(value) => panic!("expected {expected:?}, got Ok({value:?})"),
    }
    assert!(harness.ledger.state() == &before.state, "state changed");
    assert_eq!(harness.ledger.events().len(), before.events);
    assert_eq!(harness.ledger.tx_count(), before.tx_count);
}

#[test]
fn test_rejected_purchase_keeps_funds() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();
    let before = capture(&harness);

    let result = harness.ledger.purchase(harness.market_owner, listing, PRICE);

    assert_rejected(&harness, &before, result, &MarketError::NotForSale);
}

#[test]
fn test_rejected_gated_purchase_keeps_funds() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_registry_listing();
    let before = capture(&harness);

    let result = harness.ledger.purchase(harness.buyer, listing, PRICE);

    assert_rejected(
        &harness,
        &before,
        result,
        &MarketError::NotRegistered(harness.buyer),
    );
}

#[test]
fn test_purchase_beyond_balance() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_open_listing();
    let available = harness.ledger.balance_of(&harness.buyer);
    let before = capture(&harness);

    let result = harness.ledger.purchase(harness.buyer, listing, available + 1);

    assert_rejected(
        &harness,
        &before,
        result,
        &MarketError::InsufficientBalance {
            needed: available + 1,
            available,
        },
    );
}

#[test]
fn test_rejected_listing_calls() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();
    let before = capture(&harness);

    let result = harness.ledger.verify(harness.iot_owner, listing, b"test");
    assert_rejected(&harness, &before, result, &MarketError::NotBuyer);

    let result = harness.ledger.withdraw(harness.buyer, listing);
    assert_rejected(&harness, &before, result, &MarketError::NotOwner);

    let result = harness.ledger.emit_upload(harness.buyer, listing, "ref");
    assert_rejected(&harness, &before, result, &MarketError::NotOwner);
}

#[test]
fn test_rejected_key_registration() {
    let mut harness = MarketHarness::new();
    let before = capture(&harness);

    let result = harness
        .ledger
        .register_key(harness.buyer, harness.key_registry, r#"{"n":"AAAA","e":"65537"}"#);

    assert!(matches!(result, Err(MarketError::InvalidKey(_))));
    assert!(harness.ledger.state() == &before.state);
    assert_eq!(harness.ledger.events().len(), before.events);
}

#[test]
fn test_rejected_deployments_consume_no_address() {
    let mut harness = MarketHarness::new();
    let before = capture(&harness);

    let zero_price = ListingParams::new(0, Commitment::of(b"test"));
    let result = harness.ledger.deploy_listing(harness.iot_owner, zero_price);
    assert_rejected(&harness, &before, result, &MarketError::InvalidPrice);

    let mismatched = harness.listing_params().metadata(["fileType"], Vec::<String>::new());
    let result =
        harness
            .ledger
            .registry_deploy_listing(harness.iot_owner, harness.registry, mismatched);
    assert_rejected(
        &harness,
        &before,
        result,
        &MarketError::MetadataLengthMismatch { keys: 1, values: 0 },
    );

    // The next successful deployment gets the first address.
    let listing = harness.deploy_open_listing();
    let expected = datamarket::Address::derive(&harness.iot_owner, 0);
    assert_eq!(listing, expected);
}

#[test]
fn test_oversized_inputs() {
    let config = MarketConfig {
        max_reference_len: 8,
        max_metadata_entries: 1,
        ..MarketConfig::default()
    };
    let mut harness = MarketHarness::with_config(config);
    let params = harness.listing_params();
    let before = capture(&harness);

    let result = harness.ledger.deploy_listing(harness.iot_owner, params);
    assert!(matches!(result, Err(MarketError::Validation(_))));
    assert!(harness.ledger.state() == &before.state);

    let listing = harness
        .ledger
        .deploy_listing(
            harness.iot_owner,
            ListingParams::new(PRICE, Commitment::of(b"test")),
        )
        .unwrap();
    harness.ledger.purchase(harness.buyer, listing, PRICE).unwrap();
    let before = capture(&harness);

    let result = harness
        .ledger
        .emit_upload(harness.iot_owner, listing, "ipfs://far-too-long");
    assert!(matches!(result, Err(MarketError::Validation(_))));
    assert!(harness.ledger.state() == &before.state);
    assert_eq!(harness.ledger.events().len(), before.events);
}
