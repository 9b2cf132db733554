//! Event log and live subscription behaviour.

use datamarket::mocks::SAMPLE_PUBLIC_KEY;
use datamarket::{MarketError, MarketEvent, SharedLedger};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::debug;

use crate::common::{MarketHarness, DATA, PRICE};

#[tokio::test]
async fn test_subscriber_sees_committed_events_in_order() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_registry_listing();
    harness.register_key(harness.buyer);
    let mut rx = harness.ledger.subscribe();

    harness.ledger.purchase(harness.buyer, listing, PRICE).unwrap();
    harness
        .ledger
        .emit_upload(harness.iot_owner, listing, "ipfs://delivery")
        .unwrap();
    harness.ledger.verify(harness.buyer, listing, DATA).unwrap();
    harness.ledger.withdraw(harness.iot_owner, listing).unwrap();

    let mut names = Vec::new();
    while let Ok(record) = rx.try_recv() {
        debug!("received {:?}", record);
        assert_eq!(record.source, listing);
        names.push(record.event.name());
    }
    assert_eq!(names, ["Purchased", "DataUploaded", "Verified", "Withdrawn"]);
}

#[tokio::test]
async fn test_failed_transaction_broadcasts_nothing() {
    let mut harness = MarketHarness::new();
    let listing = harness.deploy_registry_listing();
    let mut rx = harness.ledger.subscribe();

    let result = harness.ledger.purchase(harness.buyer, listing, PRICE);

    assert_eq!(result, Err(MarketError::NotRegistered(harness.buyer)));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_ban_emits_failure_then_ban() {
    let mut harness = MarketHarness::new();
    let listing = harness.purchased_listing();
    for _ in 0..9 {
        harness.ledger.verify(harness.buyer, listing, b"bad").unwrap();
    }
    let mark = harness.ledger.events().len() as u64;

    harness.ledger.verify(harness.buyer, listing, b"bad").unwrap();

    let tail = harness.ledger.events_since(mark);
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].tx, tail[1].tx);
    assert_eq!(
        tail[0].event,
        MarketEvent::Verified {
            listing,
            owner: harness.iot_owner,
            buyer: harness.buyer,
            success: false,
        }
    );
    assert_eq!(
        tail[1].event,
        MarketEvent::ListingBanned {
            listing,
            buyer: harness.buyer,
        }
    );
}

#[test]
fn test_event_log_is_sequenced_and_timestamped() {
    let mut harness = MarketHarness::new();
    harness.time.set(5_000);
    harness.register_key(harness.buyer);
    harness.time.advance(30);
    let listing = harness.deploy_registry_listing();

    let events = harness.ledger.events();
    for (index, record) in events.iter().enumerate() {
        assert_eq!(record.seq, index as u64);
    }

    let key_event = &events[0];
    assert_eq!(key_event.timestamp, 5_000);
    assert_eq!(key_event.source, harness.key_registry);
    assert_eq!(
        key_event.event,
        MarketEvent::KeyRegistered {
            registry: harness.key_registry,
            identity: harness.buyer,
        }
    );

    let deployed: Vec<_> = events.iter().skip(1).map(|r| &r.event).collect();
    assert_eq!(deployed.len(), 2);
    assert!(matches!(
        deployed[0],
        MarketEvent::ListingDeployed { listing: l, price, .. } if *l == listing && *price == PRICE
    ));
    assert_eq!(
        deployed[1],
        &MarketEvent::ListingRegistered {
            registry: harness.registry,
            listing,
        }
    );
    assert!(events[1..].iter().all(|r| r.timestamp == 5_030));
}

#[test]
fn test_purchase_event_carries_buyer_key() {
    let mut harness = MarketHarness::new();
    let gated = harness.deploy_registry_listing();
    let open = harness.deploy_open_listing();
    harness.register_key(harness.buyer);

    harness.ledger.purchase(harness.buyer, gated, PRICE).unwrap();
    harness.ledger.purchase(harness.buyer, open, PRICE).unwrap();

    let keys: Vec<_> = harness
        .ledger
        .events()
        .iter()
        .filter_map(|r| match &r.event {
            MarketEvent::Purchased {
                listing, buyer_key, ..
            } => Some((*listing, buyer_key.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            (gated, Some(SAMPLE_PUBLIC_KEY.to_string())),
            (open, None)
        ]
    );
}

#[tokio::test]
async fn test_shared_ledger_subscription_across_tasks() {
    let harness = MarketHarness::new();
    let buyer = harness.buyer;
    let owner = harness.iot_owner;
    let params = harness.listing_params();
    let shared = SharedLedger::new(harness.ledger);
    let mut rx = shared.subscribe();

    let writer = shared.clone();
    let task = tokio::spawn(async move {
        writer.execute(|ledger| {
            let listing = ledger.deploy_listing(owner, params)?;
            ledger.purchase(buyer, listing, PRICE)?;
            Ok::<_, MarketError>(listing)
        })
    });
    let listing = task.await.unwrap().unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert!(matches!(first.event, MarketEvent::ListingDeployed { .. }));
    assert!(matches!(
        second.event,
        MarketEvent::Purchased { buyer: b, .. } if b == buyer
    ));
    assert_eq!(
        shared.query(|ledger| ledger.listing(&listing).map(|l| l.escrow())),
        Ok(PRICE)
    );
}
