//! Black-box end-to-end scenarios driven only through `flightless`'s public
//! API: no mocking, real components (a real in-memory SQLite store, real
//! signed events, the real NIP-59 gift-wrap oracle).

use std::sync::Arc;
use std::time::Duration;

use flightless::credential;
use flightless::ingest::ingest_event;
use flightless::nostr::{EventBuilder, Keys, Kind, Tag, Timestamp};
use flightless::publisher::dm_fanout_targets;
use flightless::relay::Supervisor;
use flightless::sealed_dm::{GiftWrapOracle, SealedDmOracle};
use flightless::store::Store;

fn contacts_event(author: &Keys, followees: &[&Keys], created_at: u64) -> flightless::nostr::Event {
    let tags: Vec<Tag> = followees.iter().map(|k| Tag::public_key(k.public_key())).collect();
    EventBuilder::new(Kind::ContactList, "")
        .tags(tags)
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(author)
        .unwrap()
}

fn metadata_event(author: &Keys, name: &str, created_at: u64) -> flightless::nostr::Event {
    let content = format!(r#"{{"name":"{name}"}}"#);
    EventBuilder::new(Kind::Metadata, content)
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(author)
        .unwrap()
}

/// Scenario 1: first-run login seeds the password hash; the same password
/// verifies on a later run, a different one does not.
#[test]
fn first_run_login_then_restart_verifies_password() {
    let store = Store::open_in_memory().unwrap();
    assert!(!store.has_login().unwrap());

    store.seed_login(&credential::create_password_hash("hunter2")).unwrap();
    assert!(store.has_login().unwrap());

    let stored_hash = store.login_password_hash().unwrap().unwrap();
    assert!(credential::verify_password(&stored_hash, "hunter2").unwrap());
    assert!(!credential::verify_password(&stored_hash, "hunter3").unwrap());

    let mismatch: flightless::Error = credential::Error::LoginMismatch.into();
    assert_eq!(mismatch.exit_code(), 1);
}

/// Scenario 2: out-of-order kind-3 events converge on the strictly-newest
/// follow set regardless of arrival order.
#[tokio::test]
async fn contacts_update_converges_to_latest_follow_set() {
    let store = Store::open_in_memory().unwrap();
    let oracle = GiftWrapOracle;
    let author = Keys::generate();
    let (a, b, c, d) = (Keys::generate(), Keys::generate(), Keys::generate(), Keys::generate());

    ingest_event(&store, &oracle, None, &contacts_event(&author, &[&a, &b, &c], 100))
        .await
        .unwrap();
    ingest_event(&store, &oracle, None, &contacts_event(&author, &[&a], 50))
        .await
        .unwrap();
    ingest_event(&store, &oracle, None, &contacts_event(&author, &[&a, &d], 200))
        .await
        .unwrap();

    let m = store.get_metadata(&author.public_key().to_hex()).unwrap().unwrap();
    let mut follows = m.follows.clone();
    follows.sort();
    let mut expected = vec![a.public_key().to_hex(), d.public_key().to_hex()];
    expected.sort();
    assert_eq!(follows, expected);
    assert_eq!(m.total_follows, 2);
    assert_eq!(m.contacts_updated_at, 200);
}

/// Scenario 3: out-of-order kind-0 events keep the strictly-newest content.
#[tokio::test]
async fn out_of_order_metadata_keeps_the_latest_event() {
    let store = Store::open_in_memory().unwrap();
    let oracle = GiftWrapOracle;
    let author = Keys::generate();

    ingest_event(&store, &oracle, None, &metadata_event(&author, "late", 200))
        .await
        .unwrap();
    ingest_event(&store, &oracle, None, &metadata_event(&author, "early", 100))
        .await
        .unwrap();

    let m = store.get_metadata(&author.public_key().to_hex()).unwrap().unwrap();
    assert_eq!(m.name, "late");
    assert_eq!(m.metadata_updated_at, 200);
}

/// Scenario 4: unwrapping the same sealed-DM envelope repeatedly leaves
/// exactly one `ChatMessage` row, keyed by the envelope id.
#[tokio::test]
async fn sealed_dm_ingestion_is_idempotent() {
    let store = Store::open_in_memory().unwrap();
    let oracle = GiftWrapOracle;
    let sender = Keys::generate();
    let recipient = Keys::generate();

    let mut receivers = std::collections::HashMap::new();
    receivers.insert(recipient.public_key().to_hex(), None);
    let envelopes = oracle
        .wrap(&sender.secret_key().to_secret_hex(), "hi there", 1_700_000_000, &receivers)
        .await
        .unwrap();
    let envelope = envelopes.get(&recipient.public_key().to_hex()).unwrap();

    let recipient_sk = recipient.secret_key().to_secret_hex();
    for _ in 0..3 {
        ingest_event(&store, &oracle, Some(&recipient_sk), envelope)
            .await
            .unwrap();
    }

    let messages = store.chat_messages_to(&recipient.public_key().to_hex()).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event_id, envelope.id.to_hex());
    assert_eq!(messages[0].content, "hi there");
    assert_eq!(messages[0].from_pubkey, sender.public_key().to_hex());
}

/// Scenario 5: a `waiting` RelayStatus row transitions away from `waiting`
/// after one reconciler tick, and a `deleting` row is gone after the next.
/// Uses a syntactically invalid relay URL so the transition is deterministic
/// without requiring real network access.
#[tokio::test]
async fn relay_lifecycle_waiting_then_deleting() {
    let store = Store::open_in_memory().unwrap();
    let http = reqwest::Client::new();
    let oracle: Arc<dyn SealedDmOracle> = Arc::new(GiftWrapOracle);
    let supervisor = Supervisor::new(store.clone(), http, oracle, Duration::from_millis(20));

    let url = "not-a-valid-relay-url";
    store.upsert_relay_status(url, "waiting", 1).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    let running = Arc::clone(&supervisor);
    let handle = tokio::spawn(async move { running.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = store.get_relay_status(url).unwrap().unwrap();
    assert_ne!(status.status, "waiting");

    store.upsert_relay_status(url, "deleting", 2).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.get_relay_status(url).unwrap().is_none());

    shutdown_tx.send(()).await.unwrap();
    handle.await.unwrap().unwrap();
}

/// Scenario 6: a sealed-DM fan-out reaches the union of both parties'
/// DM-relay sets exactly once per relay.
#[test]
fn dm_fanout_reaches_the_union_of_both_parties_relays() {
    let sender = vec!["wss://r1".to_string(), "wss://r2".to_string()];
    let recipient = vec!["wss://r2".to_string(), "wss://r3".to_string()];

    let mut targets = dm_fanout_targets(&sender, &recipient, &[]);
    targets.sort();
    assert_eq!(
        targets,
        vec!["wss://r1".to_string(), "wss://r2".to_string(), "wss://r3".to_string()]
    );
    // Each relay named exactly once even though r2 is shared.
    assert_eq!(targets.iter().filter(|u| u.as_str() == "wss://r2").count(), 1);
}
