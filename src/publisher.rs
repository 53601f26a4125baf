//! Builds and signs every outbound event kind this client produces. The DM
//! fan-out union/fallback rule is split into a pure function so it's
//! directly unit-testable without a live relay.

use std::collections::HashMap;

use nostr::{EventBuilder, Keys, Kind, Tag};
use serde::Serialize;

use crate::sealed_dm::SealedDmOracle;
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] crate::store::Error),

    #[error("event builder error: {0}")]
    Builder(#[from] nostr::event::builder::Error),

    #[error("sealed-dm oracle error: {0}")]
    SealedDm(#[from] crate::sealed_dm::Error),
}

#[derive(Debug, Default, Serialize)]
struct Kind0Content<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    display_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    about: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    nip05: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    website: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    lud06: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    lud16: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    picture: &'a str,
}

/// Builds and signs a kind-0 profile update. Caller is responsible for
/// publishing it and for updating the local Metadata row.
pub fn build_profile_update(
    keys: &Keys,
    name: &str,
    display_name: &str,
    about: &str,
    nip05: &str,
    website: &str,
    lud06: &str,
    lud16: &str,
    picture: &str,
) -> Result<nostr::Event, Error> {
    let content = Kind0Content {
        name,
        display_name,
        about,
        nip05,
        website,
        lud06,
        lud16,
        picture,
    };
    let json = serde_json::to_string(&content).unwrap_or_default();
    Ok(EventBuilder::new(Kind::Metadata, json).sign_with_keys(keys)?)
}

/// Builds and signs a kind-10050 DM-relay-list update.
pub fn build_dm_relay_list_update(keys: &Keys, urls: &[String]) -> Result<nostr::Event, Error> {
    let tags: Vec<Tag> = urls
        .iter()
        .map(|url| Tag::custom(nostr::TagKind::custom("relay"), [url.clone()]))
        .collect();
    Ok(EventBuilder::new(Kind::Custom(10050), "")
        .tags(tags)
        .sign_with_keys(keys)?)
}

/// The union of sender's and recipient's DM-relay URLs, falling back to
/// the caller-supplied live-relay set when both are empty. Pure and
/// independent of any live relay connection.
pub fn dm_fanout_targets(
    sender_dm_relays: &[String],
    recipient_dm_relays: &[String],
    live_relays: &[String],
) -> Vec<String> {
    let mut targets: Vec<String> = sender_dm_relays
        .iter()
        .chain(recipient_dm_relays.iter())
        .cloned()
        .collect();
    targets.sort();
    targets.dedup();

    if targets.is_empty() {
        let mut fallback = live_relays.to_vec();
        fallback.sort();
        fallback.dedup();
        fallback
    } else {
        targets
    }
}

/// Builds the NIP-59 envelopes for a sealed DM, ready for the caller to
/// fan out over [`dm_fanout_targets`]. `hint_relay` is any one of the
/// DM-relay targets, used as a `relay` hint tag on each envelope.
pub async fn build_sealed_dm(
    oracle: &dyn SealedDmOracle,
    sender_sk_hex: &str,
    recipient_pubkey_hex: &str,
    hint_relay: Option<&str>,
    content: &str,
    timestamp: u64,
) -> Result<HashMap<String, nostr::Event>, Error> {
    let mut receivers = HashMap::new();
    receivers.insert(
        recipient_pubkey_hex.to_string(),
        hint_relay.map(|r| r.to_string()),
    );

    oracle
        .wrap(sender_sk_hex, content, timestamp, &receivers)
        .await
        .map_err(Error::from)
}

/// Applies the locally-authored profile update to the store the same way
/// an inbound kind-0 event from another relay would be.
pub fn apply_local_profile_update(
    store: &Store,
    pubkey_hex: &str,
    bech32: &str,
    name: &str,
    display_name: &str,
    about: &str,
    nip05: &str,
    website: &str,
    lud06: &str,
    lud16: &str,
    picture: &str,
    now: u64,
) -> Result<bool, Error> {
    let existing = store.get_metadata(pubkey_hex)?;
    let mut metadata = crate::model::Metadata {
        pubkey_hex: pubkey_hex.to_string(),
        bech32: bech32.to_string(),
        name: name.to_string(),
        display_name: display_name.to_string(),
        about: about.to_string(),
        nip05: nip05.to_string(),
        website: website.to_string(),
        lud06: lud06.to_string(),
        lud16: lud16.to_string(),
        picture: picture.to_string(),
        metadata_updated_at: now,
        ..Default::default()
    };
    if let Some(existing) = existing {
        metadata.contacts_updated_at = existing.contacts_updated_at;
        metadata.total_follows = existing.total_follows;
    }
    Ok(store.upsert_metadata_if_newer(&metadata)?)
}
