//! Single dispatch on event kind, every handler idempotent and newer-wins.
//! Shaped like a decrypt-or-route-raw pipeline, but dispatches on `Kind`
//! instead of NIP-44 decryptability, since this protocol's events are
//! plaintext except for the sealed-DM envelope.

use nostr::nips::nip19::ToBech32;
use nostr::{Event, Kind, PublicKey};
use serde::Deserialize;

use crate::model::{DMRelay, Metadata, RelayListEntry};
use crate::sealed_dm::SealedDmOracle;
use crate::store::Store;

const PICTURE_MAX_BYTES: usize = 65_535;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] crate::store::Error),

    #[error("sealed-dm oracle error: {0}")]
    SealedDm(#[from] crate::sealed_dm::Error),
}

#[derive(Debug, Default, Deserialize)]
struct Kind0Content {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    about: String,
    #[serde(default)]
    nip05: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    lud06: String,
    #[serde(default)]
    lud16: String,
    #[serde(default)]
    picture: String,
}

/// Dispatches one inbound event to the appropriate handler. `decrypt_sk`
/// is the active account's decrypted secret key, needed only for kind 1059
/// envelopes; callers pass `None` when no account is unlocked (the envelope
/// is then skipped, not treated as an error).
pub async fn ingest_event(
    store: &Store,
    oracle: &dyn SealedDmOracle,
    recipient_secret_key_hex: Option<&str>,
    event: &Event,
) -> Result<(), Error> {
    match event.kind {
        Kind::Metadata => ingest_metadata(store, event)?,
        Kind::ContactList => ingest_contacts(store, event)?,
        Kind::Custom(10002) => ingest_relay_list(store, event)?,
        Kind::Custom(10050) => ingest_dm_relay_list(store, event)?,
        Kind::GiftWrap => {
            if let Some(sk) = recipient_secret_key_hex {
                ingest_sealed_dm(store, oracle, sk, event).await?;
            } else {
                log::debug!("dropping sealed DM envelope {}: no unlocked account", event.id);
            }
        }
        other => log::trace!("ignoring unhandled kind {:?}", other),
    }
    Ok(())
}

fn ingest_metadata(store: &Store, event: &Event) -> Result<(), Error> {
    let pubkey_hex = event.pubkey.to_hex();
    let bech32 = event.pubkey.to_bech32().unwrap_or_default();

    let mut metadata = Metadata {
        pubkey_hex: pubkey_hex.clone(),
        bech32,
        metadata_updated_at: event.created_at.as_u64(),
        ..Default::default()
    };

    match serde_json::from_str::<Kind0Content>(&event.content) {
        Ok(parsed) => {
            metadata.name = parsed.name;
            metadata.display_name = parsed.display_name;
            metadata.about = parsed.about;
            metadata.nip05 = parsed.nip05;
            metadata.website = parsed.website;
            metadata.lud06 = parsed.lud06;
            metadata.lud16 = parsed.lud16;
            metadata.picture = if parsed.picture.len() > PICTURE_MAX_BYTES {
                String::new()
            } else {
                parsed.picture
            };
        }
        Err(_) => {
            metadata.raw_json = Some(event.content.clone());
        }
    }

    let existing = store.get_metadata(&pubkey_hex)?;
    if let Some(existing) = existing {
        metadata.contacts_updated_at = existing.contacts_updated_at;
        metadata.total_follows = existing.total_follows;
    }

    if !store.upsert_metadata_if_newer(&metadata)? {
        log::trace!("dropped stale kind-0 event for {pubkey_hex}");
    }
    Ok(())
}

fn ingest_contacts(store: &Store, event: &Event) -> Result<(), Error> {
    let pubkey_hex = event.pubkey.to_hex();

    let mut seen = std::collections::HashSet::new();
    let follows: Vec<String> = event
        .tags
        .public_keys()
        .map(|pk| pk.to_hex())
        .filter(|hex| seen.insert(hex.clone()))
        .collect();

    if !store.upsert_contacts_if_newer(&pubkey_hex, &follows, event.created_at.as_u64())? {
        log::trace!("dropped stale kind-3 event for {pubkey_hex}");
    }
    Ok(())
}

fn ingest_relay_list(store: &Store, event: &Event) -> Result<(), Error> {
    let pubkey_hex = event.pubkey.to_hex();
    let mut entries = Vec::new();

    for tag in event.tags.iter() {
        let values = tag.as_slice();
        if values.len() < 2 || values[0] != "r" {
            continue;
        }
        let url = values[1].clone();
        let (read, write) = match values.get(2).map(String::as_str) {
            Some("read") => (true, false),
            Some("write") => (false, true),
            _ => (true, true),
        };
        entries.push(RelayListEntry {
            pubkey_hex: pubkey_hex.clone(),
            url,
            read,
            write,
        });
    }

    store.replace_relay_list(&pubkey_hex, &entries)?;
    Ok(())
}

fn ingest_dm_relay_list(store: &Store, event: &Event) -> Result<(), Error> {
    let pubkey_hex = event.pubkey.to_hex();
    store.ensure_metadata_placeholder(&pubkey_hex)?;

    let urls: Vec<String> = event
        .tags
        .iter()
        .filter_map(|tag| {
            let values = tag.as_slice();
            if values.len() >= 2 && values[0] == "relay" {
                Some(values[1].clone())
            } else {
                None
            }
        })
        .collect();

    store.replace_dm_relays(&pubkey_hex, &urls, event.created_at.as_u64())?;
    Ok(())
}

async fn ingest_sealed_dm(
    store: &Store,
    oracle: &dyn SealedDmOracle,
    recipient_secret_key_hex: &str,
    envelope: &Event,
) -> Result<(), Error> {
    let inner = match oracle.unwrap(recipient_secret_key_hex, envelope).await {
        Ok(inner) => inner,
        Err(e) => {
            log::warn!("failed to unwrap sealed DM {}: {e}", envelope.id);
            return Ok(());
        }
    };

    let to_pubkey = inner
        .tags
        .public_keys()
        .next()
        .map(PublicKey::to_hex)
        .unwrap_or_default();

    store.insert_chat_message_if_new(
        &envelope.id.to_hex(),
        &inner.pubkey.to_hex(),
        &to_pubkey,
        &inner.content,
        inner.created_at.as_u64(),
    )?;
    Ok(())
}
