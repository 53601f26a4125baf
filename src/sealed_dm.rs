//! A swappable contract for wrapping/unwrapping direct messages. Kept
//! behind a trait so a different sealing scheme can be substituted without
//! touching the ingestion or publish paths.
//!
//! The shipped implementation builds on NIP-59 gift-wrapping as the `nostr`
//! crate implements it (`EventBuilder::gift_wrap` / `nip59::extract_rumor`).

use std::collections::HashMap;

use async_trait::async_trait;
use nostr::event::{Event, UnsignedEvent};
use nostr::nips::nip59;
use nostr::{EventBuilder, Keys, PublicKey, Tag, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("gift wrap error: {0}")]
    GiftWrap(#[from] nostr::event::builder::Error),

    #[error("unwrap failed: {0}")]
    Unwrap(String),
}

/// `wrap` produces one envelope per receiver plus a self-envelope for the
/// sender; `unwrap` recovers the inner rumor event or fails.
#[async_trait]
pub trait SealedDmOracle: Send + Sync {
    async fn wrap(
        &self,
        sender_sk_hex: &str,
        content: &str,
        timestamp: u64,
        receivers: &HashMap<String, Option<String>>,
    ) -> Result<HashMap<String, Event>, Error>;

    async fn unwrap(&self, recipient_sk_hex: &str, envelope: &Event) -> Result<UnsignedEvent, Error>;
}

fn keys_from_hex(sk_hex: &str) -> Result<Keys, Error> {
    Keys::parse(sk_hex).map_err(|_| Error::InvalidSecretKey)
}

/// NIP-59 gift-wrap based oracle, the default implementation.
pub struct GiftWrapOracle;

#[async_trait]
impl SealedDmOracle for GiftWrapOracle {
    async fn wrap(
        &self,
        sender_sk_hex: &str,
        content: &str,
        timestamp: u64,
        receivers: &HashMap<String, Option<String>>,
    ) -> Result<HashMap<String, Event>, Error> {
        let sender = keys_from_hex(sender_sk_hex)?;
        let created_at = Timestamp::from(timestamp);

        // Every receiver's pubkey goes on the rumor itself, not just on the
        // outer seal: that's what ingestion reads back out as `to_pubkey`.
        let receiver_p_tags: Vec<Tag> = receivers
            .keys()
            .map(|pk_hex| PublicKey::parse(pk_hex).map_err(|_| Error::InvalidSecretKey))
            .map(|r| r.map(Tag::public_key))
            .collect::<Result<_, _>>()?;

        let mut envelopes = HashMap::with_capacity(receivers.len() + 1);

        for (pk_hex, hint_relay) in receivers {
            let receiver = PublicKey::parse(pk_hex).map_err(|_| Error::InvalidSecretKey)?;
            let mut seal_tags = vec![Tag::public_key(receiver)];
            if let Some(hint) = hint_relay {
                seal_tags.push(Tag::custom(
                    nostr::TagKind::custom("relay"),
                    [hint.clone()],
                ));
            }

            let rumor = EventBuilder::text_note(content)
                .tags(receiver_p_tags.clone())
                .custom_created_at(created_at)
                .build(sender.public_key());

            let envelope =
                EventBuilder::gift_wrap(&sender, &receiver, rumor, seal_tags).await?;
            envelopes.insert(pk_hex.clone(), envelope);
        }

        // Self-envelope so the sender's own client sees its own outgoing
        // message when it re-syncs; the rumor keeps the same recipient
        // p-tags so the sender's own ingestion recovers `to_pubkey` too.
        let self_rumor = EventBuilder::text_note(content)
            .tags(receiver_p_tags)
            .custom_created_at(created_at)
            .build(sender.public_key());
        let self_envelope =
            EventBuilder::gift_wrap(&sender, &sender.public_key(), self_rumor, vec![]).await?;
        envelopes.insert("sender".to_string(), self_envelope);

        Ok(envelopes)
    }

    async fn unwrap(&self, recipient_sk_hex: &str, envelope: &Event) -> Result<UnsignedEvent, Error> {
        let recipient = keys_from_hex(recipient_sk_hex)?;
        let unwrapped = nip59::extract_rumor(&recipient, envelope)
            .await
            .map_err(|e| Error::Unwrap(e.to_string()))?;
        Ok(unwrapped.rumor)
    }
}

/// Test double that never succeeds at unwrapping — used where a test
/// exercises the non-DM dispatch paths and doesn't want a real gift-wrap
/// oracle in the loop.
#[cfg(test)]
pub struct NullOracle;

#[cfg(test)]
#[async_trait]
impl SealedDmOracle for NullOracle {
    async fn wrap(
        &self,
        _sender_sk_hex: &str,
        _content: &str,
        _timestamp: u64,
        _receivers: &HashMap<String, Option<String>>,
    ) -> Result<HashMap<String, Event>, Error> {
        Ok(HashMap::new())
    }

    async fn unwrap(&self, _recipient_sk_hex: &str, _envelope: &Event) -> Result<UnsignedEvent, Error> {
        Err(Error::Unwrap("null oracle never unwraps".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::Keys;

    #[tokio::test]
    async fn gift_wrap_round_trips_through_unwrap() {
        let sender = Keys::generate();
        let receiver = Keys::generate();
        let oracle = GiftWrapOracle;

        let mut receivers = HashMap::new();
        receivers.insert(receiver.public_key().to_hex(), None);

        let envelopes = oracle
            .wrap(&sender.secret_key().to_secret_hex(), "hello", 1_700_000_000, &receivers)
            .await
            .unwrap();

        let envelope = envelopes.get(&receiver.public_key().to_hex()).unwrap();
        let rumor = oracle
            .unwrap(&receiver.secret_key().to_secret_hex(), envelope)
            .await
            .unwrap();

        assert_eq!(rumor.content, "hello");
        assert_eq!(rumor.pubkey, sender.public_key());
    }

    #[tokio::test]
    async fn unwrapped_rumor_carries_the_recipient_p_tag() {
        let sender = Keys::generate();
        let receiver = Keys::generate();
        let oracle = GiftWrapOracle;

        let mut receivers = HashMap::new();
        receivers.insert(receiver.public_key().to_hex(), None);

        let envelopes = oracle
            .wrap(&sender.secret_key().to_secret_hex(), "hi", 1_700_000_000, &receivers)
            .await
            .unwrap();
        let envelope = envelopes.get(&receiver.public_key().to_hex()).unwrap();

        let rumor = oracle
            .unwrap(&receiver.secret_key().to_secret_hex(), envelope)
            .await
            .unwrap();

        assert_eq!(rumor.tags.public_keys().next(), Some(&receiver.public_key()));
    }

    #[tokio::test]
    async fn unwrap_fails_for_the_wrong_recipient() {
        let sender = Keys::generate();
        let receiver = Keys::generate();
        let eavesdropper = Keys::generate();
        let oracle = GiftWrapOracle;

        let mut receivers = HashMap::new();
        receivers.insert(receiver.public_key().to_hex(), None);

        let envelopes = oracle
            .wrap(&sender.secret_key().to_secret_hex(), "hi", 1_700_000_000, &receivers)
            .await
            .unwrap();
        let envelope = envelopes.get(&receiver.public_key().to_hex()).unwrap();

        let result = oracle
            .unwrap(&eavesdropper.secret_key().to_secret_hex(), envelope)
            .await;
        assert!(result.is_err());
    }
}
