use std::sync::Arc;

use nostr::event::{Event, EventBuilder, Kind, Tag, TagKind};
use nostr::message::{RelayMessage, SubscriptionId};
use nostr::{Filter, Keys};
use nostr_relay_pool::{RelayOptions, RelayPool, RelayPoolNotification, SubscribeOptions};

use super::Error;

/// NIP-42 auth (kind 22242): `relay` + `challenge` tags, signed and sent as
/// a plain event the instant the relay asks for it. Never exposed on a
/// public API beyond connect — the caller only observes connect succeed or
/// fail.
const AUTH_KIND: u16 = 22242;

/// Events surfaced by a `RelayClient`'s read loop to whoever is ingesting.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Event(Box<Event>),
    Eose,
    AuthRequired,
    Disconnected,
}

/// Owns a single relay connection, wrapping a private single-relay
/// `RelayPool`. A supervisor holds one of these per URL.
pub struct RelayClient {
    url: String,
    pool: RelayPool,
    /// `None` when no active account has a usable secret key, or the
    /// relay's NIP-11 document didn't ask for auth. Authentication is
    /// gated on both being true. A client built this way still connects
    /// and subscribes; it just can't answer a challenge.
    keys: Option<Keys>,
}

impl RelayClient {
    pub async fn connect(url: impl Into<String>, keys: Option<Keys>) -> Result<Arc<Self>, Error> {
        let url = url.into();
        let pool = RelayPool::new();
        pool.add_relay(&url, RelayOptions::default())
            .await
            .map_err(|_| Error::InvalidUrl(url.clone()))?;
        pool.connect().await;

        Ok(Arc::new(Self { url, pool, keys }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn disconnect(&self) {
        self.pool.disconnect().await;
    }

    pub async fn subscribe(&self, id: &str, filter: Filter) -> Result<(), Error> {
        self.pool
            .subscribe_with_id(SubscriptionId::new(id), filter, SubscribeOptions::default())
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, id: &str) {
        self.pool.unsubscribe(&SubscriptionId::new(id)).await;
    }

    pub async fn send_event(&self, event: &Event) -> Result<(), Error> {
        self.pool.send_event(event).await?;
        Ok(())
    }

    /// Drains one notification from the underlying pool, replying to
    /// NIP-42 challenges inline and translating everything else into a
    /// [`RelayEvent`] for the caller's read loop.
    pub async fn recv(&self) -> Result<RelayEvent, Error> {
        loop {
            let notification = match self.pool.notifications().recv().await {
                Ok(n) => n,
                Err(_) => return Ok(RelayEvent::Disconnected),
            };

            match notification {
                RelayPoolNotification::Message {
                    message: RelayMessage::Event { event, .. },
                    ..
                } => return Ok(RelayEvent::Event(Box::new(event.into_owned()))),
                RelayPoolNotification::Event { event, .. } => {
                    return Ok(RelayEvent::Event(event))
                }
                RelayPoolNotification::Message {
                    message: RelayMessage::EndOfStoredEvents(_),
                    ..
                } => return Ok(RelayEvent::Eose),
                RelayPoolNotification::Message {
                    message: RelayMessage::Auth { challenge },
                    ..
                } => {
                    if self.keys.is_some() {
                        self.answer_auth_challenge(&challenge).await?;
                    }
                    return Ok(RelayEvent::AuthRequired);
                }
                RelayPoolNotification::Shutdown => return Ok(RelayEvent::Disconnected),
                _ => continue,
            }
        }
    }

    async fn answer_auth_challenge(&self, challenge: &str) -> Result<(), Error> {
        let Some(keys) = &self.keys else {
            return Ok(());
        };
        let event = EventBuilder::new(Kind::from(AUTH_KIND), "")
            .tags(vec![
                Tag::custom(TagKind::custom("relay"), [self.url.clone()]),
                Tag::custom(TagKind::custom("challenge"), [challenge.to_string()]),
            ])
            .sign_with_keys(keys)?;

        self.pool.send_event(&event).await?;
        Ok(())
    }
}
