//! LNURL-pay resolution, zap-request construction, invoice fetch. A
//! two-hop HTTP flow — the lnurlp well-known doc, then the callback —
//! using the shared `reqwest::Client` from [`crate::context::AppContext`].

use nostr::{EventBuilder, Keys, Kind, Tag};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid lud16 address: {0}")]
    InvalidLud16(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lnurl endpoint does not accept zaps")]
    ZapsNotSupported,

    #[error("amount {amount_msats} msats is outside [{min}, {max}]")]
    AmountOutOfRange { amount_msats: u64, min: u64, max: u64 },

    #[error("event builder error: {0}")]
    Builder(#[from] nostr::event::builder::Error),

    #[error("callback response missing a bolt11 invoice")]
    MissingInvoice,
}

#[derive(Debug, Deserialize)]
struct LnurlPayResponse {
    callback: String,
    #[serde(rename = "minSendable")]
    min_sendable: u64,
    #[serde(rename = "maxSendable")]
    max_sendable: u64,
    #[serde(rename = "allowsNostr", default)]
    allows_nostr: bool,
    #[serde(rename = "nostrPubkey", default)]
    #[allow(dead_code)]
    nostr_pubkey: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LnurlCallbackResponse {
    pr: String,
}

fn split_lud16(lud16: &str) -> Result<(&str, &str), Error> {
    lud16
        .split_once('@')
        .ok_or_else(|| Error::InvalidLud16(lud16.to_string()))
}

/// Fetches the BOLT-11 invoice for a zap of `amount_sats` to `recipient`,
/// signing the kind-9734 zap request with `keys`. No local state is
/// mutated on any failure.
pub async fn request_zap_invoice(
    http: &reqwest::Client,
    keys: &Keys,
    recipient: nostr::PublicKey,
    lud16: &str,
    amount_sats: u64,
    known_relays: &[String],
    comment: &str,
) -> Result<String, Error> {
    let (user, domain) = split_lud16(lud16)?;
    let lnurl_endpoint = format!("https://{domain}/.well-known/lnurlp/{user}");

    let lnurlp: LnurlPayResponse = http.get(&lnurl_endpoint).send().await?.json().await?;

    if !lnurlp.allows_nostr {
        return Err(Error::ZapsNotSupported);
    }

    let amount_msats = amount_sats * 1000;
    if amount_msats < lnurlp.min_sendable || amount_msats > lnurlp.max_sendable {
        return Err(Error::AmountOutOfRange {
            amount_msats,
            min: lnurlp.min_sendable,
            max: lnurlp.max_sendable,
        });
    }

    let tags = vec![
        Tag::public_key(recipient),
        Tag::custom(nostr::TagKind::custom("amount"), [amount_msats.to_string()]),
        Tag::custom(nostr::TagKind::custom("relays"), known_relays.iter().cloned()),
    ];

    let zap_request = EventBuilder::new(Kind::Custom(9734), comment)
        .tags(tags)
        .sign_with_keys(keys)?;

    let mut callback_url = reqwest::Url::parse(&lnurlp.callback)
        .map_err(|_| Error::InvalidLud16(lnurlp.callback.clone()))?;
    {
        let mut query = callback_url.query_pairs_mut();
        query.append_pair("amount", &amount_msats.to_string());
        query.append_pair("nostr", &serde_json::to_string(&zap_request).unwrap_or_default());
        if !comment.is_empty() {
            query.append_pair("comment", comment);
        }
    }

    let callback: LnurlCallbackResponse = http.get(callback_url).send().await?.json().await?;
    if callback.pr.is_empty() {
        return Err(Error::MissingInvoice);
    }
    Ok(callback.pr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lud16_rejects_addresses_without_an_at_sign() {
        assert!(split_lud16("not-an-address").is_err());
    }

    #[test]
    fn split_lud16_splits_user_and_domain() {
        let (user, domain) = split_lud16("alice@example.com").unwrap();
        assert_eq!(user, "alice");
        assert_eq!(domain, "example.com");
    }
}
