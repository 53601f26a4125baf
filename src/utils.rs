use nostr::{key::PublicKey, nips::nip05::Nip05Address};

/// Checks a NIP-05 identifier against the `.well-known/nostr.json` document
/// it points at. Used when rendering a profile, never during ingestion.
pub async fn verify_nip05(nip05: &str, main_key: &PublicKey) -> bool {
    let address = match Nip05Address::parse(nip05) {
        Ok(address) => address,
        Err(_) => return false,
    };

    let url = address.url();
    let req = match reqwest::get(url.to_string()).await {
        Ok(req) => req,
        Err(_) => return false,
    };
    let doc: serde_json::Value = match req.json().await {
        Ok(doc) => doc,
        Err(_) => return false,
    };

    nostr::nips::nip05::verify_from_json(main_key, &address, &doc)
}
