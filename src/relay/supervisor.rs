use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nostr::{Event, Keys};
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};

use super::client::{RelayClient, RelayEvent};
use super::planner::SubscriptionPlan;
use super::Error;
use crate::model::RelayStatusKind;
use crate::sealed_dm::SealedDmOracle;
use crate::store::Store;

/// `limitation.auth_required` from a relay's NIP-11 document, fetched with
/// an `Accept: application/nostr+json` GET on the url rewritten from
/// `ws[s]://` to `http[s]://`.
#[derive(Debug, Deserialize, Default)]
struct RelayInfoDocument {
    #[serde(default)]
    limitation: RelayLimitation,
}

#[derive(Debug, Deserialize, Default)]
struct RelayLimitation {
    #[serde(default)]
    auth_required: bool,
}

fn http_url_for_info_document(relay_url: &str) -> String {
    if let Some(rest) = relay_url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = relay_url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        relay_url.to_string()
    }
}

async fn relay_requires_auth(http: &reqwest::Client, relay_url: &str) -> bool {
    let url = http_url_for_info_document(relay_url);
    let request = http
        .get(url)
        .header("Accept", "application/nostr+json")
        .build();
    let Ok(request) = request else { return false };

    match http.execute(request).await {
        Ok(resp) => resp
            .json::<RelayInfoDocument>()
            .await
            .map(|doc| doc.limitation.auth_required)
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Owns the `HashMap<url, Arc<RelayClient>>` exclusively after startup: the
/// reconciler dials `waiting` rows, tears down `deleting` rows, and every
/// other component reaches the live set only through `&Supervisor`'s async
/// methods (`publish`, `subscribe`, `client_for`) — never the map itself.
pub struct Supervisor {
    store: Store,
    http: reqwest::Client,
    oracle: Arc<dyn SealedDmOracle>,
    active_keys: Arc<Mutex<Option<Keys>>>,
    clients: Mutex<HashMap<String, Arc<RelayClient>>>,
    reconcile_interval: Duration,
}

impl Supervisor {
    pub fn new(
        store: Store,
        http: reqwest::Client,
        oracle: Arc<dyn SealedDmOracle>,
        reconcile_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            http,
            oracle,
            active_keys: Arc::new(Mutex::new(None)),
            clients: Mutex::new(HashMap::new()),
            reconcile_interval,
        })
    }

    /// Sets the unlocked account's keys, or `None` on logout/lock. Gates
    /// both NIP-42 auth attempts and sealed-DM unwrap for freshly-received
    /// kind-1059 envelopes.
    pub async fn set_active_keys(&self, keys: Option<Keys>) {
        *self.active_keys.lock().await = keys;
    }

    /// Runs the ~1 Hz reconciler until `shutdown` fires, then performs the
    /// graceful-shutdown sequence: disconnect every client and write
    /// `connection error: app exit` for each.
    pub async fn run(self: Arc<Self>, mut shutdown: mpsc::Receiver<()>) -> Result<(), Error> {
        let mut ticker = tokio::time::interval(self.reconcile_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile().await {
                        log::warn!("reconcile error: {e}");
                    }
                }
                _ = shutdown.recv() => {
                    self.shutdown_all().await;
                    return Ok(());
                }
            }
        }
    }

    async fn reconcile(&self) -> Result<(), Error> {
        for row in self.store.list_relay_status()? {
            match row.kind() {
                Some(RelayStatusKind::Waiting) => self.try_connect(&row.url).await,
                Some(RelayStatusKind::Deleting) => self.tear_down(&row.url).await,
                _ => {}
            }
        }
        Ok(())
    }

    async fn try_connect(&self, url: &str) {
        let requires_auth = relay_requires_auth(&self.http, url).await;
        let active_keys = self.active_keys.lock().await.clone();
        let keys = if requires_auth { active_keys } else { None };

        match RelayClient::connect(url, keys).await {
            Ok(client) => {
                self.clients.lock().await.insert(url.to_string(), Arc::clone(&client));
                self.spawn_reader(client);
                let _ = self.store.upsert_relay_status(url, "connection established", now());
            }
            Err(e) => {
                log::warn!("failed initial connection to {url}: {e}");
                let _ = self.store.upsert_relay_status(url, "failed initial connection", now());
            }
        }
    }

    fn spawn_reader(&self, client: Arc<RelayClient>) {
        let store = self.store.clone();
        let oracle = Arc::clone(&self.oracle);
        let active_keys = Arc::clone(&self.active_keys);
        tokio::spawn(async move {
            loop {
                match client.recv().await {
                    Ok(RelayEvent::Eose) => {
                        let _ = store.upsert_relay_status(
                            client.url(),
                            "connection established: EOSE",
                            now(),
                        );
                    }
                    Ok(RelayEvent::Disconnected) => {
                        let _ = store.upsert_relay_status(
                            client.url(),
                            "connection error: socket closed",
                            now(),
                        );
                        return;
                    }
                    Ok(RelayEvent::Event(event)) => {
                        let recipient_sk = active_keys
                            .lock()
                            .await
                            .as_ref()
                            .map(|k| k.secret_key().to_secret_hex());
                        if let Err(e) = crate::ingest::ingest_event(
                            &store,
                            oracle.as_ref(),
                            recipient_sk.as_deref(),
                            &event,
                        )
                        .await
                        {
                            log::warn!("ingest error for event {}: {e}", event.id);
                        }
                    }
                    Ok(RelayEvent::AuthRequired) => {}
                    Err(e) => {
                        let _ = store.upsert_relay_status(
                            client.url(),
                            &format!("connection error: {e}"),
                            now(),
                        );
                        return;
                    }
                }
            }
        });
    }

    async fn tear_down(&self, url: &str) {
        if let Some(client) = self.clients.lock().await.remove(url) {
            client.disconnect().await;
        }
        let _ = self.store.delete_relay_status(url);
    }

    async fn shutdown_all(&self) {
        let mut clients = self.clients.lock().await;
        for (url, client) in clients.drain() {
            client.disconnect().await;
            let _ = self.store.upsert_relay_status(&url, "connection error: app exit", now());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    pub async fn publish(&self, urls: &[String], event: &Event) -> Result<(), Error> {
        let clients = self.clients.lock().await;
        for url in urls {
            if let Some(client) = clients.get(url) {
                if let Err(e) = client.send_event(event).await {
                    log::warn!("publish to {url} failed: {e}");
                }
            }
        }
        Ok(())
    }

    pub async fn subscribe(&self, url: &str, plan: &SubscriptionPlan) -> Result<(), Error> {
        let clients = self.clients.lock().await;
        if let Some(client) = clients.get(url) {
            client.subscribe(&plan.id, plan.filter.clone()).await?;
        }
        Ok(())
    }

    pub async fn client_for(&self, url: &str) -> Option<Arc<RelayClient>> {
        self.clients.lock().await.get(url).cloned()
    }
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
