//! Explicit, injected application context. `Store` and the `Supervisor` are
//! created once at startup and handed out by reference; nothing in this
//! crate reaches for a process-global handle.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::relay::Supervisor;
use crate::sealed_dm::{GiftWrapOracle, SealedDmOracle};
use crate::store::Store;

pub struct AppContext {
    pub store: Store,
    pub http: reqwest::Client,
    pub supervisor: Arc<Supervisor>,
    pub oracle: Arc<dyn SealedDmOracle>,
    pub config: Config,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self, crate::store::Error> {
        let store = Store::open(&config.db_dsn)?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_default();
        let oracle: Arc<dyn SealedDmOracle> = Arc::new(GiftWrapOracle);
        let supervisor = Supervisor::new(
            store.clone(),
            http.clone(),
            Arc::clone(&oracle),
            config.reconcile_interval,
        );

        Ok(Self {
            store,
            http,
            supervisor,
            oracle,
            config,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        self.config.http_timeout
    }
}
