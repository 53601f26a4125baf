use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use flightless::context::AppContext;
use flightless::model::Account;
use flightless::nostr::nips::nip19::ToBech32;
use flightless::nostr::{Keys, PublicKey};
use flightless::relay::plan_subscriptions;
use flightless::{config::Config, credential};
use tokio::sync::mpsc;

/// Relays dialed on first run, before any kind-10002/kind-10050 event has
/// taught us the account's own preferences.
const DEFAULT_RELAYS: &[&str] = &["wss://relay.damus.io", "wss://relay.nostr.net"];

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn prompt(label: &str) -> std::io::Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// First-run login seeds the singleton `Login` row; every later run
/// verifies against it. A wrong password here is the only non-fatal-init
/// path that still exits non-zero.
fn login(ctx: &AppContext) -> Result<String, flightless::Error> {
    if !ctx.store.has_login()? {
        let password = prompt("Set a password for this device: ")
            .map_err(|e| flightless::Error::Fatal(e.to_string()))?;
        ctx.store.seed_login(&credential::create_password_hash(&password))?;
        println!("Password set.");
        return Ok(password);
    }

    let password =
        prompt("Password: ").map_err(|e| flightless::Error::Fatal(e.to_string()))?;
    let hash = ctx
        .store
        .login_password_hash()?
        .ok_or_else(|| flightless::Error::Fatal("login row missing after has_login".into()))?;
    if !credential::verify_password(&hash, &password)? {
        return Err(credential::Error::LoginMismatch.into());
    }
    Ok(password)
}

/// Picks the active account, creating one if this is a fresh install.
fn active_account(ctx: &AppContext, password: &str) -> Result<Account, flightless::Error> {
    if let Some(account) = ctx.store.active_account()? {
        return Ok(account);
    }

    let accounts = ctx.store.list_accounts()?;
    if let Some(first) = accounts.into_iter().next() {
        ctx.store.set_active_account(&first.pubkey_hex)?;
        return Ok(first);
    }

    let keys = Keys::generate();
    let pubkey_hex = keys.public_key().to_hex();
    let pubkey_bech32 = keys.public_key().to_bech32().unwrap_or_default();
    let encrypted_seckey = credential::encrypt(password, &keys.secret_key().to_secret_hex());

    let account = Account {
        pubkey_hex: pubkey_hex.clone(),
        pubkey_bech32,
        encrypted_seckey,
        active: true,
    };
    ctx.store.upsert_account(&account)?;
    ctx.store.set_active_account(&pubkey_hex)?;
    println!("Created new account {}", account.pubkey_bech32);
    Ok(account)
}

/// The account's hop-1 author set: follows plus anyone who has DMed it.
fn hop1_authors(ctx: &AppContext, pubkey_hex: &str) -> Vec<PublicKey> {
    let follows = ctx.store.list_follows(pubkey_hex).unwrap_or_default();
    let partners = ctx
        .store
        .dm_conversation_partners(pubkey_hex)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    follows
        .into_iter()
        .chain(partners)
        .filter_map(|hex| PublicKey::parse(&hex).ok())
        .filter(|pk| seen.insert(*pk))
        .collect()
}

#[tokio::main]
async fn main() {
    env_logger::init();
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let ctx = match AppContext::new(Config::from_env()) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("failed to open store: {e}");
            return 1;
        }
    };

    let password = match login(&ctx) {
        Ok(p) => p,
        Err(e) => {
            log::error!("login failed: {e}");
            return e.exit_code();
        }
    };

    let account = match active_account(&ctx, &password) {
        Ok(a) => a,
        Err(e) => {
            log::error!("failed to resolve active account: {e}");
            return e.exit_code();
        }
    };

    let seckey_hex = match credential::decrypt(&password, &account.encrypted_seckey) {
        Ok(sk) => sk,
        Err(e) => {
            log::error!(
                "account {} has an undecryptable secret key: {e}",
                account.pubkey_bech32
            );
            return 1;
        }
    };
    let keys = match Keys::parse(&seckey_hex) {
        Ok(k) => k,
        Err(e) => {
            log::error!("decrypted secret key is invalid: {e}");
            return 1;
        }
    };
    ctx.supervisor.set_active_keys(Some(keys.clone())).await;

    let relays: Vec<String> = {
        let from_list: Vec<String> = ctx
            .store
            .list_relay_list(&account.pubkey_hex)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.url)
            .collect();
        if from_list.is_empty() {
            DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect()
        } else {
            from_list
        }
    };
    for url in &relays {
        if ctx.store.get_relay_status(url).unwrap_or(None).is_none() {
            let _ = ctx.store.upsert_relay_status(url, "waiting", now());
        }
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let supervisor = Arc::clone(&ctx.supervisor);
    let supervisor_task = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    let subscriber_ctx = Arc::new(ctx);
    let subscriber_account = account.clone();
    let subscriber_task = tokio::spawn({
        let ctx = Arc::clone(&subscriber_ctx);
        async move { subscription_loop(ctx, subscriber_account).await }
    });

    if tokio::signal::ctrl_c().await.is_err() {
        log::warn!("failed to listen for ctrl-c, shutting down anyway");
    }
    subscriber_task.abort();
    let _ = shutdown_tx.send(()).await;
    let _ = supervisor_task.await;
    0
}

/// Polls the known relay set and (re)issues the hop-1/hop-2 subscription
/// bundle on every relay once it reports a connected status, refreshing the
/// resume horizon from that relay's own `RelayStatus` row each pass.
async fn subscription_loop(ctx: Arc<AppContext>, account: Account) {
    let Ok(account_pubkey) = PublicKey::parse(&account.pubkey_hex) else {
        log::error!("active account pubkey is not valid hex");
        return;
    };

    let mut interval = tokio::time::interval(ctx.http_timeout().max(std::time::Duration::from_secs(5)));
    loop {
        interval.tick().await;

        let h1 = hop1_authors(&ctx, &account.pubkey_hex);
        let statuses = ctx.store.list_relay_status().unwrap_or_default();

        for status in statuses {
            let connected = matches!(
                status.kind(),
                Some(flightless::model::RelayStatusKind::Established)
                    | Some(flightless::model::RelayStatusKind::EstablishedEose)
            );
            if !connected {
                continue;
            }

            let plans = plan_subscriptions(
                account_pubkey,
                &h1,
                status.last_eose,
                status.last_disco,
                now(),
            );
            for plan in &plans {
                if let Err(e) = ctx.supervisor.subscribe(&status.url, plan).await {
                    log::warn!("subscribe {} on {} failed: {e}", plan.id, status.url);
                }
            }
        }
    }
}
