//! A thin typed façade over an embedded SQLite file, keyed by the `DB`
//! DSN. Every write is idempotent with respect to replayed events —
//! conflict resolution is timestamp comparison carried on the event,
//! enforced by SQL `ON CONFLICT ... DO UPDATE ... WHERE` guards rather
//! than read-then-write application code, so concurrent ingestion from
//! multiple relays can't race past the newer-wins rule.

mod account;
mod chat_message;
mod dm_relay;
mod login;
mod metadata;
mod relay_list;
mod relay_status;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("more than one account requested as active")]
    MultipleActiveAccounts,

    #[error("no active account")]
    NoActiveAccount,
}

/// Shared handle to the embedded store. Cheap to clone (the pool is
/// reference counted internally); injected explicitly wherever it's
/// needed rather than reached for as a process-global handle.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    pub fn open(dsn: &str) -> Result<Self, Error> {
        let manager = SqliteConnectionManager::file(dsn).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
        });
        let pool = Pool::new(manager)?;
        let store = Self { pool };
        store.run_migrations()?;
        Ok(store)
    }

    /// An isolated in-memory store, for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, Error> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, Error> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<(), Error> {
        let conn: r2d2::PooledConnection<SqliteConnectionManager> = self.conn()?;
        run_migrations(&conn)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS login (
            password_hash TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS account (
            pubkey_hex       TEXT PRIMARY KEY,
            pubkey_bech32    TEXT NOT NULL,
            encrypted_seckey TEXT NOT NULL,
            active           INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS metadata (
            pubkey_hex          TEXT PRIMARY KEY,
            bech32              TEXT NOT NULL DEFAULT '',
            name                TEXT NOT NULL DEFAULT '',
            display_name        TEXT NOT NULL DEFAULT '',
            about               TEXT NOT NULL DEFAULT '',
            nip05               TEXT NOT NULL DEFAULT '',
            website             TEXT NOT NULL DEFAULT '',
            lud06               TEXT NOT NULL DEFAULT '',
            lud16               TEXT NOT NULL DEFAULT '',
            picture             TEXT NOT NULL DEFAULT '',
            total_follows       INTEGER NOT NULL DEFAULT 0,
            metadata_updated_at INTEGER NOT NULL DEFAULT 0,
            contacts_updated_at INTEGER NOT NULL DEFAULT 0,
            raw_json            TEXT
        );

        CREATE TABLE IF NOT EXISTS metadata_follows (
            metadata_pubkey_hex TEXT NOT NULL,
            follow_pubkey_hex   TEXT NOT NULL,
            PRIMARY KEY (metadata_pubkey_hex, follow_pubkey_hex)
        );

        CREATE TABLE IF NOT EXISTS dm_relay (
            pubkey_hex TEXT NOT NULL,
            url        TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (pubkey_hex, url)
        );

        CREATE TABLE IF NOT EXISTS relay_list (
            pubkey_hex TEXT NOT NULL,
            url        TEXT NOT NULL,
            read       INTEGER NOT NULL,
            write      INTEGER NOT NULL,
            PRIMARY KEY (pubkey_hex, url)
        );

        CREATE TABLE IF NOT EXISTS relay_status (
            url        TEXT PRIMARY KEY,
            status     TEXT NOT NULL,
            last_eose  INTEGER NOT NULL DEFAULT 0,
            last_disco INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS chat_message (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id    TEXT NOT NULL UNIQUE,
            from_pubkey TEXT NOT NULL,
            to_pubkey   TEXT NOT NULL,
            content     TEXT NOT NULL,
            timestamp   INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_and_migrates_an_in_memory_store_idempotently() {
        let store = Store::open_in_memory().unwrap();
        // Running migrations twice must not fail (CREATE TABLE IF NOT EXISTS).
        store.run_migrations().unwrap();
    }
}
