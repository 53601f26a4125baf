use super::{Error, Store};
use crate::model::DMRelay;

impl Store {
    /// Replace-set for a kind-10050 DM relay list: rows named by `urls`
    /// are created/kept, rows not named by it are deleted.
    pub fn replace_dm_relays(&self, pubkey_hex: &str, urls: &[String], now: u64) -> Result<(), Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM dm_relay
             WHERE pubkey_hex = ?1
               AND url NOT IN (SELECT value FROM json_each(?2))",
            rusqlite::params![pubkey_hex, serde_json::to_string(urls).unwrap()],
        )?;

        for url in urls {
            tx.execute(
                "INSERT INTO dm_relay (pubkey_hex, url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(pubkey_hex, url) DO UPDATE SET updated_at = excluded.updated_at",
                rusqlite::params![pubkey_hex, url, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn list_dm_relays(&self, pubkey_hex: &str) -> Result<Vec<DMRelay>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pubkey_hex, url, created_at, updated_at FROM dm_relay WHERE pubkey_hex = ?1",
        )?;
        let rows = stmt.query_map([pubkey_hex], |row| {
            Ok(DMRelay {
                pubkey_hex: row.get(0)?,
                url: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_set_drops_urls_no_longer_named() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_dm_relays("p", &["wss://a".into(), "wss://b".into()], 100)
            .unwrap();
        store
            .replace_dm_relays("p", &["wss://b".into(), "wss://c".into()], 200)
            .unwrap();

        let mut urls: Vec<_> = store
            .list_dm_relays("p")
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        urls.sort();
        assert_eq!(urls, vec!["wss://b".to_string(), "wss://c".to_string()]);
    }
}
