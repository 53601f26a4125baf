use super::{Error, Store};
use crate::model::RelayListEntry;

impl Store {
    /// Replace-set for a NIP-65 (kind 10002) relay list.
    pub fn replace_relay_list(
        &self,
        pubkey_hex: &str,
        entries: &[RelayListEntry],
    ) -> Result<(), Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        tx.execute(
            "DELETE FROM relay_list
             WHERE pubkey_hex = ?1
               AND url NOT IN (SELECT value FROM json_each(?2))",
            rusqlite::params![pubkey_hex, serde_json::to_string(&urls).unwrap()],
        )?;

        for entry in entries {
            tx.execute(
                "INSERT INTO relay_list (pubkey_hex, url, read, write)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(pubkey_hex, url) DO UPDATE SET
                    read = excluded.read, write = excluded.write",
                rusqlite::params![pubkey_hex, entry.url, entry.read, entry.write],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn list_relay_list(&self, pubkey_hex: &str) -> Result<Vec<RelayListEntry>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pubkey_hex, url, read, write FROM relay_list WHERE pubkey_hex = ?1",
        )?;
        let rows = stmt.query_map([pubkey_hex], |row| {
            Ok(RelayListEntry {
                pubkey_hex: row.get(0)?,
                url: row.get(1)?,
                read: row.get(2)?,
                write: row.get(3)?,
            })
        })?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }
}
