use super::{Error, Store};
use crate::model::Metadata;

impl Store {
    /// Create a placeholder row (zero timestamps) if `pubkey_hex` is not
    /// already known. Used when a kind-3/kind-10050 event references a
    /// pubkey we've never seen metadata for.
    pub fn ensure_metadata_placeholder(&self, pubkey_hex: &str) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO metadata (pubkey_hex, metadata_updated_at, contacts_updated_at)
             VALUES (?1, 0, 0)",
            [pubkey_hex],
        )?;
        Ok(())
    }

    /// Upsert-if-newer on `metadata_updated_at`. Returns whether the write
    /// was applied (`false` means an older/equal event was silently
    /// skipped).
    pub fn upsert_metadata_if_newer(&self, m: &Metadata) -> Result<bool, Error> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT INTO metadata (
                pubkey_hex, bech32, name, display_name, about, nip05, website,
                lud06, lud16, picture, total_follows, metadata_updated_at,
                contacts_updated_at, raw_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)
             ON CONFLICT(pubkey_hex) DO UPDATE SET
                bech32 = excluded.bech32,
                name = excluded.name,
                display_name = excluded.display_name,
                about = excluded.about,
                nip05 = excluded.nip05,
                website = excluded.website,
                lud06 = excluded.lud06,
                lud16 = excluded.lud16,
                picture = excluded.picture,
                metadata_updated_at = excluded.metadata_updated_at,
                raw_json = excluded.raw_json
             WHERE excluded.metadata_updated_at > metadata.metadata_updated_at",
            rusqlite::params![
                m.pubkey_hex,
                m.bech32,
                m.name,
                m.display_name,
                m.about,
                m.nip05,
                m.website,
                m.lud06,
                m.lud16,
                m.picture,
                m.total_follows,
                m.metadata_updated_at,
                m.raw_json,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Upsert-if-newer on `contacts_updated_at`, then diff `follows` against
    /// the stored join table: remove absent, add new. Returns whether the
    /// contact list was applied.
    pub fn upsert_contacts_if_newer(
        &self,
        pubkey_hex: &str,
        follows: &[String],
        contacts_updated_at: u64,
    ) -> Result<bool, Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current: Option<u64> = tx
            .query_row(
                "SELECT contacts_updated_at FROM metadata WHERE pubkey_hex = ?1",
                [pubkey_hex],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| {
                if e == rusqlite::Error::QueryReturnedNoRows {
                    Ok(None)
                } else {
                    Err(e)
                }
            })?;

        if let Some(current) = current {
            if contacts_updated_at <= current {
                tx.rollback()?;
                return Ok(false);
            }
            tx.execute(
                "UPDATE metadata SET contacts_updated_at = ?2, total_follows = ?3
                 WHERE pubkey_hex = ?1",
                rusqlite::params![pubkey_hex, contacts_updated_at, follows.len() as i64],
            )?;
        } else {
            tx.execute(
                "INSERT INTO metadata
                    (pubkey_hex, metadata_updated_at, contacts_updated_at, total_follows)
                 VALUES (?1, 0, ?2, ?3)",
                rusqlite::params![pubkey_hex, contacts_updated_at, follows.len() as i64],
            )?;
        }

        tx.execute(
            "DELETE FROM metadata_follows
             WHERE metadata_pubkey_hex = ?1
               AND follow_pubkey_hex NOT IN (SELECT value FROM json_each(?2))",
            rusqlite::params![pubkey_hex, serde_json::to_string(follows).unwrap()],
        )?;

        for follow in follows {
            tx.execute(
                "INSERT OR IGNORE INTO metadata_follows (metadata_pubkey_hex, follow_pubkey_hex)
                 VALUES (?1, ?2)",
                rusqlite::params![pubkey_hex, follow],
            )?;
            tx.execute(
                "INSERT INTO metadata (pubkey_hex, metadata_updated_at, contacts_updated_at)
                 VALUES (?1, 0, 0) ON CONFLICT(pubkey_hex) DO NOTHING",
                [follow],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    pub fn get_metadata(&self, pubkey_hex: &str) -> Result<Option<Metadata>, Error> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT pubkey_hex, bech32, name, display_name, about, nip05, website,
                        lud06, lud16, picture, total_follows, metadata_updated_at,
                        contacts_updated_at, raw_json
                 FROM metadata WHERE pubkey_hex = ?1",
                [pubkey_hex],
                row_to_metadata,
            )
            .map(Some)
            .or_else(|e| {
                if e == rusqlite::Error::QueryReturnedNoRows {
                    Ok(None)
                } else {
                    Err(e)
                }
            })?;

        let Some(mut m) = row else { return Ok(None) };
        m.follows = self.list_follows(pubkey_hex)?;
        m.dm_relays = self.list_dm_relays(pubkey_hex)?;
        Ok(Some(m))
    }

    pub fn list_follows(&self, pubkey_hex: &str) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT follow_pubkey_hex FROM metadata_follows WHERE metadata_pubkey_hex = ?1",
        )?;
        let rows = stmt.query_map([pubkey_hex], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }
}

fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<Metadata> {
    Ok(Metadata {
        pubkey_hex: row.get(0)?,
        bech32: row.get(1)?,
        name: row.get(2)?,
        display_name: row.get(3)?,
        about: row.get(4)?,
        nip05: row.get(5)?,
        website: row.get(6)?,
        lud06: row.get(7)?,
        lud16: row.get(8)?,
        picture: row.get(9)?,
        total_follows: row.get(10)?,
        metadata_updated_at: row.get(11)?,
        contacts_updated_at: row.get(12)?,
        raw_json: row.get(13)?,
        follows: Vec::new(),
        dm_relays: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_at(pubkey: &str, name: &str, at: u64) -> Metadata {
        Metadata {
            pubkey_hex: pubkey.to_string(),
            name: name.to_string(),
            metadata_updated_at: at,
            ..Default::default()
        }
    }

    #[test]
    fn out_of_order_metadata_keeps_the_strictly_newer_event() {
        let store = Store::open_in_memory().unwrap();
        assert!(store
            .upsert_metadata_if_newer(&metadata_at("pk", "late", 200))
            .unwrap());
        assert!(!store
            .upsert_metadata_if_newer(&metadata_at("pk", "early", 100))
            .unwrap());

        let m = store.get_metadata("pk").unwrap().unwrap();
        assert_eq!(m.name, "late");
        assert_eq!(m.metadata_updated_at, 200);
    }

    #[test]
    fn equal_timestamp_is_not_strictly_newer_and_is_skipped() {
        let store = Store::open_in_memory().unwrap();
        assert!(store
            .upsert_metadata_if_newer(&metadata_at("pk", "first", 100))
            .unwrap());
        assert!(!store
            .upsert_metadata_if_newer(&metadata_at("pk", "second", 100))
            .unwrap());
        assert_eq!(store.get_metadata("pk").unwrap().unwrap().name, "first");
    }

    #[test]
    fn contacts_converge_to_the_newest_follow_set() {
        let store = Store::open_in_memory().unwrap();

        store
            .upsert_contacts_if_newer("p", &["a".into(), "b".into(), "c".into()], 100)
            .unwrap();
        store
            .upsert_contacts_if_newer("p", &["a".into()], 50)
            .unwrap();
        store
            .upsert_contacts_if_newer("p", &["a".into(), "d".into()], 200)
            .unwrap();

        let m = store.get_metadata("p").unwrap().unwrap();
        let mut follows = m.follows.clone();
        follows.sort();
        assert_eq!(follows, vec!["a".to_string(), "d".to_string()]);
        assert_eq!(m.total_follows, 2);
        assert_eq!(m.contacts_updated_at, 200);
    }

    #[test]
    fn unknown_followees_get_a_placeholder_row() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_contacts_if_newer("p", &["unknown".into()], 10)
            .unwrap();
        let placeholder = store.get_metadata("unknown").unwrap().unwrap();
        assert_eq!(placeholder.metadata_updated_at, 0);
        assert_eq!(placeholder.contacts_updated_at, 0);
    }
}
