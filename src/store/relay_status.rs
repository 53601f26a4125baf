use super::{Error, Store};
use crate::model::RelayStatus;

impl Store {
    /// `last_eose` updates on EOSE, `last_disco` updates on any
    /// `connection error:*` transition, otherwise only `status` changes.
    pub fn upsert_relay_status(&self, url: &str, status: &str, now: u64) -> Result<(), Error> {
        let conn = self.conn()?;
        let (set_eose, set_disco) = if status == "connection established: EOSE" {
            (true, false)
        } else if status.starts_with("connection error") {
            (false, true)
        } else {
            (false, false)
        };

        conn.execute(
            "INSERT INTO relay_status (url, status, last_eose, last_disco, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                status = excluded.status,
                last_eose = CASE WHEN ?6 THEN excluded.last_eose ELSE relay_status.last_eose END,
                last_disco = CASE WHEN ?7 THEN excluded.last_disco ELSE relay_status.last_disco END,
                updated_at = excluded.updated_at",
            rusqlite::params![
                url,
                status,
                if set_eose { now } else { 0 },
                if set_disco { now } else { 0 },
                now,
                set_eose,
                set_disco,
            ],
        )?;
        Ok(())
    }

    pub fn get_relay_status(&self, url: &str) -> Result<Option<RelayStatus>, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT url, status, last_eose, last_disco, updated_at
             FROM relay_status WHERE url = ?1",
            [url],
            row_to_relay_status,
        )
        .map(Some)
        .or_else(|e| {
            if e == rusqlite::Error::QueryReturnedNoRows {
                Ok(None)
            } else {
                Err(e.into())
            }
        })
    }

    pub fn list_relay_status(&self) -> Result<Vec<RelayStatus>, Error> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT url, status, last_eose, last_disco, updated_at FROM relay_status")?;
        let rows = stmt.query_map([], row_to_relay_status)?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }

    pub fn list_relay_status_with(&self, status: &str) -> Result<Vec<RelayStatus>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, status, last_eose, last_disco, updated_at
             FROM relay_status WHERE status = ?1",
        )?;
        let rows = stmt.query_map([status], row_to_relay_status)?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }

    pub fn delete_relay_status(&self, url: &str) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM relay_status WHERE url = ?1", [url])?;
        Ok(())
    }
}

fn row_to_relay_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelayStatus> {
    Ok(RelayStatus {
        url: row.get(0)?,
        status: row.get(1)?,
        last_eose: row.get(2)?,
        last_disco: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eose_updates_last_eose_only() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_relay_status("wss://r", "waiting", 1).unwrap();
        store
            .upsert_relay_status("wss://r", "connection established: EOSE", 100)
            .unwrap();

        let rs = store.get_relay_status("wss://r").unwrap().unwrap();
        assert_eq!(rs.status, "connection established: EOSE");
        assert_eq!(rs.last_eose, 100);
        assert_eq!(rs.last_disco, 0);
    }

    #[test]
    fn connection_error_updates_last_disco_only() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_relay_status("wss://r", "connection established: EOSE", 50)
            .unwrap();
        store
            .upsert_relay_status("wss://r", "connection error: reset by peer", 100)
            .unwrap();

        let rs = store.get_relay_status("wss://r").unwrap().unwrap();
        assert_eq!(rs.last_eose, 50);
        assert_eq!(rs.last_disco, 100);
    }

    #[test]
    fn relay_lifecycle_waiting_then_established_then_deleted() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_relay_status("wss://r", "waiting", 1).unwrap();
        assert_eq!(
            store.get_relay_status("wss://r").unwrap().unwrap().status,
            "waiting"
        );

        store
            .upsert_relay_status("wss://r", "connection established", 2)
            .unwrap();
        store.upsert_relay_status("wss://r", "deleting", 3).unwrap();
        store.delete_relay_status("wss://r").unwrap();
        assert!(store.get_relay_status("wss://r").unwrap().is_none());
    }
}
