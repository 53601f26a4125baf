use super::{Error, Store};

impl Store {
    /// True once the singleton `login` row exists.
    pub fn has_login(&self) -> Result<bool, Error> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM login", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Seed the singleton login row on first run.
    pub fn seed_login(&self, password_hash: &str) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM login", [])?;
        conn.execute(
            "INSERT INTO login (password_hash) VALUES (?1)",
            [password_hash],
        )?;
        Ok(())
    }

    pub fn login_password_hash(&self) -> Result<Option<String>, Error> {
        let conn = self.conn()?;
        conn.query_row("SELECT password_hash FROM login LIMIT 1", [], |row| {
            row.get(0)
        })
        .map(Some)
        .or_else(|e| {
            if e == rusqlite::Error::QueryReturnedNoRows {
                Ok(None)
            } else {
                Err(e.into())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_seeds_then_reports_login_present() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.has_login().unwrap());

        let hash = crate::credential::create_password_hash("hunter2");
        store.seed_login(&hash).unwrap();

        assert!(store.has_login().unwrap());
        assert_eq!(store.login_password_hash().unwrap().unwrap(), hash);
    }
}
