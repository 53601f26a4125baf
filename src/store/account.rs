use super::{Error, Store};
use crate::model::Account;

impl Store {
    /// Insert or replace an account row. Does not touch `active` on other
    /// rows; use [`Store::set_active_account`] to do that atomically.
    pub fn upsert_account(&self, account: &Account) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO account (pubkey_hex, pubkey_bech32, encrypted_seckey, active)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pubkey_hex) DO UPDATE SET
                pubkey_bech32 = excluded.pubkey_bech32,
                encrypted_seckey = excluded.encrypted_seckey",
            rusqlite::params![
                account.pubkey_hex,
                account.pubkey_bech32,
                account.encrypted_seckey,
                account.active,
            ],
        )?;
        Ok(())
    }

    /// Atomically make `pubkey_hex` the sole active account: at most one
    /// row has `active = true` process-wide.
    pub fn set_active_account(&self, pubkey_hex: &str) -> Result<(), Error> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("UPDATE account SET active = 0", [])?;
        let changed = tx.execute(
            "UPDATE account SET active = 1 WHERE pubkey_hex = ?1",
            [pubkey_hex],
        )?;
        if changed == 0 {
            return Err(Error::NoActiveAccount);
        }
        tx.commit()?;
        Ok(())
    }

    pub fn active_account(&self) -> Result<Option<Account>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pubkey_hex, pubkey_bech32, encrypted_seckey, active
             FROM account WHERE active = 1",
        )?;
        let mut rows = stmt.query_map([], row_to_account)?;
        match rows.next() {
            Some(row) => {
                if rows.next().is_some() {
                    return Err(Error::MultipleActiveAccounts);
                }
                Ok(Some(row?))
            }
            None => Ok(None),
        }
    }

    pub fn get_account(&self, pubkey_hex: &str) -> Result<Option<Account>, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT pubkey_hex, pubkey_bech32, encrypted_seckey, active
             FROM account WHERE pubkey_hex = ?1",
            [pubkey_hex],
            row_to_account,
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

    pub fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pubkey_hex, pubkey_bech32, encrypted_seckey, active FROM account",
        )?;
        let rows = stmt.query_map([], row_to_account)?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }

    pub fn delete_account(&self, pubkey_hex: &str) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM account WHERE pubkey_hex = ?1", [pubkey_hex])?;
        Ok(())
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        pubkey_hex: row.get(0)?,
        pubkey_bech32: row.get(1)?,
        encrypted_seckey: row.get(2)?,
        active: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(pubkey: &str) -> Account {
        Account {
            pubkey_hex: pubkey.to_string(),
            pubkey_bech32: format!("npub_{pubkey}"),
            encrypted_seckey: "cafe".to_string(),
            active: false,
        }
    }

    #[test]
    fn only_one_account_is_active_at_a_time() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_account(&account("aaaa")).unwrap();
        store.upsert_account(&account("bbbb")).unwrap();

        store.set_active_account("aaaa").unwrap();
        assert_eq!(store.active_account().unwrap().unwrap().pubkey_hex, "aaaa");

        store.set_active_account("bbbb").unwrap();
        let active = store.active_account().unwrap().unwrap();
        assert_eq!(active.pubkey_hex, "bbbb");

        let all = store.list_accounts().unwrap();
        assert_eq!(all.iter().filter(|a| a.active).count(), 1);
    }

    #[test]
    fn activating_an_unknown_account_errors() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.set_active_account("nope").is_err());
    }
}
