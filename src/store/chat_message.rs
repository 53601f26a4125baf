use super::{Error, Store};
use crate::model::ChatMessage;

impl Store {
    /// Insert-unique keyed by `event_id`: duplicate envelopes are silently
    /// dropped. Returns whether a row was inserted.
    pub fn insert_chat_message_if_new(
        &self,
        event_id: &str,
        from_pubkey: &str,
        to_pubkey: &str,
        content: &str,
        timestamp: u64,
    ) -> Result<bool, Error> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO chat_message (event_id, from_pubkey, to_pubkey, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![event_id, from_pubkey, to_pubkey, content, timestamp],
        )?;
        Ok(changed > 0)
    }

    pub fn chat_messages_to(&self, to_pubkey: &str) -> Result<Vec<ChatMessage>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, event_id, from_pubkey, to_pubkey, content, timestamp
             FROM chat_message WHERE to_pubkey = ?1",
        )?;
        let rows = stmt.query_map([to_pubkey], row_to_chat_message)?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }

    /// Distinct senders who have ever DMed `to_pubkey` — folded into the
    /// hop-1 follow set when planning subscriptions.
    pub fn dm_conversation_partners(&self, to_pubkey: &str) -> Result<Vec<String>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT from_pubkey FROM chat_message WHERE to_pubkey = ?1",
        )?;
        let rows = stmt.query_map([to_pubkey], |row| row.get(0))?;
        rows.collect::<Result<_, _>>().map_err(Error::from)
    }
}

fn row_to_chat_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        event_id: row.get(1)?,
        from_pubkey: row.get(2)?,
        to_pubkey: row.get(3)?,
        content: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_envelopes_leave_exactly_one_row() {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..3 {
            store
                .insert_chat_message_if_new("X", "alice", "bob", "hi", 1000)
                .unwrap();
        }
        assert_eq!(store.chat_messages_to("bob").unwrap().len(), 1);
    }

    #[test]
    fn dm_conversation_partners_is_distinct() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_chat_message_if_new("X1", "alice", "bob", "hi", 1000)
            .unwrap();
        store
            .insert_chat_message_if_new("X2", "alice", "bob", "hi again", 1001)
            .unwrap();
        store
            .insert_chat_message_if_new("X3", "carol", "bob", "yo", 1002)
            .unwrap();

        let mut partners = store.dm_conversation_partners("bob").unwrap();
        partners.sort();
        assert_eq!(partners, vec!["alice".to_string(), "carol".to_string()]);
    }
}
