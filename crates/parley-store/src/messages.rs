use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use parley_shared::{ConversationKey, MessageId, Token};

use crate::database::Database;
use crate::error::Result;
use crate::models::{Message, OutgoingMessage};

impl Database {
    /// Commit a new message and assign its id and commit time.
    ///
    /// The commit time is strictly greater than that of every message already
    /// in the conversation, even when the wall clock stalls or steps back.
    pub fn insert_message(
        &self,
        key: &ConversationKey,
        outgoing: &OutgoingMessage,
    ) -> Result<Message> {
        let tx = self.conn().unchecked_transaction()?;

        let last: Option<i64> = tx.query_row(
            "SELECT MAX(created_at) FROM messages WHERE conversation_key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )?;
        let now = Utc::now().timestamp_micros();
        let created_us = match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        };

        let id = MessageId::new();
        tx.execute(
            "INSERT INTO messages (conversation_key, id, text, sender_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.as_str(),
                id.to_string(),
                outgoing.text,
                outgoing.sender_token.as_str(),
                created_us,
            ],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO conversations (key, created_at) VALUES (?1, ?2)",
            params![key.as_str(), Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(Message {
            id,
            text: outgoing.text.clone(),
            sender_token: outgoing.sender_token.clone(),
            created_at: DateTime::<Utc>::from_timestamp_micros(created_us),
        })
    }

    /// All messages of a conversation in commit order.
    pub fn get_messages_for_conversation(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, text, sender_token, created_at
             FROM messages
             WHERE conversation_key = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![key.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_messages(&self, key: &ConversationKey) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Copy every message of `from` into `to`, keeping ids and commit times.
    ///
    /// Messages already present under `to` with the same id are left alone,
    /// so repeating a copy is a no-op. Returns the number of rows written.
    pub fn copy_messages(&self, from: &ConversationKey, to: &ConversationKey) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;

        let copied = tx.execute(
            "INSERT OR IGNORE INTO messages (conversation_key, id, text, sender_token, created_at)
             SELECT ?2, id, text, sender_token, created_at
             FROM messages
             WHERE conversation_key = ?1
             ORDER BY created_at ASC, rowid ASC",
            params![from.as_str(), to.as_str()],
        )?;

        if copied > 0 {
            tx.execute(
                "INSERT INTO conversations (key, created_at, migrated_from) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET migrated_from = excluded.migrated_from",
                params![to.as_str(), Utc::now().to_rfc3339(), from.as_str()],
            )?;
        }
        tx.commit()?;

        Ok(copied)
    }

    /// Delete every message of a conversation. Returns the number removed.
    pub fn delete_messages_for_conversation(&self, key: &ConversationKey) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE conversation_key = ?1",
            params![key.as_str()],
        )?;
        Ok(affected)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let text: String = row.get(1)?;
    let sender: String = row.get(2)?;
    let created_us: i64 = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(created_us)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, created_us))?;

    Ok(Message {
        id: MessageId(id),
        text,
        sender_token: Token::normalize(&sender),
        created_at: Some(created_at),
    })
}
