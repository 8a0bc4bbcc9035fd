//! Conversation markers and the existence check.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use parley_shared::ConversationKey;

use crate::database::Database;
use crate::error::Result;
use crate::models::ConversationMarker;

impl Database {
    /// A conversation exists iff at least one message is stored under its key.
    /// The marker alone does not count.
    pub fn conversation_exists(&self, key: &ConversationKey) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE conversation_key = ?1)",
            params![key.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn get_conversation_marker(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<ConversationMarker>> {
        let marker = self
            .conn()
            .query_row(
                "SELECT key, created_at, migrated_from FROM conversations WHERE key = ?1",
                params![key.as_str()],
                row_to_marker,
            )
            .optional()?;
        Ok(marker)
    }

    /// Delete the marker of a conversation. Returns `true` if one existed.
    pub fn delete_conversation_marker(&self, key: &ConversationKey) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM conversations WHERE key = ?1",
            params![key.as_str()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_marker(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationMarker> {
    let key: String = row.get(0)?;
    let created_str: String = row.get(1)?;
    let migrated_from: Option<String> = row.get(2)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ConversationMarker {
        key: ConversationKey::from_raw(key),
        created_at,
        migrated_from: migrated_from.map(ConversationKey::from_raw),
    })
}
