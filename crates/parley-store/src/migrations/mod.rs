//! Schema versions, tracked in `PRAGMA user_version`.
//!
//! - v1: `identities`, `conversations` (markers) and `messages` keyed by
//!   `(conversation_key, id)` so that copying a conversation twice is a no-op
//!
//! Opening a [`Database`](crate::Database) applies whatever is missing.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

const CURRENT_VERSION: u32 = 1;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current >= CURRENT_VERSION {
        tracing::debug!(version = current, "schema up to date");
        return Ok(());
    }

    if current < 1 {
        tracing::info!(from = current, to = 1, "creating conversation schema");
        v001_initial::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
