//! CRUD operations for roster records under `identities/{id}`.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use parley_shared::{Identity, IdentityId};

use crate::database::Database;
use crate::error::Result;

impl Database {
    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Insert an identity, or overwrite the display name and avatar of an
    /// existing one.
    pub fn put_identity(&self, identity: &Identity) -> Result<()> {
        self.conn().execute(
            "INSERT INTO identities (id, display_name, avatar_ref, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_ref   = excluded.avatar_ref",
            params![
                identity.id.to_string(),
                identity.display_name,
                identity.avatar_ref,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_identity(&self, id: &IdentityId) -> Result<Option<Identity>> {
        let identity = self
            .conn()
            .query_row(
                "SELECT id, display_name, avatar_ref FROM identities WHERE id = ?1",
                params![id.to_string()],
                row_to_identity,
            )
            .optional()?;
        Ok(identity)
    }

    /// List the whole roster, ordered by creation date.
    pub fn list_identities(&self) -> Result<Vec<Identity>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, display_name, avatar_ref
             FROM identities
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map([], row_to_identity)?;

        let mut identities = Vec::new();
        for row in rows {
            identities.push(row?);
        }
        Ok(identities)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an identity record.  Returns `true` if a row was deleted.
    pub fn delete_identity(&self, id: &IdentityId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM identities WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    let id_str: String = row.get(0)?;
    let display_name: String = row.get(1)?;
    let avatar_ref: Option<String> = row.get(2)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Identity {
        id: IdentityId(id),
        display_name,
        avatar_ref,
    })
}
