//! v001 -- Initial schema creation.
//!
//! Creates the three tables behind the two path families:
//! `identities/{id}` and `conversations/{key}/messages/{id}`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Identities (roster)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS identities (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    display_name TEXT NOT NULL,               -- not unique
    avatar_ref   TEXT,
    created_at   TEXT NOT NULL                -- RFC-3339
);

-- ----------------------------------------------------------------
-- Conversation markers (optional metadata per key)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    key            TEXT PRIMARY KEY NOT NULL,
    created_at     TEXT NOT NULL,             -- RFC-3339
    migrated_from  TEXT                       -- previous key after a rename
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    conversation_key TEXT NOT NULL,
    id               TEXT NOT NULL,           -- UUID v4, store-assigned
    text             TEXT NOT NULL,
    sender_token     TEXT NOT NULL,
    created_at       INTEGER NOT NULL,        -- microseconds since epoch

    PRIMARY KEY (conversation_key, id)
);

CREATE INDEX IF NOT EXISTS idx_messages_key_created
    ON messages(conversation_key, created_at ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
