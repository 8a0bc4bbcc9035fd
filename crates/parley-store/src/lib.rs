//! # parley-store
//!
//! Storage for Parley conversations and the roster, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle with typed CRUD
//! helpers, and the asynchronous [`ConversationStore`] seam the client core
//! talks to. [`SqliteConversationStore`] implements that seam on top of a
//! [`Database`] and adds live per-conversation snapshot feeds.

pub mod adapter;
pub mod conversations;
pub mod database;
pub mod identities;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod sqlite_store;

mod error;

pub use adapter::{ConversationStore, SnapshotStream};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use sqlite_store::SqliteConversationStore;
