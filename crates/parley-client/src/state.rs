//! Client state shared by everything the embedding application calls into.
//!
//! [`ClientState`] wires one store, one roster cache, the cascade propagator
//! and the router together. Controllers are created per view through
//! [`ClientState::controller`] and share the same store and roster.

use std::sync::Arc;

use tracing::info;

use parley_shared::IdentityId;
use parley_store::{ConversationStore, Database, SqliteConversationStore};

use crate::config::ClientConfig;
use crate::controller::MessageStreamController;
use crate::error::Result;
use crate::propagator::IdentityChangePropagator;
use crate::roster::RosterCache;
use crate::router::ConversationRouter;

pub struct ClientState {
    pub config: ClientConfig,
    pub store: Arc<dyn ConversationStore>,
    pub roster: Arc<RosterCache>,
    pub propagator: IdentityChangePropagator,
    pub router: ConversationRouter,
}

impl ClientState {
    /// Open the SQLite store named by `config` and connect the roster.
    ///
    /// `current` is the signed-in identity, if the session layer has one.
    pub async fn open(config: ClientConfig, current: Option<IdentityId>) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        info!(path = ?db.path(), "opened conversation store");

        let store = Arc::new(SqliteConversationStore::new(db)?);
        Self::open_with_store(config, store, current).await
    }

    /// Build the client on top of an already-open store.
    pub async fn open_with_store(
        config: ClientConfig,
        store: Arc<dyn ConversationStore>,
        current: Option<IdentityId>,
    ) -> Result<Self> {
        let roster = Arc::new(RosterCache::connect(store.as_ref(), current).await?);
        let propagator = IdentityChangePropagator::new(store.clone(), config.cascade_concurrency);
        let router = ConversationRouter::new(roster.clone(), store.clone());

        Ok(Self {
            config,
            store,
            roster,
            propagator,
            router,
        })
    }

    /// A fresh, closed controller for one conversation view.
    pub fn controller(&self) -> MessageStreamController {
        MessageStreamController::new(
            self.store.clone(),
            self.roster.clone(),
            self.config.max_message_chars,
        )
    }
}
