//! [`ConversationStore`] backed by the local SQLite [`Database`].
//!
//! Each subscribed key owns a `watch` channel. After every write touching a
//! key the full message list is re-read and pushed to that channel, so a
//! subscriber always sees the store's commit order. Feeds without receivers
//! are dropped on the next write.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use parley_shared::{
    conversation_path, identity_path, message_path, messages_path, ConversationKey, Identity,
    IdentityId,
};

use crate::adapter::{ConversationStore, SnapshotStream};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ConversationMarker, ConversationSnapshot, Message, OutgoingMessage};

pub struct SqliteConversationStore {
    db: Mutex<Database>,
    // Lock order: `feeds` before `db`.
    feeds: Mutex<HashMap<ConversationKey, watch::Sender<ConversationSnapshot>>>,
    roster: watch::Sender<Vec<Identity>>,
}

impl SqliteConversationStore {
    pub fn new(db: Database) -> Result<Self> {
        let roster_now = db.list_identities()?;
        let (roster, _) = watch::channel(roster_now);

        Ok(Self {
            db: Mutex::new(db),
            feeds: Mutex::new(HashMap::new()),
            roster,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Database::open_in_memory()?)
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard)
    }

    /// Push a fresh snapshot of `key` to its subscribers, if any.
    fn publish(&self, key: &ConversationKey) {
        if let Err(e) = self.try_publish(key) {
            warn!(key = %key, error = %e, "failed to publish conversation snapshot");
        }
    }

    fn try_publish(&self, key: &ConversationKey) -> Result<()> {
        let mut feeds = self.feeds.lock().map_err(|_| StoreError::Poisoned)?;

        let Some(tx) = feeds.get(key) else {
            return Ok(());
        };
        if tx.receiver_count() == 0 {
            feeds.remove(key);
            debug!(key = %key, "dropped idle conversation feed");
            return Ok(());
        }

        let messages = self.with_db(|db| db.get_messages_for_conversation(key))?;
        tx.send_replace(ConversationSnapshot {
            key: key.clone(),
            messages,
        });
        Ok(())
    }

    fn publish_roster(&self) {
        match self.with_db(|db| db.list_identities()) {
            Ok(all) => {
                self.roster.send_replace(all);
            }
            Err(e) => warn!(error = %e, "failed to publish roster"),
        }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, key: &ConversationKey, message: OutgoingMessage) -> Result<Message> {
        let stored = self.with_db(|db| db.insert_message(key, &message))?;
        debug!(path = %message_path(key, &stored.id), "message appended");
        self.publish(key);
        Ok(stored)
    }

    async fn subscribe(&self, key: &ConversationKey) -> Result<SnapshotStream> {
        let mut feeds = self.feeds.lock().map_err(|_| StoreError::Poisoned)?;

        let snapshot = ConversationSnapshot {
            key: key.clone(),
            messages: self.with_db(|db| db.get_messages_for_conversation(key))?,
        };

        let rx = match feeds.get(key) {
            Some(tx) => {
                tx.send_if_modified(|current| {
                    if *current == snapshot {
                        false
                    } else {
                        *current = snapshot;
                        true
                    }
                });
                tx.subscribe()
            }
            None => {
                let (tx, rx) = watch::channel(snapshot);
                feeds.insert(key.clone(), tx);
                rx
            }
        };

        debug!(path = %messages_path(key), "conversation subscribed");
        Ok(SnapshotStream::new(key.clone(), rx))
    }

    async fn message_count(&self, key: &ConversationKey) -> Result<usize> {
        self.with_db(|db| db.count_messages(key))
    }

    async fn conversation_exists(&self, key: &ConversationKey) -> Result<bool> {
        self.with_db(|db| db.conversation_exists(key))
    }

    async fn copy_all_messages(
        &self,
        from: &ConversationKey,
        to: &ConversationKey,
    ) -> Result<usize> {
        let copied = self.with_db(|db| db.copy_messages(from, to))?;
        info!(from = %from, to = %to, copied, "conversation messages copied");
        if copied > 0 {
            self.publish(to);
        }
        Ok(copied)
    }

    async fn delete_all_messages(&self, key: &ConversationKey) -> Result<usize> {
        let removed = self.with_db(|db| db.delete_messages_for_conversation(key))?;
        info!(key = %key, removed, "conversation messages deleted");
        if removed > 0 {
            self.publish(key);
        }
        Ok(removed)
    }

    async fn delete_conversation_marker(&self, key: &ConversationKey) -> Result<()> {
        let existed = self.with_db(|db| db.delete_conversation_marker(key))?;
        if !existed {
            debug!(path = %conversation_path(key), "no conversation marker to delete");
        }
        Ok(())
    }

    async fn conversation_marker(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<ConversationMarker>> {
        self.with_db(|db| db.get_conversation_marker(key))
    }

    async fn all_identities(&self) -> Result<Vec<Identity>> {
        self.with_db(|db| db.list_identities())
    }

    async fn watch_identities(&self) -> Result<watch::Receiver<Vec<Identity>>> {
        Ok(self.roster.subscribe())
    }

    async fn put_identity(&self, identity: &Identity) -> Result<()> {
        self.with_db(|db| db.put_identity(identity))?;
        info!(path = %identity_path(&identity.id), token = %identity.token(), "identity stored");
        self.publish_roster();
        Ok(())
    }

    async fn remove_identity(&self, id: &IdentityId) -> Result<bool> {
        let removed = self.with_db(|db| db.delete_identity(id))?;
        if removed {
            info!(path = %identity_path(id), "identity removed");
            self.publish_roster();
        }
        Ok(removed)
    }
}
