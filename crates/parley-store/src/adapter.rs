//! The conversation store seam.
//!
//! [`ConversationStore`] is everything the client core needs from a backing
//! document store: append with a store-assigned commit time, a live
//! full-snapshot subscription per conversation key, bulk copy/delete, and the
//! roster. Any backend that can serve the `identities/{id}` and
//! `conversations/{key}/messages/{id}` path families can implement it.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::watch;

use parley_shared::{derive_key, ConversationKey, Identity, IdentityId, Token};

use crate::error::Result;
use crate::models::{
    ConversationMarker, ConversationSnapshot, Message, OutgoingMessage, TouchingConversation,
};

/// Live feed of full snapshots for one conversation.
///
/// Every delivery replaces the previous one; intermediate states may be
/// skipped but never reordered. Dropping the stream ends the subscription.
#[derive(Debug)]
pub struct SnapshotStream {
    key: ConversationKey,
    rx: watch::Receiver<ConversationSnapshot>,
}

impl SnapshotStream {
    pub fn new(key: ConversationKey, rx: watch::Receiver<ConversationSnapshot>) -> Self {
        Self { key, rx }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// The most recent snapshot, marking it as seen.
    pub fn latest(&mut self) -> ConversationSnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next snapshot. `None` once the store drops the feed.
    pub async fn next(&mut self) -> Option<ConversationSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether a snapshot newer than the last one read is waiting.
    pub fn has_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Append a message and return it with its id and commit time.
    ///
    /// On [`StoreError::Unavailable`](crate::StoreError::Unavailable) the
    /// write may or may not have happened.
    async fn append(&self, key: &ConversationKey, message: OutgoingMessage) -> Result<Message>;

    /// Subscribe to full snapshots of `key`, ordered by commit time.
    async fn subscribe(&self, key: &ConversationKey) -> Result<SnapshotStream>;

    async fn message_count(&self, key: &ConversationKey) -> Result<usize>;

    async fn conversation_exists(&self, key: &ConversationKey) -> Result<bool> {
        Ok(self.message_count(key).await? > 0)
    }

    /// Copy every message from one key to another, keeping ids. Safe to
    /// repeat. Returns the number of messages newly written.
    async fn copy_all_messages(&self, from: &ConversationKey, to: &ConversationKey)
        -> Result<usize>;

    /// Returns the number of messages removed.
    async fn delete_all_messages(&self, key: &ConversationKey) -> Result<usize>;

    /// Best-effort; a missing marker is not an error.
    async fn delete_conversation_marker(&self, key: &ConversationKey) -> Result<()>;

    async fn conversation_marker(&self, key: &ConversationKey)
        -> Result<Option<ConversationMarker>>;

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    async fn all_identities(&self) -> Result<Vec<Identity>>;

    /// Live view of the whole roster.
    async fn watch_identities(&self) -> Result<watch::Receiver<Vec<Identity>>>;

    async fn put_identity(&self, identity: &Identity) -> Result<()>;

    /// Returns `true` if a record was removed.
    async fn remove_identity(&self, id: &IdentityId) -> Result<bool>;

    // ------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------

    /// Existing conversations whose key embeds `token`.
    ///
    /// There is no index by token: every roster entry yields one candidate
    /// key, which is kept if it holds at least one message. Several roster
    /// entries sharing a token yield the candidate once.
    async fn conversations_touching(&self, token: &Token) -> Result<Vec<TouchingConversation>> {
        let roster = self.all_identities().await?;

        let mut candidates: BTreeMap<ConversationKey, Token> = BTreeMap::new();
        for other in &roster {
            let other_token = other.token();
            candidates
                .entry(derive_key(token, &other_token))
                .or_insert(other_token);
        }

        let mut found = Vec::new();
        for (key, other_token) in candidates {
            if self.conversation_exists(&key).await? {
                found.push(TouchingConversation { key, other_token });
            }
        }

        tracing::debug!(
            token = %token,
            scanned = roster.len(),
            found = found.len(),
            "enumerated conversations touching token"
        );
        Ok(found)
    }

    async fn list_all_conversations_touching(
        &self,
        token: &Token,
    ) -> Result<BTreeSet<ConversationKey>> {
        Ok(self
            .conversations_touching(token)
            .await?
            .into_iter()
            .map(|c| c.key)
            .collect())
    }
}
