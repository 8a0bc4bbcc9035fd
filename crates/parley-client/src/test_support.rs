//! Store wrapper that injects transient failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use parley_shared::{ConversationKey, Identity, IdentityId};
use parley_store::{
    ConversationMarker, ConversationStore, Message, OutgoingMessage, Result, SnapshotStream,
    SqliteConversationStore, StoreError,
};

pub struct FlakyStore {
    inner: SqliteConversationStore,
    failing_appends: AtomicUsize,
    lose_ack: AtomicBool,
    failing_subscribes: AtomicUsize,
    subscribe_calls: AtomicUsize,
    failing_copies: Mutex<HashSet<ConversationKey>>,
    failing_deletes: Mutex<HashSet<ConversationKey>>,
    failing_markers: Mutex<HashSet<ConversationKey>>,
    failing_roster: AtomicBool,
    failing_identity_writes: AtomicBool,
}

fn unavailable(op: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {op} failure"))
}

impl FlakyStore {
    pub fn new(inner: SqliteConversationStore) -> Self {
        Self {
            inner,
            failing_appends: AtomicUsize::new(0),
            lose_ack: AtomicBool::new(false),
            failing_subscribes: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            failing_copies: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_markers: Mutex::new(HashSet::new()),
            failing_roster: AtomicBool::new(false),
            failing_identity_writes: AtomicBool::new(false),
        }
    }

    /// The next `n` appends fail without writing.
    pub fn fail_next_appends(&self, n: usize) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    /// The next append writes, then reports failure.
    pub fn lose_next_append_ack(&self) {
        self.lose_ack.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_subscribes(&self, n: usize) {
        self.failing_subscribes.store(n, Ordering::SeqCst);
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Copies reading from `key` fail until healed.
    pub fn fail_copy_from(&self, key: &ConversationKey) {
        self.failing_copies.lock().unwrap().insert(key.clone());
    }

    pub fn fail_delete_of(&self, key: &ConversationKey) {
        self.failing_deletes.lock().unwrap().insert(key.clone());
    }

    pub fn fail_marker_delete_of(&self, key: &ConversationKey) {
        self.failing_markers.lock().unwrap().insert(key.clone());
    }

    pub fn fail_roster_reads(&self, fail: bool) {
        self.failing_roster.store(fail, Ordering::SeqCst);
    }

    pub fn fail_identity_writes(&self, fail: bool) {
        self.failing_identity_writes.store(fail, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing_appends.store(0, Ordering::SeqCst);
        self.lose_ack.store(false, Ordering::SeqCst);
        self.failing_subscribes.store(0, Ordering::SeqCst);
        self.failing_copies.lock().unwrap().clear();
        self.failing_deletes.lock().unwrap().clear();
        self.failing_markers.lock().unwrap().clear();
        self.failing_roster.store(false, Ordering::SeqCst);
        self.failing_identity_writes.store(false, Ordering::SeqCst);
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn append(&self, key: &ConversationKey, message: OutgoingMessage) -> Result<Message> {
        if Self::take_one(&self.failing_appends) {
            return Err(unavailable("append"));
        }
        if self.lose_ack.swap(false, Ordering::SeqCst) {
            self.inner.append(key, message).await?;
            return Err(unavailable("append acknowledgement"));
        }
        self.inner.append(key, message).await
    }

    async fn subscribe(&self, key: &ConversationKey) -> Result<SnapshotStream> {
        if Self::take_one(&self.failing_subscribes) {
            return Err(unavailable("subscribe"));
        }
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe(key).await
    }

    async fn message_count(&self, key: &ConversationKey) -> Result<usize> {
        self.inner.message_count(key).await
    }

    async fn copy_all_messages(
        &self,
        from: &ConversationKey,
        to: &ConversationKey,
    ) -> Result<usize> {
        if self.failing_copies.lock().unwrap().contains(from) {
            return Err(unavailable("copy"));
        }
        self.inner.copy_all_messages(from, to).await
    }

    async fn delete_all_messages(&self, key: &ConversationKey) -> Result<usize> {
        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(unavailable("delete"));
        }
        self.inner.delete_all_messages(key).await
    }

    async fn delete_conversation_marker(&self, key: &ConversationKey) -> Result<()> {
        if self.failing_markers.lock().unwrap().contains(key) {
            return Err(unavailable("marker delete"));
        }
        self.inner.delete_conversation_marker(key).await
    }

    async fn conversation_marker(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<ConversationMarker>> {
        self.inner.conversation_marker(key).await
    }

    async fn all_identities(&self) -> Result<Vec<Identity>> {
        if self.failing_roster.load(Ordering::SeqCst) {
            return Err(unavailable("roster read"));
        }
        self.inner.all_identities().await
    }

    async fn watch_identities(&self) -> Result<watch::Receiver<Vec<Identity>>> {
        self.inner.watch_identities().await
    }

    async fn put_identity(&self, identity: &Identity) -> Result<()> {
        if self.failing_identity_writes.load(Ordering::SeqCst) {
            return Err(unavailable("identity write"));
        }
        self.inner.put_identity(identity).await
    }

    async fn remove_identity(&self, id: &IdentityId) -> Result<bool> {
        if self.failing_identity_writes.load(Ordering::SeqCst) {
            return Err(unavailable("identity removal"));
        }
        self.inner.remove_identity(id).await
    }
}
