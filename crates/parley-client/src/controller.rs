//! Live view of one open conversation.
//!
//! The controller moves through `Closed -> Subscribing -> Live -> Closed`.
//! It owns at most one [`SnapshotStream`]; opening another key closes the
//! previous stream first. Because snapshots are only applied through
//! `&mut self`, nothing reaches the view once [`close`] has returned.
//!
//! Sent messages are shown at the end of the view right away and dropped
//! from the pending list as soon as a snapshot contains their store-assigned
//! id. Matching is by id, never by text, so the same message cannot show up
//! twice.
//!
//! [`close`]: MessageStreamController::close

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_shared::{ConversationKey, MessageId, Token, ValidationError};
use parley_store::{ConversationSnapshot, ConversationStore, Message, OutgoingMessage, SnapshotStream};

use crate::error::Result;
use crate::roster::RosterCache;
use crate::view::ViewMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Subscribing,
    Live,
}

#[derive(Debug)]
struct PendingSend {
    local_id: MessageId,
    text: String,
    sender_token: Token,
    /// Known once the store acknowledges the append.
    stored: Option<Message>,
}

pub struct MessageStreamController {
    store: Arc<dyn ConversationStore>,
    roster: Arc<RosterCache>,
    max_message_chars: usize,

    state: StreamState,
    key: Option<ConversationKey>,
    stream: Option<SnapshotStream>,
    acknowledged: Vec<Message>,
    pending: Vec<PendingSend>,
}

impl MessageStreamController {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        roster: Arc<RosterCache>,
        max_message_chars: usize,
    ) -> Self {
        Self {
            store,
            roster,
            max_message_chars,
            state: StreamState::Closed,
            key: None,
            stream: None,
            acknowledged: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn key(&self) -> Option<&ConversationKey> {
        self.key.as_ref()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start streaming `key`. A no-op if `key` is already live.
    pub async fn open(&mut self, key: ConversationKey) -> Result<()> {
        if self.state == StreamState::Live && self.key.as_ref() == Some(&key) {
            debug!(key = %key, "conversation already open");
            return Ok(());
        }

        self.close();
        self.state = StreamState::Subscribing;
        self.key = Some(key.clone());

        let mut stream = match self.store.subscribe(&key).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(key = %key, error = %e, "subscribe failed");
                self.close();
                return Err(e.into());
            }
        };

        let first = stream.latest();
        self.stream = Some(stream);
        self.apply(first);
        self.state = StreamState::Live;

        info!(key = %key, messages = self.acknowledged.len(), "conversation open");
        Ok(())
    }

    /// Drop the subscription and clear the view. Safe to call in any state.
    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        if let Some(key) = self.key.take() {
            debug!(key = %key, "conversation closed");
        }
        self.stream = None;
        self.acknowledged.clear();
        self.pending.clear();
        self.state = StreamState::Closed;
    }

    // ------------------------------------------------------------------
    // Snapshot delivery
    // ------------------------------------------------------------------

    /// Wait for the next snapshot and apply it.
    ///
    /// Returns `false` without waiting when no conversation is live, and
    /// `false` after closing if the store ends the feed.
    pub async fn next_update(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        match stream.next().await {
            Some(snapshot) => {
                self.apply(snapshot);
                true
            }
            None => {
                warn!(key = ?self.key, "conversation feed ended");
                self.close();
                false
            }
        }
    }

    /// Apply a waiting snapshot, if any, without blocking.
    pub fn poll_update(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        if !stream.has_pending() {
            return false;
        }
        let snapshot = stream.latest();
        self.apply(snapshot);
        true
    }

    fn apply(&mut self, snapshot: ConversationSnapshot) {
        if self.key.as_ref() != Some(&snapshot.key) {
            return;
        }

        self.pending.retain(|p| match &p.stored {
            Some(stored) => !snapshot.contains(&stored.id),
            None => true,
        });
        self.acknowledged = snapshot.messages;

        debug!(
            key = %snapshot.key,
            acknowledged = self.acknowledged.len(),
            pending = self.pending.len(),
            "snapshot applied"
        );
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send `text` as the signed-in identity.
    ///
    /// The text is trimmed first. The message is visible immediately as
    /// pending; its final position is the one the store's snapshot gives it.
    /// On failure the pending entry is withdrawn, though the store may still
    /// have written the message.
    pub async fn send(&mut self, text: &str) -> Result<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        let len = text.chars().count();
        if len > self.max_message_chars {
            return Err(ValidationError::TooLong {
                len,
                max: self.max_message_chars,
            }
            .into());
        }

        let key = match (&self.state, &self.key) {
            (StreamState::Live, Some(key)) => key.clone(),
            _ => return Err(ValidationError::NoConversationOpen.into()),
        };

        let me = self
            .roster
            .current_identity()
            .ok_or(ValidationError::NoCurrentIdentity)?;
        let sender_token = me.token();
        if sender_token.is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }

        let local_id = MessageId(Uuid::new_v4());
        self.pending.push(PendingSend {
            local_id,
            text: text.to_string(),
            sender_token: sender_token.clone(),
            stored: None,
        });

        let outgoing = OutgoingMessage {
            text: text.to_string(),
            sender_token,
        };
        match self.store.append(&key, outgoing).await {
            Ok(stored) => {
                let id = stored.id;
                let already_in_snapshot = self.acknowledged.iter().any(|m| m.id == id);
                if already_in_snapshot {
                    self.pending.retain(|p| p.local_id != local_id);
                } else if let Some(p) = self.pending.iter_mut().find(|p| p.local_id == local_id) {
                    p.stored = Some(stored);
                }
                debug!(key = %key, id = %id, "message sent");
                Ok(id)
            }
            Err(e) => {
                self.pending.retain(|p| p.local_id != local_id);
                warn!(key = %key, error = %e, "send failed");
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    /// Acknowledged messages in commit order, then pending ones in send order.
    pub fn messages(&self) -> Vec<ViewMessage> {
        let me = self.roster.current_identity().map(|i| i.token());

        let mut view: Vec<ViewMessage> = self
            .acknowledged
            .iter()
            .map(|m| ViewMessage::acknowledged(m, me.as_ref()))
            .collect();

        view.extend(self.pending.iter().map(|p| ViewMessage {
            id: p.stored.as_ref().map_or(p.local_id, |s| s.id),
            text: p.text.clone(),
            sender_token: p.sender_token.clone(),
            created_at: p.stored.as_ref().and_then(|s| s.created_at),
            is_own: me.as_ref() == Some(&p.sender_token),
            pending: true,
        }));
        view
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use parley_shared::{derive_key, Identity};
    use parley_store::{SqliteConversationStore, StoreError};

    use super::*;
    use crate::error::ClientError;
    use crate::test_support::FlakyStore;

    struct Fixture {
        store: Arc<FlakyStore>,
        ana: Identity,
        bob: Identity,
        key: ConversationKey,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(FlakyStore::new(
            SqliteConversationStore::open_in_memory().unwrap(),
        ));
        let ana = Identity::new("Ana Ana");
        let bob = Identity::new("Bob");
        store.put_identity(&ana).await.unwrap();
        store.put_identity(&bob).await.unwrap();
        let key = derive_key(&ana.token(), &bob.token());
        Fixture { store, ana, bob, key }
    }

    async fn controller_for(f: &Fixture, me: &Identity) -> MessageStreamController {
        let roster = RosterCache::connect(f.store.as_ref(), Some(me.id))
            .await
            .unwrap();
        MessageStreamController::new(f.store.clone(), Arc::new(roster), 4096)
    }

    fn texts(c: &MessageStreamController) -> Vec<String> {
        c.messages().into_iter().map(|m| m.text).collect()
    }

    #[tokio::test]
    async fn two_participants_see_the_same_order() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        let mut bob = controller_for(&f, &f.bob).await;

        ana.open(f.key.clone()).await.unwrap();
        bob.open(f.key.clone()).await.unwrap();
        assert_eq!(ana.key().map(|k| k.as_str()), Some("Ana_Ana_Bob"));

        ana.send("hi").await.unwrap();
        bob.send("hello").await.unwrap();

        while ana.poll_update() {}
        while bob.poll_update() {}

        assert_eq!(texts(&ana), ["hi", "hello"]);
        assert_eq!(texts(&bob), ["hi", "hello"]);
        assert_eq!(ana.pending_count(), 0);

        let view = ana.messages();
        assert!(view[0].is_own && !view[1].is_own);
        assert!(view.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn optimistic_entry_is_reconciled_by_id() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        ana.open(f.key.clone()).await.unwrap();

        let id = ana.send("hi").await.unwrap();
        // Acknowledged but the snapshot has not been applied yet.
        let view = ana.messages();
        assert_eq!(view.len(), 1);
        assert!(view[0].pending);
        assert_eq!(view[0].id, id);

        assert!(ana.next_update().await);
        let view = ana.messages();
        assert_eq!(view.len(), 1);
        assert!(!view[0].pending);
        assert_eq!(view[0].id, id);
    }

    #[tokio::test]
    async fn same_text_twice_is_two_messages() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        ana.open(f.key.clone()).await.unwrap();

        ana.send("ok").await.unwrap();
        ana.send("ok").await.unwrap();
        while ana.poll_update() {}
        assert_eq!(texts(&ana), ["ok", "ok"]);
    }

    #[tokio::test]
    async fn failed_append_then_retry_shows_once() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        ana.open(f.key.clone()).await.unwrap();

        f.store.fail_next_appends(1);
        let err = ana.send("hi").await.unwrap_err();
        assert!(matches!(err, ClientError::StoreUnavailable(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert!(ana.messages().is_empty());

        ana.send("hi").await.unwrap();
        while ana.poll_update() {}
        assert_eq!(texts(&ana), ["hi"]);
        assert_eq!(f.store.message_count(&f.key).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lost_acknowledgement_surfaces_through_snapshot() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        ana.open(f.key.clone()).await.unwrap();

        f.store.lose_next_append_ack();
        assert!(ana.send("hi").await.is_err());

        while ana.poll_update() {}
        let view = ana.messages();
        assert_eq!(view.len(), 1);
        assert!(!view[0].pending);
    }

    #[tokio::test]
    async fn send_validation() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;

        let err = ana.send("hi").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::NoConversationOpen)
        ));

        ana.open(f.key.clone()).await.unwrap();
        let err = ana.send("   \n").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::EmptyText)));

        let long = "x".repeat(4097);
        let err = ana.send(&long).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::TooLong { len: 4097, max: 4096 })
        ));

        assert_eq!(f.store.message_count(&f.key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_display_name_cannot_send() {
        let f = fixture().await;
        let blank = Identity::new("   ");
        f.store.put_identity(&blank).await.unwrap();

        let mut c = controller_for(&f, &blank).await;
        c.open(derive_key(&blank.token(), &f.bob.token())).await.unwrap();
        let err = c.send("hi").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::EmptyToken)));
    }

    #[tokio::test]
    async fn send_trims_text() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        ana.open(f.key.clone()).await.unwrap();

        ana.send("  hi there \n").await.unwrap();
        while ana.poll_update() {}
        assert_eq!(texts(&ana), ["hi there"]);
    }

    #[tokio::test]
    async fn open_close_lifecycle() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        assert_eq!(ana.state(), StreamState::Closed);

        ana.close();
        assert_eq!(ana.state(), StreamState::Closed);

        ana.open(f.key.clone()).await.unwrap();
        assert_eq!(ana.state(), StreamState::Live);
        assert_eq!(f.store.subscribe_calls(), 1);

        ana.open(f.key.clone()).await.unwrap();
        assert_eq!(f.store.subscribe_calls(), 1);

        let other = derive_key(&f.ana.token(), &Token::normalize("Cy"));
        ana.open(other.clone()).await.unwrap();
        assert_eq!(f.store.subscribe_calls(), 2);
        assert_eq!(ana.key(), Some(&other));

        ana.close();
        ana.close();
        assert_eq!(ana.state(), StreamState::Closed);
        assert!(ana.key().is_none());
        assert!(!ana.next_update().await);
    }

    #[tokio::test]
    async fn nothing_is_delivered_after_close() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        let mut bob = controller_for(&f, &f.bob).await;
        ana.open(f.key.clone()).await.unwrap();
        bob.open(f.key.clone()).await.unwrap();

        ana.close();
        bob.send("are you there?").await.unwrap();

        assert!(!ana.poll_update());
        assert!(ana.messages().is_empty());
    }

    #[tokio::test]
    async fn reopening_replays_history() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;
        ana.open(f.key.clone()).await.unwrap();
        ana.send("one").await.unwrap();
        ana.send("two").await.unwrap();
        ana.close();

        ana.open(f.key.clone()).await.unwrap();
        assert_eq!(texts(&ana), ["one", "two"]);
        assert_eq!(ana.pending_count(), 0);
    }

    #[tokio::test]
    async fn failed_subscribe_leaves_controller_closed() {
        let f = fixture().await;
        let mut ana = controller_for(&f, &f.ana).await;

        f.store.fail_next_subscribes(1);
        assert!(ana.open(f.key.clone()).await.is_err());
        assert_eq!(ana.state(), StreamState::Closed);
        assert!(ana.key().is_none());

        ana.open(f.key.clone()).await.unwrap();
        assert_eq!(ana.state(), StreamState::Live);
    }
}
