//! Records persisted under the two path families.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_shared::{ConversationKey, MessageId, Token};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message as stored under `conversations/{key}/messages/{id}`.
///
/// Messages are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Store-assigned id, unique within the conversation.
    pub id: MessageId,
    pub text: String,
    /// The sender's token at send time. Not rewritten by a later rename.
    pub sender_token: Token,
    /// Commit time assigned by the store. `None` while the write is not yet
    /// acknowledged.
    pub created_at: Option<DateTime<Utc>>,
}

/// The fields a client supplies when appending. The commit time is left to
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub sender_token: Token,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Full contents of one conversation at a point in the store's commit order,
/// sorted by `created_at` ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub key: ConversationKey,
    pub messages: Vec<Message>,
}

impl ConversationSnapshot {
    pub fn empty(key: ConversationKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
        }
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }
}

// ---------------------------------------------------------------------------
// Conversation marker
// ---------------------------------------------------------------------------

/// Optional metadata kept alongside a conversation's messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMarker {
    pub key: ConversationKey,
    pub created_at: DateTime<Utc>,
    /// Key the messages were copied from by a rename cascade.
    pub migrated_from: Option<ConversationKey>,
}

// ---------------------------------------------------------------------------
// Enumeration result
// ---------------------------------------------------------------------------

/// An existing conversation found by scanning the roster for a token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TouchingConversation {
    pub key: ConversationKey,
    /// Token of the participant on the other side of `key`.
    pub other_token: Token,
}
