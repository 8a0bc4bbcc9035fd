use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use parley_shared::{MessageId, Token};
use parley_store::Message;

/// One line of an open conversation as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewMessage {
    /// Store-assigned id, or a local placeholder until the append is
    /// acknowledged.
    pub id: MessageId,
    pub text: String,
    pub sender_token: Token,
    pub created_at: Option<DateTime<Utc>>,
    /// Sent by the signed-in identity.
    pub is_own: bool,
    /// Shown optimistically; not yet part of a store snapshot.
    pub pending: bool,
}

impl ViewMessage {
    pub(crate) fn acknowledged(message: &Message, me: Option<&Token>) -> Self {
        Self {
            id: message.id,
            text: message.text.clone(),
            sender_token: message.sender_token.clone(),
            created_at: message.created_at,
            is_own: me == Some(&message.sender_token),
            pending: false,
        }
    }

    /// `HH:MM` in local time, empty while the commit time is unknown.
    pub fn time_label(&self) -> String {
        match self.created_at {
            Some(ts) => ts.with_timezone(&Local).format("%H:%M").to_string(),
            None => String::new(),
        }
    }
}

/// Serializable form handed to a UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub timestamp: Option<String>,
    pub time_label: String,
    pub is_own: bool,
    pub pending: bool,
}

impl From<&ViewMessage> for MessageDto {
    fn from(m: &ViewMessage) -> Self {
        Self {
            id: m.id.to_string(),
            text: m.text.clone(),
            sender: m.sender_token.to_string(),
            timestamp: m.created_at.map(|ts| ts.to_rfc3339()),
            time_label: m.time_label(),
            is_own: m.is_own,
            pending: m.pending,
        }
    }
}
