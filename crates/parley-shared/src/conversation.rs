//! Conversation key derivation and the path convention built on it.
//!
//! A two-party conversation has no "create" step: its storage location is a
//! pure function of the two participants' tokens. The function is
//! commutative, so either participant computes the same key.
//!
//! Two distinct display names that normalize to the same token ("Ana Ana"
//! and "Ana  Ana") address the same conversations. That collision is
//! accepted and not detected here.

use crate::constants::{
    CONVERSATIONS_COLLECTION, IDENTITIES_COLLECTION, KEY_SEPARATOR, MESSAGES_COLLECTION,
};
use crate::types::{ConversationKey, IdentityId, MessageId, Token};

/// Derive the canonical key of the conversation between `a` and `b`.
pub fn derive_key(a: &Token, b: &Token) -> ConversationKey {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };

    let mut key = String::with_capacity(first.as_str().len() + second.as_str().len() + 1);
    key.push_str(first.as_str());
    key.push(KEY_SEPARATOR);
    key.push_str(second.as_str());
    ConversationKey::from_raw(key)
}

/// Derive a key straight from two raw display names.
pub fn derive_key_for_names(a: &str, b: &str) -> ConversationKey {
    derive_key(&Token::normalize(a), &Token::normalize(b))
}

/// `conversations/{key}`
pub fn conversation_path(key: &ConversationKey) -> String {
    format!("{CONVERSATIONS_COLLECTION}/{key}")
}

/// `conversations/{key}/messages`
pub fn messages_path(key: &ConversationKey) -> String {
    format!("{CONVERSATIONS_COLLECTION}/{key}/{MESSAGES_COLLECTION}")
}

/// `conversations/{key}/messages/{id}`
pub fn message_path(key: &ConversationKey, id: &MessageId) -> String {
    format!("{CONVERSATIONS_COLLECTION}/{key}/{MESSAGES_COLLECTION}/{id}")
}

/// `identities/{id}`
pub fn identity_path(id: &IdentityId) -> String {
    format!("{IDENTITIES_COLLECTION}/{id}")
}
