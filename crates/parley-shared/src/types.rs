use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TOKEN_SEPARATOR;

// Stable identity id, assigned at account creation and never changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// Store-assigned message id, unique within a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Normalized form of a display name, used as one half of a conversation key.
///
/// Leading and trailing whitespace is dropped and every interior run of
/// whitespace becomes a single [`TOKEN_SEPARATOR`]. A blank display name
/// normalizes to the empty token; it is accepted here and rejected only at
/// send time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn normalize(display_name: &str) -> Self {
        let mut out = String::with_capacity(display_name.len());
        for (i, word) in display_name.split_whitespace().enumerate() {
            if i > 0 {
                out.push(TOKEN_SEPARATOR);
            }
            out.push_str(word);
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(display_name: &str) -> Self {
        Self::normalize(display_name)
    }
}

/// Canonical identifier of the thread between two tokens. Used verbatim as
/// the storage path segment of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Wrap an already-derived key, e.g. one read back from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_collapses_whitespace_runs() {
        assert_eq!(Token::normalize("Ana Ana").as_str(), "Ana_Ana");
        assert_eq!(Token::normalize("Ana \t\n  Ana").as_str(), "Ana_Ana");
        assert_eq!(Token::normalize("  Bob  ").as_str(), "Bob");
    }

    #[test]
    fn blank_display_name_is_empty_token() {
        assert!(Token::normalize("").is_empty());
        assert!(Token::normalize("   \t").is_empty());
    }

    #[test]
    fn token_is_idempotent() {
        let once = Token::normalize("Mary  Jane Watson");
        let twice = Token::normalize(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn ids_parse_from_display() {
        let id = IdentityId::new();
        let parsed: IdentityId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn token_serializes_as_plain_string() {
        let json = serde_json::to_string(&Token::normalize("Ana Ana")).unwrap();
        assert_eq!(json, "\"Ana_Ana\"");
    }
}
