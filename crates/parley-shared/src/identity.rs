use serde::{Deserialize, Serialize};

use crate::types::{IdentityId, Token};

/// A registered user as seen in the roster.
///
/// `id` never changes. `display_name` is mutable and NOT unique across the
/// roster, which is why two people may end up sharing a [`Token`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub display_name: String,
    /// URL of the avatar image, as returned by the blob store.
    pub avatar_ref: Option<String>,
}

impl Identity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: IdentityId::new(),
            display_name: display_name.into(),
            avatar_ref: None,
        }
    }

    /// Normalized display name used for conversation keys.
    pub fn token(&self) -> Token {
        Token::normalize(&self.display_name)
    }

    pub fn with_display_name(&self, display_name: impl Into<String>) -> Self {
        Self {
            id: self.id,
            display_name: display_name.into(),
            avatar_ref: self.avatar_ref.clone(),
        }
    }
}
