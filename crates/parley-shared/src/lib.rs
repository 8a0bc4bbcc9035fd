//! # parley-shared
//!
//! Types shared by every Parley crate: identities, tokens, conversation keys
//! and the pure derivation that maps two participants onto one key.

pub mod constants;
pub mod conversation;
pub mod error;
pub mod identity;
pub mod types;

pub use conversation::{
    conversation_path, derive_key, derive_key_for_names, identity_path, message_path, messages_path,
};
pub use error::ValidationError;
pub use identity::Identity;
pub use types::{ConversationKey, IdentityId, MessageId, Token};
