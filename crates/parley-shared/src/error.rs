use thiserror::Error;

/// A locally rejected operation. Never reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text is empty")]
    EmptyText,

    #[error("Message text is too long: {len} characters (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Sender token is empty")]
    EmptyToken,

    #[error("No conversation is open")]
    NoConversationOpen,

    #[error("No identity is signed in")]
    NoCurrentIdentity,
}
