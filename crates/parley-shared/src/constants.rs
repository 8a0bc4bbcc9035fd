/// Character that replaces each run of whitespace in a display name
pub const TOKEN_SEPARATOR: char = '_';

/// Character placed between the two sorted tokens of a conversation key
pub const KEY_SEPARATOR: char = '_';

/// Top-level collection holding one entry per conversation key
pub const CONVERSATIONS_COLLECTION: &str = "conversations";

/// Sub-collection of a conversation holding its messages
pub const MESSAGES_COLLECTION: &str = "messages";

/// Top-level collection holding one record per registered identity
pub const IDENTITIES_COLLECTION: &str = "identities";

/// Maximum message length in characters unless configured otherwise
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4096;

/// Conversations migrated or deleted concurrently by one cascade run
pub const DEFAULT_CASCADE_CONCURRENCY: usize = 4;
