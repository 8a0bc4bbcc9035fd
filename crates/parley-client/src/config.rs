//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration for local development.

use std::path::PathBuf;

use parley_shared::constants::{DEFAULT_CASCADE_CONCURRENCY, DEFAULT_MAX_MESSAGE_CHARS};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// SQLite database file.
    /// Env: `PARLEY_DB_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Conversations a rename or delete cascade processes at once.
    /// Env: `PARLEY_CASCADE_CONCURRENCY`
    /// Default: `4`
    pub cascade_concurrency: usize,

    /// Longest accepted message, in characters.
    /// Env: `PARLEY_SEND_MAX_CHARS`
    /// Default: `4096`
    pub max_message_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cascade_concurrency: DEFAULT_CASCADE_CONCURRENCY,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("PARLEY_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("PARLEY_CASCADE_CONCURRENCY") {
            match val.parse::<usize>() {
                Ok(n) if n >= 1 => config.cascade_concurrency = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid PARLEY_CASCADE_CONCURRENCY, using default"
                ),
            }
        }

        if let Some(val) = lookup("PARLEY_SEND_MAX_CHARS") {
            match val.parse::<usize>() {
                Ok(n) if n >= 1 => config.max_message_chars = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid PARLEY_SEND_MAX_CHARS, using default"
                ),
            }
        }

        config
    }
}
