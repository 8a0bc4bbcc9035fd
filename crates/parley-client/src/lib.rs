//! # parley-client
//!
//! Conversation lifecycle for two-party direct messages: the live view of one
//! conversation, the cascades that keep conversations attached to renamed or
//! deleted identities, and routing from a roster selection to a conversation.

pub mod config;
pub mod controller;
pub mod error;
pub mod propagator;
pub mod roster;
pub mod router;
pub mod state;
pub mod view;

#[cfg(test)]
mod test_support;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use controller::{MessageStreamController, StreamState};
pub use error::{ClientError, Result};
pub use propagator::{
    CascadeFailure, CascadeKind, CascadeOutcome, CascadeReport, CascadeStep,
    IdentityChangePropagator, ProfileUpdate,
};
pub use roster::{RosterCache, RosterListener};
pub use router::ConversationRouter;
pub use state::ClientState;
pub use view::{MessageDto, ViewMessage};

/// Install the fmt subscriber, filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parley_client=debug,parley_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Parley client logging initialised");
    }
}
