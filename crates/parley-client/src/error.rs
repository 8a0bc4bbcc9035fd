use thiserror::Error;

use parley_shared::ValidationError;
use parley_store::StoreError;

use crate::propagator::CascadeReport;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; nothing was sent to the store.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The store failed a read or write. For an append, the message may
    /// still have been written.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Some conversations of a cascade failed. Those that succeeded are not
    /// rolled back.
    #[error("Cascade partially failed: {0}")]
    PartialCascade(CascadeReport),
}

impl ClientError {
    /// Whether the same operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Validation(_) => false,
            ClientError::StoreUnavailable(e) => e.is_transient(),
            ClientError::PartialCascade(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
