//! Rename and account-delete cascades.
//!
//! A conversation key embeds both participants' tokens, so a token change
//! strands every conversation built on the old one. The cascades find those
//! conversations by scanning the roster and then, per conversation:
//!
//! - rename: copy to the new key, delete the old messages, drop the old marker
//! - delete: delete the messages, drop the marker
//!
//! Conversations are handled independently and possibly concurrently. One
//! failing does not stop or undo the others; the run then ends in
//! [`ClientError::PartialCascade`] listing what failed. Copy is idempotent
//! by message id, so re-running a cascade after a partial failure is safe.
//! The identity record is only written or removed after every conversation
//! went through.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use parley_shared::{derive_key, ConversationKey, Identity, Token};
use parley_store::{ConversationStore, TouchingConversation};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeKind {
    Rename,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    Copy,
    DeleteMessages,
}

/// One conversation handled by a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub key: ConversationKey,
    /// New key for a rename; `None` for a delete.
    pub migrated_to: Option<ConversationKey>,
    pub messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeFailure {
    pub key: ConversationKey,
    pub step: CascadeStep,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub kind: CascadeKind,
    pub succeeded: Vec<CascadeOutcome>,
    pub failed: Vec<CascadeFailure>,
}

impl CascadeReport {
    fn new(kind: CascadeKind) -> Self {
        Self {
            kind,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn collect(
        kind: CascadeKind,
        results: Vec<std::result::Result<CascadeOutcome, CascadeFailure>>,
    ) -> Self {
        let mut report = Self::new(kind);
        for result in results {
            match result {
                Ok(outcome) => report.succeeded.push(outcome),
                Err(failure) => report.failed.push(failure),
            }
        }
        report.succeeded.sort_by(|a, b| a.key.cmp(&b.key));
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        report
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_keys(&self) -> Vec<&ConversationKey> {
        self.failed.iter().map(|f| &f.key).collect()
    }

    fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ClientError::PartialCascade(self))
        }
    }
}

impl fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} succeeded, {} failed",
            self.kind,
            self.succeeded.len(),
            self.failed.len()
        )?;
        for failure in &self.failed {
            write!(f, "; {} ({:?}): {}", failure.key, failure.step, failure.error)?;
        }
        Ok(())
    }
}

/// Outcome of [`IdentityChangePropagator::update_profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub identity: Identity,
    pub report: CascadeReport,
}

pub struct IdentityChangePropagator {
    store: Arc<dyn ConversationStore>,
    concurrency: usize,
}

impl IdentityChangePropagator {
    pub fn new(store: Arc<dyn ConversationStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    // ------------------------------------------------------------------
    // Rename
    // ------------------------------------------------------------------

    /// Move every conversation keyed on `old` to the matching key on `new`.
    ///
    /// Does not touch the identity record; see [`update_profile`].
    ///
    /// [`update_profile`]: Self::update_profile
    pub async fn on_rename(
        &self,
        identity: &Identity,
        old: &Token,
        new: &Token,
    ) -> Result<CascadeReport> {
        if old == new {
            debug!(id = %identity.id, token = %old, "token unchanged, nothing to migrate");
            return Ok(CascadeReport::new(CascadeKind::Rename));
        }

        let touching = self.store.conversations_touching(old).await?;
        info!(
            id = %identity.id,
            from = %old,
            to = %new,
            conversations = touching.len(),
            "starting rename cascade"
        );

        let results = stream::iter(touching)
            .map(|t| self.migrate(new, t))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = CascadeReport::collect(CascadeKind::Rename, results);
        log_report(&report);
        report.into_result()
    }

    async fn migrate(
        &self,
        new: &Token,
        conversation: TouchingConversation,
    ) -> std::result::Result<CascadeOutcome, CascadeFailure> {
        let TouchingConversation { key, other_token } = conversation;

        // Names are not unique: an `other_token` equal to the old token is usually
        // another person, so only our side of the key changes.
        let to = derive_key(new, &other_token);
        if to == key {
            return Ok(CascadeOutcome {
                key,
                migrated_to: None,
                messages: 0,
            });
        }

        let copied = self
            .store
            .copy_all_messages(&key, &to)
            .await
            .map_err(|e| failure(&key, CascadeStep::Copy, e))?;

        self.store
            .delete_all_messages(&key)
            .await
            .map_err(|e| failure(&key, CascadeStep::DeleteMessages, e))?;

        self.drop_marker(&key).await;

        debug!(from = %key, to = %to, copied, "conversation migrated");
        Ok(CascadeOutcome {
            key,
            migrated_to: Some(to),
            messages: copied,
        })
    }

    /// Rename `identity` and/or change its avatar.
    ///
    /// When the token changes the rename cascade runs first; the identity
    /// record is only rewritten if it completed.
    pub async fn update_profile(
        &self,
        identity: &Identity,
        display_name: &str,
        avatar_ref: Option<String>,
    ) -> Result<ProfileUpdate> {
        let updated = Identity {
            id: identity.id,
            display_name: display_name.to_string(),
            avatar_ref,
        };

        let report = self
            .on_rename(identity, &identity.token(), &updated.token())
            .await?;
        self.store.put_identity(&updated).await?;

        info!(id = %updated.id, token = %updated.token(), "profile updated");
        Ok(ProfileUpdate {
            identity: updated,
            report,
        })
    }

    // ------------------------------------------------------------------
    // Account deletion
    // ------------------------------------------------------------------

    /// Delete every conversation keyed on `token`, then the identity record.
    ///
    /// If any conversation fails the record stays, so the account remains
    /// usable and the cascade can be run again.
    pub async fn on_account_delete(
        &self,
        identity: &Identity,
        token: &Token,
    ) -> Result<CascadeReport> {
        let touching = self.store.conversations_touching(token).await?;
        info!(
            id = %identity.id,
            token = %token,
            conversations = touching.len(),
            "starting delete cascade"
        );

        let results = stream::iter(touching)
            .map(|t| self.destroy(t.key))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = CascadeReport::collect(CascadeKind::Delete, results);
        log_report(&report);
        let report = report.into_result()?;

        self.store.remove_identity(&identity.id).await?;
        info!(id = %identity.id, "identity record removed");
        Ok(report)
    }

    async fn destroy(
        &self,
        key: ConversationKey,
    ) -> std::result::Result<CascadeOutcome, CascadeFailure> {
        let removed = self
            .store
            .delete_all_messages(&key)
            .await
            .map_err(|e| failure(&key, CascadeStep::DeleteMessages, e))?;

        self.drop_marker(&key).await;

        debug!(key = %key, removed, "conversation deleted");
        Ok(CascadeOutcome {
            key,
            migrated_to: None,
            messages: removed,
        })
    }

    async fn drop_marker(&self, key: &ConversationKey) {
        if let Err(e) = self.store.delete_conversation_marker(key).await {
            warn!(key = %key, error = %e, "could not delete conversation marker");
        }
    }
}

fn failure(key: &ConversationKey, step: CascadeStep, error: impl fmt::Display) -> CascadeFailure {
    warn!(key = %key, step = ?step, error = %error, "cascade step failed");
    CascadeFailure {
        key: key.clone(),
        step,
        error: error.to_string(),
    }
}

fn log_report(report: &CascadeReport) {
    if report.is_complete() {
        info!(kind = ?report.kind, conversations = report.succeeded.len(), "cascade complete");
    } else {
        warn!(
            kind = ?report.kind,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "cascade partially failed"
        );
    }
}
