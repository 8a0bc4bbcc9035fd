//! Maps a roster selection onto a conversation key.

use std::sync::Arc;

use tracing::debug;

use parley_shared::{derive_key, ConversationKey, Identity, ValidationError};
use parley_store::ConversationStore;

use crate::controller::MessageStreamController;
use crate::error::Result;
use crate::roster::RosterCache;

pub struct ConversationRouter {
    roster: Arc<RosterCache>,
    store: Arc<dyn ConversationStore>,
}

impl ConversationRouter {
    pub fn new(roster: Arc<RosterCache>, store: Arc<dyn ConversationStore>) -> Self {
        Self { roster, store }
    }

    /// Key of the conversation between the signed-in identity and `other`.
    pub fn key_with(&self, other: &Identity) -> Result<ConversationKey> {
        let me = self
            .roster
            .current_identity()
            .ok_or(ValidationError::NoCurrentIdentity)?;
        Ok(derive_key(&me.token(), &other.token()))
    }

    pub async fn open_conversation_with(
        &self,
        controller: &mut MessageStreamController,
        other: &Identity,
    ) -> Result<ConversationKey> {
        let key = self.key_with(other)?;
        debug!(other = %other.id, key = %key, "routing to conversation");
        controller.open(key.clone()).await?;
        Ok(key)
    }

    /// Other roster identities the signed-in identity already talks to.
    pub async fn active_conversations(&self) -> Result<Vec<Identity>> {
        let Some(me) = self.roster.current_identity() else {
            return Ok(Vec::new());
        };
        let mine = me.token();

        let mut active = Vec::new();
        for other in self.roster.others() {
            let key = derive_key(&mine, &other.token());
            if self.store.conversation_exists(&key).await? {
                active.push(other);
            }
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use parley_store::{OutgoingMessage, SqliteConversationStore};

    use super::*;
    use crate::controller::StreamState;
    use crate::error::ClientError;

    struct Fixture {
        store: Arc<SqliteConversationStore>,
        roster: Arc<RosterCache>,
        router: ConversationRouter,
        ana: Identity,
        bob: Identity,
        cy: Identity,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(SqliteConversationStore::open_in_memory().unwrap());
        let ana = Identity::new("Ana Ana");
        let bob = Identity::new("Bob");
        let cy = Identity::new("Cy");
        for identity in [&ana, &bob, &cy] {
            store.put_identity(identity).await.unwrap();
        }
        let roster = Arc::new(
            RosterCache::connect(store.as_ref(), Some(ana.id))
                .await
                .unwrap(),
        );
        let router = ConversationRouter::new(roster.clone(), store.clone());
        Fixture {
            store,
            roster,
            router,
            ana,
            bob,
            cy,
        }
    }

    #[tokio::test]
    async fn opens_the_derived_key() {
        let f = fixture().await;
        let mut controller = MessageStreamController::new(f.store.clone(), f.roster.clone(), 4096);

        let key = f
            .router
            .open_conversation_with(&mut controller, &f.bob)
            .await
            .unwrap();
        assert_eq!(key.as_str(), "Ana_Ana_Bob");
        assert_eq!(controller.state(), StreamState::Live);
        assert_eq!(controller.key(), Some(&key));

        // Bob routing to Ana lands on the same key.
        f.roster.set_current(Some(f.bob.id));
        assert_eq!(f.router.key_with(&f.ana).unwrap(), key);
    }

    #[tokio::test]
    async fn requires_a_signed_in_identity() {
        let f = fixture().await;
        f.roster.set_current(None);
        let mut controller = MessageStreamController::new(f.store.clone(), f.roster.clone(), 4096);

        let err = f
            .router
            .open_conversation_with(&mut controller, &f.bob)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::NoCurrentIdentity)
        ));
        assert_eq!(controller.state(), StreamState::Closed);
        assert!(f.router.active_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn active_conversations_lists_existing_only() {
        let f = fixture().await;
        assert!(f.router.active_conversations().await.unwrap().is_empty());

        let key = derive_key(&f.ana.token(), &f.cy.token());
        f.store
            .append(
                &key,
                OutgoingMessage {
                    text: "hey".into(),
                    sender_token: f.cy.token(),
                },
            )
            .await
            .unwrap();

        assert_eq!(f.router.active_conversations().await.unwrap(), vec![f.cy.clone()]);
    }
}
