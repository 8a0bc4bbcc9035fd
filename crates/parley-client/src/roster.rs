//! Process-wide roster cache.
//!
//! One store subscription feeds every component that needs identity state.
//! Reads go through the cache and pick up any change the store has pushed
//! since the last read. Registered [`RosterListener`]s are told about each
//! change exactly once, either when a read pulls it in or, without any
//! reader, as soon as it arrives if a task is driving [`RosterCache::run`].

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::watch;
use tracing::debug;

use parley_shared::{Identity, IdentityId};
use parley_store::ConversationStore;

use crate::error::Result;

pub trait RosterListener: Send + Sync {
    fn on_roster_changed(&self, roster: &[Identity]);
}

pub struct RosterCache {
    rx: Mutex<watch::Receiver<Vec<Identity>>>,
    identities: RwLock<Vec<Identity>>,
    current: RwLock<Option<IdentityId>>,
    listeners: Mutex<Vec<Arc<dyn RosterListener>>>,
}

impl RosterCache {
    /// Subscribe to the roster once and seed the cache.
    ///
    /// `current` is the signed-in identity as reported by the session layer.
    pub async fn connect(store: &dyn ConversationStore, current: Option<IdentityId>) -> Result<Self> {
        let mut rx = store.watch_identities().await?;
        let identities = rx.borrow_and_update().clone();

        debug!(count = identities.len(), "roster cache connected");

        Ok(Self {
            rx: Mutex::new(rx),
            identities: RwLock::new(identities),
            current: RwLock::new(current),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn RosterListener>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    /// Record a sign-in or sign-out.
    pub fn set_current(&self, id: Option<IdentityId>) {
        if let Ok(mut current) = self.current.write() {
            *current = id;
        }
    }

    pub fn current_id(&self) -> Option<IdentityId> {
        self.current.read().ok().and_then(|c| *c)
    }

    /// Pull a pending roster change into the cache. Returns `true` if the
    /// cache changed.
    pub fn refresh(&self) -> bool {
        let updated = {
            let Ok(mut rx) = self.rx.lock() else {
                return false;
            };
            if !rx.has_changed().unwrap_or(false) {
                return false;
            }
            let snapshot = rx.borrow_and_update().clone();
            snapshot
        };

        if let Ok(mut identities) = self.identities.write() {
            *identities = updated.clone();
        }
        debug!(count = updated.len(), "roster cache refreshed");

        let listeners = match self.listeners.lock() {
            Ok(l) => l.clone(),
            Err(_) => return true,
        };
        for listener in listeners {
            listener.on_roster_changed(&updated);
        }
        true
    }

    /// Wait until the store pushes a roster change, then apply it.
    /// Returns `false` once the store has dropped the roster feed.
    pub async fn next_change(&self) -> bool {
        let mut rx = {
            let Ok(guard) = self.rx.lock() else {
                return false;
            };
            guard.clone()
        };
        if rx.changed().await.is_err() {
            return false;
        }
        self.refresh();
        true
    }

    /// Push every roster change to the listeners as it arrives. Returns
    /// once the store drops the roster feed; spawn it next to the cache.
    pub async fn run(&self) {
        while self.next_change().await {}
        debug!("roster feed closed");
    }

    pub fn all_identities(&self) -> Vec<Identity> {
        self.refresh();
        self.identities
            .read()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &IdentityId) -> Option<Identity> {
        self.all_identities().into_iter().find(|i| &i.id == id)
    }

    pub fn current_identity(&self) -> Option<Identity> {
        let id = self.current_id()?;
        self.get(&id)
    }

    /// Everyone but the signed-in identity.
    pub fn others(&self) -> Vec<Identity> {
        let current = self.current_id();
        self.all_identities()
            .into_iter()
            .filter(|i| Some(i.id) != current)
            .collect()
    }
}
