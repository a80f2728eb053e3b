//! Session registry: the single point of mutation for sessions.
//!
//! A [`SessionLease`] is the mutable session reference handed to the dispatcher.
//! While a lease is alive no other event for the same user can check the session
//! out, so read-modify-write cycles for one user are serialized. Users never
//! block each other.

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    session::{Session, UserId},
    storage::SessionStore,
};

pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Lock the user's session (creating it on first sight) and hand it out.
    pub async fn checkout(&self, user_id: &UserId) -> Result<SessionLease> {
        let lock = self
            .locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        let session = self.store.get_or_create(user_id).await?;
        Ok(SessionLease {
            session,
            store: self.store.clone(),
            _guard: guard,
        })
    }

    /// Evict sessions idle for longer than `idle_ttl` and forget unused locks.
    pub async fn evict_idle(&self, idle_ttl: Duration) -> Result<usize> {
        let Some(cutoff) = TimeDelta::from_std(idle_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return Ok(0);
        };

        let evicted = self.store.evict_idle(cutoff).await?;
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(evicted)
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Run [`SessionRegistry::evict_idle`] every `interval` until the task is aborted.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration, idle_ttl: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.evict_idle(idle_ttl).await {
                    Ok(0) => debug!("session reaper found nothing to evict"),
                    Ok(evicted) => info!(evicted, "session reaper evicted idle sessions"),
                    Err(e) => warn!(error = %e, "session reaper failed"),
                }
            }
        })
    }
}

/// Exclusive, mutable access to one user's session.
///
/// Changes are only persisted by [`SessionLease::commit`]; dropping the lease
/// discards them and releases the user's lock.
pub struct SessionLease {
    session: Session,
    store: Arc<dyn SessionStore>,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLease {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub async fn commit(mut self) -> Result<()> {
        self.session.touch();
        self.store.save(self.session).await
    }
}
