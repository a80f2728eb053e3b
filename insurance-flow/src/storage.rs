use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::Result,
    session::{Session, UserId},
};

/// Trait for storing and retrieving per-user sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the session for `user_id`, creating an `Idle` one on first sight.
    /// Concurrent calls for the same identity must never create two records.
    async fn get_or_create(&self, user_id: &UserId) -> Result<Session>;
    async fn get(&self, user_id: &UserId) -> Result<Option<Session>>;
    async fn save(&self, session: Session) -> Result<()>;
    async fn remove(&self, user_id: &UserId) -> Result<()>;
    /// Drop every session whose last activity is older than `cutoff`.
    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    async fn len(&self) -> Result<usize>;
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<UserId, Session>>,
    max_sessions: Option<usize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: None,
        }
    }

    /// Bound the number of retained sessions; the least recently active ones go first.
    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: Some(max_sessions.max(1)),
        }
    }

    fn enforce_limit(&self, keep: &UserId) -> usize {
        let Some(max) = self.max_sessions else {
            return 0;
        };
        let overflow = self.sessions.len().saturating_sub(max);
        if overflow == 0 {
            return 0;
        }

        let mut candidates: Vec<(UserId, DateTime<Utc>)> = self
            .sessions
            .iter()
            .filter(|entry| entry.key() != keep)
            .map(|entry| (entry.key().clone(), entry.value().last_activity()))
            .collect();
        candidates.sort_by_key(|(_, last_activity)| *last_activity);

        let mut evicted = 0;
        for (user_id, _) in candidates.into_iter().take(overflow) {
            if self.sessions.remove(&user_id).is_some() {
                evicted += 1;
            }
        }
        debug!(evicted, max, "session cap reached, evicted least recently active");
        evicted
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, user_id: &UserId) -> Result<Session> {
        let (session, created) = match self.sessions.entry(user_id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                debug!(user_id = %user_id, "creating session");
                let session = Session::new(user_id.clone());
                entry.insert(session.clone());
                (session, true)
            }
        };

        if created {
            self.enforce_limit(user_id);
        }
        Ok(session)
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<Session>> {
        Ok(self.sessions.get(user_id).map(|entry| entry.clone()))
    }

    async fn save(&self, session: Session) -> Result<()> {
        let user_id = session.user_id().clone();
        self.sessions.insert(user_id.clone(), session);
        self.enforce_limit(&user_id);
        Ok(())
    }

    async fn remove(&self, user_id: &UserId) -> Result<()> {
        self.sessions.remove(user_id);
        Ok(())
    }

    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_activity() >= cutoff);
        Ok(before.saturating_sub(self.sessions.len()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}
