//! In-memory login sessions
//!
//! Sessions are keyed by an opaque cookie token. A session that is looked up
//! and refreshed keeps its user; expiry is time-to-idle based.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::provider::Identity;

const SESSION_TOKEN_LEN: usize = 48;
const MAX_SESSIONS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Cache<String, Session>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("entries", &self.sessions.entry_count())
            .finish()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(ttl)
            .build();
        Self {
            sessions: Arc::new(sessions),
        }
    }

    /// Start a session for `identity` and return its token
    pub async fn create(&self, identity: Identity) -> String {
        let token = nanoid::nanoid!(SESSION_TOKEN_LEN);
        let session = Session {
            identity,
            created_at: Utc::now(),
        };
        self.sessions.insert(token.clone(), session).await;
        token
    }

    /// Current user of a session, extending its lifetime
    pub async fn get(&self, token: &str) -> Option<Session> {
        // A read resets moka's idle timer
        self.sessions.get(token).await
    }
}
