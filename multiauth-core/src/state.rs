//! Pending-login state
//!
//! A login started on `/<provider>/login` leaves a record keyed by the
//! `OAuth2` `state` token. The callback consumes it exactly once.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::provider::ProviderKey;
use crate::{Error, Result};

const STATE_TOKEN_LEN: usize = 32;
const MAX_PENDING_LOGINS: u64 = 100_000;

/// A login that has redirected to its identity provider and awaits the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub provider: ProviderKey,
    /// Callback URL presented at authorization time
    pub callback_url: String,
    pub next: String,
    pub created_at: DateTime<Utc>,
}

impl PendingLogin {
    /// Time since the browser was sent to the identity provider
    #[must_use]
    pub fn elapsed(&self) -> chrono::TimeDelta {
        Utc::now() - self.created_at
    }
}

/// TTL-bounded, single-use store of pending logins
#[derive(Clone)]
pub struct LoginStateStore {
    states: Arc<Cache<String, PendingLogin>>,
}

impl std::fmt::Debug for LoginStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginStateStore")
            .field("entries", &self.states.entry_count())
            .finish()
    }
}

impl LoginStateStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let states = Cache::builder()
            .max_capacity(MAX_PENDING_LOGINS)
            .time_to_live(ttl)
            .build();
        Self {
            states: Arc::new(states),
        }
    }

    /// Record a pending login and return its state token
    pub async fn issue(&self, provider: ProviderKey, callback_url: String, next: String) -> String {
        let token = nanoid::nanoid!(STATE_TOKEN_LEN);
        let pending = PendingLogin {
            provider,
            callback_url,
            next,
            created_at: Utc::now(),
        };
        self.states.insert(token.clone(), pending).await;
        debug!(provider = %provider, "Issued login state");
        token
    }

    /// Consume the pending login for `token`
    ///
    /// The record must belong to `provider`, the provider whose callback route
    /// the request arrived on. A record is consumed even when that check fails.
    pub async fn take(&self, token: &str, provider: ProviderKey) -> Result<PendingLogin> {
        let pending = self
            .states
            .remove(token)
            .await
            .ok_or_else(|| Error::InvalidInput("Invalid or expired login state".to_string()))?;

        if pending.provider != provider {
            return Err(Error::OAuthCallbackMismatch {
                provider,
                detail: format!("login state was issued for {}", pending.provider),
            });
        }
        Ok(pending)
    }
}
