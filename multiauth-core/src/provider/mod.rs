//! `OAuth2` provider adapters
//!
//! # Architecture
//!
//! 1. **Provider Key**: closed set of provider kinds the hub can route to
//! 2. **Adapter Trait**: the capability set the dispatcher needs from one provider
//! 3. **Factory Pattern**: configuration names an adapter type, the factory builds it
//!
//! Adapters never hold per-request state. Anything that identifies the flow in
//! progress (state token, redirect URI, credentials) is passed in explicitly.

pub mod github;
pub mod gitlab;
pub mod google;
pub mod oauth;

pub use github::github_factory;
pub use gitlab::gitlab_factory;
pub use google::google_factory;
pub use oauth::{OAuth2Adapter, OAuth2Endpoints};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ProviderSettings;
use crate::{Error, Result};

// ============================================================================
// Provider Key
// ============================================================================

/// Identifies a configured provider kind
///
/// The string form doubles as the URL path segment (`/google/login`) and as
/// the suffix of the chooser form field (`login_google`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKey {
    Google,
    Github,
    Gitlab,
}

impl ProviderKey {
    /// Every provider kind, in the default configuration order
    pub const ALL: [Self; 3] = [Self::Google, Self::Github, Self::Gitlab];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Gitlab => "gitlab",
        }
    }

    /// URL path segment the provider's handlers are mounted under
    #[must_use]
    pub const fn path_segment(&self) -> &'static str {
        self.as_str()
    }

    /// Chooser form field that selects this provider
    #[must_use]
    pub const fn login_field(&self) -> &'static str {
        match self {
            Self::Google => "login_google",
            Self::Github => "login_github",
            Self::Gitlab => "login_gitlab",
        }
    }

    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Github => "GitHub",
            Self::Gitlab => "GitLab",
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            other => Err(Error::UnknownRoute(format!("no provider named '{other}'"))),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Native key of an adapter's login handler
pub const LOGIN_HANDLER: &str = "/oauth_login";

/// Native key of an adapter's callback handler
pub const CALLBACK_HANDLER: &str = "/oauth_callback";

/// The two halves of an `OAuth2` handshake an adapter serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Redirects the browser to the identity provider
    Login,
    /// Receives the identity provider's redirect back
    Callback,
}

impl HandlerKind {
    /// Path suffix the dispatcher mounts this handler under
    #[must_use]
    pub const fn route_suffix(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Callback => "callback",
        }
    }
}

/// Adapter handler map: native handler key -> handler kind
pub type HandlerMap = IndexMap<&'static str, HandlerKind>;

/// Handler map every `OAuth2`-shaped adapter exposes
#[must_use]
pub fn oauth_handlers() -> HandlerMap {
    let mut handlers = IndexMap::new();
    handlers.insert(LOGIN_HANDLER, HandlerKind::Login);
    handlers.insert(CALLBACK_HANDLER, HandlerKind::Callback);
    handlers
}

/// A handler bound to the provider that owns it
///
/// Set once when the route is registered; routing a request back to its
/// provider is a lookup on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef {
    pub provider: ProviderKey,
    pub kind: HandlerKind,
}

impl HandlerRef {
    #[must_use]
    pub const fn login(provider: ProviderKey) -> Self {
        Self {
            provider,
            kind: HandlerKind::Login,
        }
    }

    #[must_use]
    pub const fn callback(provider: ProviderKey) -> Self {
        Self {
            provider,
            kind: HandlerKind::Callback,
        }
    }
}

// ============================================================================
// Credentials & Identity
// ============================================================================

/// `OAuth2` client identity registered with an identity provider
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl From<&ProviderSettings> for OAuthCredentials {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            scopes: settings.scopes.clone(),
        }
    }
}

/// Authenticated user as reported by an identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub provider: ProviderKey,
    pub provider_user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    /// Raw profile as returned by the provider
    #[serde(default)]
    pub claims: serde_json::Value,
}

/// Everything a provider needs to finish one handshake
///
/// Built per request; `credentials` are the ones resolved for this request,
/// not read back from any shared location.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub code: Option<&'a str>,
    /// Error reported by the identity provider on the redirect back
    pub error: Option<&'a str>,
    /// Callback URL presented at authorization time
    pub redirect_uri: &'a str,
    pub credentials: &'a OAuthCredentials,
}

// ============================================================================
// Adapter Trait
// ============================================================================

/// Capability set of one configured identity provider
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn key(&self) -> ProviderKey;

    /// Hub-relative path that starts this provider's login
    fn login_url(&self, base_url: &str) -> String {
        format!(
            "{}{}/{}",
            base_url,
            self.key().path_segment(),
            HandlerKind::Login.route_suffix()
        )
    }

    /// Explicitly configured callback URL, if any
    fn callback_url(&self) -> Option<&str>;

    fn credentials(&self) -> &OAuthCredentials;

    fn handlers(&self) -> HandlerMap {
        oauth_handlers()
    }

    /// Build the identity provider's authorization URL
    fn authorize_url(
        &self,
        state: &str,
        redirect_uri: &str,
        credentials: &OAuthCredentials,
    ) -> Result<String>;

    /// Finish the handshake
    ///
    /// Returns `Ok(None)` when the user did not complete the login (for example
    /// consent was denied); errors are reserved for actual failures.
    async fn authenticate(&self, request: AuthRequest<'_>) -> Result<Option<Identity>>;
}

// ============================================================================
// Factory Pattern
// ============================================================================

/// Builds an adapter from its settings
pub type AdapterFactory =
    Arc<dyn Fn(ProviderKey, &ProviderSettings) -> Result<Arc<dyn ProviderAdapter>> + Send + Sync>;

/// Look up a built-in adapter factory by its type name
///
/// Type names are what `*_adapter_type` configuration options refer to.
#[must_use]
pub fn builtin_factory(adapter_type: &str) -> Option<AdapterFactory> {
    match adapter_type {
        "google" => Some(Arc::new(google_factory) as AdapterFactory),
        "github" => Some(Arc::new(github_factory) as AdapterFactory),
        "gitlab" => Some(Arc::new(gitlab_factory) as AdapterFactory),
        _ => None,
    }
}
