//! Multi-provider dispatcher
//!
//! Façade the HTTP layer talks to. It flattens every enabled provider's
//! handlers into one route table and forwards each request to the provider
//! that owns it. Nothing request-specific is stored here; one instance is
//! shared by every concurrent login.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::metrics::{self, Outcome};
use crate::provider::{
    AuthRequest, HandlerKind, HandlerRef, Identity, ProviderKey, CALLBACK_HANDLER, LOGIN_HANDLER,
};
use crate::registry::ProviderRegistry;
use crate::router::{CallbackRouter, HandlerContext, ResolvedProvider};
use crate::{Error, Result};

/// Path of the provider chooser, relative to the hub prefix
pub const CHOOSER_PATH: &str = "/login";

/// What a registered path serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Chooser,
    Provider(HandlerRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Path relative to the hub prefix
    pub path: String,
    pub target: RouteTarget,
}

/// Read-only path table built from the enabled providers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<RouteTarget> {
        self.routes
            .iter()
            .find(|route| route.path == path)
            .map(|route| route.target)
    }

    fn push(&mut self, path: String, target: RouteTarget) -> Result<()> {
        if self.get(&path).is_some() {
            return Err(Error::Configuration(format!("Duplicate route: {path}")));
        }
        self.routes.push(Route { path, target });
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

/// Phase of one login attempt
///
/// Not stored anywhere: each request reconstructs it from its route and the
/// state token it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Choosing,
    Redirected,
    AwaitingCallback,
    Authenticated,
    Denied,
    Failed,
}

impl AttemptState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Choosing => "choosing",
            Self::Redirected => "redirected",
            Self::AwaitingCallback => "awaiting_callback",
            Self::Authenticated => "authenticated",
            Self::Denied => "denied",
            Self::Failed => "failed",
        }
    }
}

/// Parameters the identity provider sent back to the callback
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackData<'a> {
    pub code: Option<&'a str>,
    pub error: Option<&'a str>,
    /// Callback URL presented at authorization time; resolved afresh when unset
    pub redirect_uri: Option<&'a str>,
}

/// One entry of the chooser page
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProviderChoice {
    pub key: ProviderKey,
    pub name: &'static str,
    pub field: &'static str,
    pub enabled: bool,
    pub login_url: String,
}

#[derive(Debug, Clone)]
pub struct MultiProviderDispatcher {
    registry: Arc<ProviderRegistry>,
    router: CallbackRouter,
    base_url: String,
    exchange_timeout: Duration,
}

impl MultiProviderDispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        base_url: impl Into<String>,
        exchange_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            router: CallbackRouter::new(registry.clone(), base_url.clone()),
            registry,
            base_url,
            exchange_timeout,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn router(&self) -> &CallbackRouter {
        &self.router
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Route table: the chooser, then each enabled provider's login and callback
    ///
    /// Every adapter must expose exactly the native login and callback
    /// handlers; they are re-registered under `/<segment>/login` and
    /// `/<segment>/callback`.
    pub fn handlers(&self) -> Result<RouteTable> {
        let mut table = RouteTable::default();
        table.push(CHOOSER_PATH.to_string(), RouteTarget::Chooser)?;

        for key in self.registry.enabled_keys() {
            let adapter = self.registry.get(key)?;
            let handlers = adapter.handlers();

            let native_pair = handlers.len() == 2
                && handlers.get(LOGIN_HANDLER) == Some(&HandlerKind::Login)
                && handlers.get(CALLBACK_HANDLER) == Some(&HandlerKind::Callback);
            if !native_pair {
                let found: Vec<&str> = handlers.keys().copied().collect();
                return Err(Error::Configuration(format!(
                    "Provider {key} must expose exactly {LOGIN_HANDLER} and {CALLBACK_HANDLER}, found {found:?}"
                )));
            }

            for kind in handlers.values() {
                let path = format!("/{}/{}", key.path_segment(), kind.route_suffix());
                let handler = HandlerRef {
                    provider: key,
                    kind: *kind,
                };
                table.push(path, RouteTarget::Provider(handler))?;
            }
        }

        Ok(table)
    }

    /// Resolve the provider, credentials and callback URL for a handler request
    pub fn get_callback_url(&self, ctx: Option<&HandlerContext>) -> Result<ResolvedProvider> {
        let ctx = ctx.ok_or(Error::InvalidHandler)?;
        self.router.callback_url(ctx).map_err(|e| match e {
            Error::AmbiguousOrUnknownHandler(detail) => Error::UnroutableRequest(detail),
            other => other,
        })
    }

    /// Finish a login on the provider that owns `ctx`
    ///
    /// `Ok(None)` means the user did not complete the login. Provider errors
    /// are returned unchanged after being logged with the provider key.
    pub async fn authenticate(
        &self,
        ctx: &HandlerContext,
        data: CallbackData<'_>,
    ) -> Result<Option<Identity>> {
        let resolved = self.get_callback_url(Some(ctx))?;
        let provider = resolved.key;
        let redirect_uri = data.redirect_uri.unwrap_or(&resolved.callback_url);

        let request = AuthRequest {
            code: data.code,
            error: data.error,
            redirect_uri,
            credentials: &resolved.credentials,
        };

        let result = match tokio::time::timeout(
            self.exchange_timeout,
            resolved.adapter.authenticate(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::ProviderTimeout {
                provider,
                timeout: self.exchange_timeout,
            }),
        };

        match &result {
            Ok(Some(identity)) => {
                metrics::record_authentication(provider.as_str(), Outcome::Success);
                info!(
                    provider = %provider,
                    user = %identity.username,
                    state = AttemptState::Authenticated.as_str(),
                    "User authenticated"
                );
            }
            Ok(None) => {
                metrics::record_authentication(provider.as_str(), Outcome::Denied);
                warn!(
                    provider = %provider,
                    state = AttemptState::Denied.as_str(),
                    "Login was not completed at the identity provider"
                );
            }
            Err(e) => {
                let outcome = if matches!(e, Error::ProviderTimeout { .. }) {
                    Outcome::Timeout
                } else {
                    Outcome::Failed
                };
                metrics::record_authentication(provider.as_str(), outcome);
                error!(
                    provider = %provider,
                    state = AttemptState::Failed.as_str(),
                    error = %e,
                    "Authentication failed"
                );
            }
        }

        result
    }

    /// Provider picked on the chooser form
    ///
    /// The first enabled provider, in configuration order, whose
    /// `login_<key>` field is present and non-empty.
    pub fn select_provider<'a, F>(&self, field: F) -> Option<ProviderKey>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.registry
            .enabled_keys()
            .into_iter()
            .find(|key| field(key.login_field()).is_some_and(|value| !value.is_empty()))
    }

    /// Every provider kind with its enabled flag, for the chooser page
    #[must_use]
    pub fn provider_choices(&self) -> Vec<ProviderChoice> {
        ProviderKey::ALL
            .into_iter()
            .map(|key| ProviderChoice {
                key,
                name: key.display_name(),
                field: key.login_field(),
                enabled: self.registry.is_enabled(key),
                login_url: format!(
                    "{}{}/{}",
                    self.base_url,
                    key.path_segment(),
                    HandlerKind::Login.route_suffix()
                ),
            })
            .collect()
    }
}
