//! Callback routing
//!
//! Maps an inbound request to the one provider that owns it. Resolution
//! results are request-scoped values handed back to the caller; the router
//! itself holds no per-request state and is shared by all concurrent requests.

use std::sync::Arc;
use tracing::debug;

use crate::provider::{HandlerKind, HandlerRef, OAuthCredentials, ProviderAdapter, ProviderKey};
use crate::registry::ProviderRegistry;
use crate::{Error, Result};

/// Scheme and host the client used to reach the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// `scheme://host` prefix for absolute URLs
    #[must_use]
    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// One inbound request as seen by a provider handler
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub handler: HandlerRef,
    pub origin: RequestOrigin,
    /// Full request path, hub prefix included, without query
    pub path: String,
}

impl HandlerContext {
    pub fn new(handler: HandlerRef, origin: RequestOrigin, path: impl Into<String>) -> Self {
        Self {
            handler,
            origin,
            path: path.into(),
        }
    }
}

/// The provider that owns one request, with the credentials for its exchange
///
/// Produced by callback-URL resolution and passed down explicitly; every
/// request gets its own copy.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub key: ProviderKey,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub credentials: OAuthCredentials,
    pub callback_url: String,
}

impl ResolvedProvider {
    /// Identity provider authorization URL for this request
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        self.adapter
            .authorize_url(state, &self.callback_url, &self.credentials)
    }
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("key", &self.key)
            .field("credentials", &self.credentials)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

/// Resolves requests to their owning provider
#[derive(Debug, Clone)]
pub struct CallbackRouter {
    registry: Arc<ProviderRegistry>,
    base_url: String,
}

impl CallbackRouter {
    /// `base_url` is the normalized hub prefix (`/hub/`)
    pub fn new(registry: Arc<ProviderRegistry>, base_url: impl Into<String>) -> Self {
        Self {
            registry,
            base_url: base_url.into(),
        }
    }

    /// Resolve a provider login or callback path
    ///
    /// Accepts the path with or without the hub prefix.
    pub fn resolve_from_path(&self, path: &str) -> Result<ProviderKey> {
        let hub_prefix = self.base_url.trim_end_matches('/');
        let relative = path
            .strip_prefix(hub_prefix)
            .filter(|rest| rest.starts_with('/'))
            .unwrap_or(path);

        let mut segments = relative.trim_start_matches('/').split('/');
        let (Some(segment), Some(suffix), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(Error::UnknownRoute(path.to_string()));
        };
        let known_suffix = [HandlerKind::Login, HandlerKind::Callback]
            .iter()
            .any(|kind| kind.route_suffix() == suffix);
        if !known_suffix {
            return Err(Error::UnknownRoute(path.to_string()));
        }

        if let Some(key) = self
            .registry
            .enabled_keys()
            .into_iter()
            .find(|key| key.path_segment() == segment)
        {
            return Ok(key);
        }

        match segment.parse::<ProviderKey>() {
            Ok(key) if self.registry.registered_keys().contains(&key) => {
                Err(Error::ProviderDisabled(key))
            }
            _ => Err(Error::UnknownRoute(path.to_string())),
        }
    }

    /// Resolve the provider a handler is bound to
    pub fn resolve_from_handler(&self, handler: &HandlerRef) -> Result<ProviderKey> {
        self.registry
            .enabled_keys()
            .into_iter()
            .find(|key| *key == handler.provider)
            .ok_or_else(|| {
                Error::AmbiguousOrUnknownHandler(format!(
                    "{} handler for {}",
                    handler.kind.route_suffix(),
                    handler.provider
                ))
            })
    }

    /// Resolve the owning provider, its credentials and its callback URL
    pub fn callback_url(&self, ctx: &HandlerContext) -> Result<ResolvedProvider> {
        let key = self.resolve_from_handler(&ctx.handler)?;
        let adapter = self.registry.get(key)?;
        let credentials = adapter.credentials().clone();

        let callback_url = match adapter.callback_url() {
            Some(configured) => configured.to_string(),
            None => synthesize_callback_url(&ctx.origin, &ctx.path),
        };

        debug!(provider = %key, callback_url = %callback_url, "Resolved callback URL");

        Ok(ResolvedProvider {
            key,
            adapter,
            credentials,
            callback_url,
        })
    }
}

/// Derive the callback URL from a login request path
///
/// Keeps scheme, host and hub prefix; swaps the trailing `/login` segment for
/// `/callback`.
#[must_use]
pub fn synthesize_callback_url(origin: &RequestOrigin, login_path: &str) -> String {
    let path = login_path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    let callback_path = match trimmed.strip_suffix("/login") {
        Some(prefix) => format!("{prefix}/callback"),
        None => path.to_string(),
    };
    format!("{}{}", origin.base(), callback_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::provider::github_factory;
    use crate::registry::ProviderConfig;

    fn registry(
        enabled: &[(ProviderKey, bool)],
        callback_url: Option<&str>,
    ) -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        for (key, on) in enabled {
            let settings = ProviderSettings {
                client_id: format!("{key}-id"),
                client_secret: format!("{key}-secret"),
                callback_url: callback_url.map(ToString::to_string),
                ..Default::default()
            };
            let factory: crate::provider::AdapterFactory = Arc::new(github_factory);
            registry
                .register(*key, ProviderConfig::new(*on, factory, settings))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn origin() -> RequestOrigin {
        RequestOrigin::new("https", "hub.example.com")
    }

    #[test]
    fn test_synthesize_callback_url() {
        assert_eq!(
            synthesize_callback_url(&origin(), "/hub/google/login"),
            "https://hub.example.com/hub/google/callback"
        );
        assert_eq!(
            synthesize_callback_url(&origin(), "/hub/google/login?next=%2Ffoo"),
            "https://hub.example.com/hub/google/callback"
        );
        // Only the trailing segment is rewritten
        assert_eq!(
            synthesize_callback_url(&origin(), "/login/github/login"),
            "https://hub.example.com/login/github/callback"
        );
    }

    #[test]
    fn test_resolve_from_path() {
        let router = CallbackRouter::new(
            registry(&[(ProviderKey::Google, true), (ProviderKey::Gitlab, false)], None),
            "/hub/",
        );

        assert_eq!(router.resolve_from_path("/hub/google/login").unwrap(), ProviderKey::Google);
        assert_eq!(router.resolve_from_path("/google/callback").unwrap(), ProviderKey::Google);
        assert!(matches!(
            router.resolve_from_path("/hub/gitlab/login"),
            Err(Error::ProviderDisabled(ProviderKey::Gitlab))
        ));
        assert!(matches!(
            router.resolve_from_path("/hub/github/login"),
            Err(Error::UnknownRoute(_))
        ));
        assert!(matches!(
            router.resolve_from_path("/hub/google/logout"),
            Err(Error::UnknownRoute(_))
        ));
        assert!(matches!(
            router.resolve_from_path("/hub/login"),
            Err(Error::UnknownRoute(_))
        ));
    }

    #[test]
    fn test_resolve_from_handler() {
        let router = CallbackRouter::new(
            registry(&[(ProviderKey::Google, true), (ProviderKey::Github, false)], None),
            "/hub/",
        );
        assert_eq!(
            router.resolve_from_handler(&HandlerRef::callback(ProviderKey::Google)).unwrap(),
            ProviderKey::Google
        );
        assert!(matches!(
            router.resolve_from_handler(&HandlerRef::login(ProviderKey::Github)),
            Err(Error::AmbiguousOrUnknownHandler(_))
        ));
    }

    #[test]
    fn test_callback_url_prefers_configured_value() {
        let router = CallbackRouter::new(
            registry(&[(ProviderKey::Github, true)], Some("https://fixed.example.com/cb")),
            "/hub/",
        );
        let ctx = HandlerContext::new(
            HandlerRef::login(ProviderKey::Github),
            origin(),
            "/hub/github/login",
        );
        let resolved = router.callback_url(&ctx).unwrap();
        assert_eq!(resolved.callback_url, "https://fixed.example.com/cb");
        assert_eq!(resolved.credentials.client_id, "github-id");
    }

    #[test]
    fn test_synthesized_callback_resolves_back() {
        let router = CallbackRouter::new(registry(&[(ProviderKey::Google, true)], None), "/hub/");
        let ctx = HandlerContext::new(
            HandlerRef::login(ProviderKey::Google),
            origin(),
            "/hub/google/login",
        );
        let resolved = router.callback_url(&ctx).unwrap();
        assert_eq!(resolved.callback_url, "https://hub.example.com/hub/google/callback");

        let path = url::Url::parse(&resolved.callback_url).unwrap().path().to_string();
        assert_eq!(router.resolve_from_path(&path).unwrap(), ProviderKey::Google);
    }
}
