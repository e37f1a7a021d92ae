// Module: http
// Login chooser and per-provider OAuth2 routes, mounted under the hub prefix

pub mod error;
pub mod health;
pub mod login;
pub mod oauth;
pub mod templates;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use multiauth_core::config::SessionConfig;
use multiauth_core::provider::HandlerKind;
use multiauth_core::session::SessionStore;
use multiauth_core::state::LoginStateStore;
use multiauth_core::{Config, MultiProviderDispatcher, RequestOrigin, RouteTarget};

pub use error::{AppError, AppResult};
use templates::LoginTemplates;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<MultiProviderDispatcher>,
    pub login_states: LoginStateStore,
    pub sessions: SessionStore,
    pub templates: LoginTemplates,
    pub session_config: Arc<SessionConfig>,
    /// Post-login target when the request names none
    pub home_url: Arc<str>,
    pub trust_forwarded_headers: bool,
}

impl AppState {
    pub fn new(
        config: &Config,
        dispatcher: Arc<MultiProviderDispatcher>,
    ) -> multiauth_core::Result<Self> {
        Ok(Self {
            dispatcher,
            login_states: LoginStateStore::new(config.auth.state_ttl()),
            sessions: SessionStore::new(config.session.ttl()),
            templates: LoginTemplates::new()?,
            session_config: Arc::new(config.session.clone()),
            home_url: Arc::from(config.server.home_url()),
            trust_forwarded_headers: config.server.trust_forwarded_headers,
        })
    }

    /// Session cookie carrying `token`
    pub(crate) fn session_cookie(&self, token: String) -> Cookie<'static> {
        let max_age = i64::try_from(self.session_config.ttl_seconds).unwrap_or(i64::MAX);
        Cookie::build((self.session_config.cookie_name.clone(), token))
            .path(self.dispatcher.base_url().to_string())
            .http_only(true)
            .secure(self.session_config.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age))
            .build()
    }
}

/// Create the HTTP router
///
/// Routes under the hub prefix come from the dispatcher's route table; each
/// provider route carries the `HandlerRef` that owns it. `/health` and
/// `/metrics` are served at the root.
pub fn create_router(state: AppState) -> multiauth_core::Result<Router> {
    let table = state.dispatcher.handlers()?;

    let mut hub = Router::new();
    for route in &table {
        let method_router = match route.target {
            RouteTarget::Chooser => get(login::login_page).post(login::login_submit),
            RouteTarget::Provider(handler) => match handler.kind {
                HandlerKind::Login => get(oauth::provider_login).layer(Extension(handler)),
                HandlerKind::Callback => get(oauth::provider_callback).layer(Extension(handler)),
            },
        };
        debug!(path = %route.path, target = ?route.target, "Registering login route");
        hub = hub.route(&route.path, method_router);
    }

    let base = state.dispatcher.base_url().trim_end_matches('/').to_string();
    let router = if base.is_empty() {
        Router::new().merge(hub)
    } else {
        Router::new().nest(&base, hub)
    };

    Ok(router
        // Health check endpoints (for monitoring probes)
        .merge(health::create_health_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Scheme and host the client used
///
/// Forwarded headers are client-controlled unless a proxy sets them, so they
/// are only read when `trust_forwarded` is on.
pub(crate) fn request_origin(headers: &HeaderMap, trust_forwarded: bool) -> RequestOrigin {
    let first = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let forwarded = |name: &str| if trust_forwarded { first(name) } else { None };

    let scheme = forwarded("x-forwarded-proto").unwrap_or("http");
    let host = forwarded("x-forwarded-host")
        .or_else(|| first(header::HOST.as_str()))
        .unwrap_or("localhost");
    RequestOrigin::new(scheme, host)
}

/// 302 to `location`
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_origin() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("hub.local:8000"));
        assert_eq!(
            request_origin(&headers, true),
            RequestOrigin::new("http", "hub.local:8000")
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("hub.example.com"));
        assert_eq!(
            request_origin(&headers, true),
            RequestOrigin::new("https", "hub.example.com")
        );
    }

    #[test]
    fn test_request_origin_ignores_untrusted_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("hub.local:8000"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("evil.example"));
        assert_eq!(
            request_origin(&headers, false),
            RequestOrigin::new("http", "hub.local:8000")
        );
    }

    #[test]
    fn test_found_sets_location() {
        let response = found("/hub/home");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/hub/home");
    }
}
