//! Integration tests for provider dispatch and callback routing
//!
//! Fake adapters stand in for real identity providers so the routing and
//! concurrency properties can be checked without any network.
//!
//! Run with: cargo test --test integration_tests

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use multiauth_core::config::ProviderSettings;
use multiauth_core::dispatcher::CHOOSER_PATH;
use multiauth_core::provider::{
    oauth_handlers, AdapterFactory, AuthRequest, HandlerKind, HandlerMap, OAuthCredentials,
    ProviderAdapter, LOGIN_HANDLER,
};
use multiauth_core::registry::ProviderConfig;
use multiauth_core::{
    CallbackData, Error, HandlerContext, HandlerRef, Identity, MultiProviderDispatcher,
    ProviderKey, ProviderRegistry, RequestOrigin, RouteTarget,
};

const BASE_URL: &str = "/hub/";

/// Adapter that echoes back the credentials and redirect URI it was handed
struct FakeAdapter {
    key: ProviderKey,
    credentials: OAuthCredentials,
    callback_url: Option<String>,
    delay: Duration,
    handlers: HandlerMap,
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn key(&self) -> ProviderKey {
        self.key
    }

    fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    fn handlers(&self) -> HandlerMap {
        self.handlers.clone()
    }

    fn authorize_url(
        &self,
        state: &str,
        redirect_uri: &str,
        credentials: &OAuthCredentials,
    ) -> multiauth_core::Result<String> {
        Ok(format!(
            "https://idp.test/{}/authorize?client_id={}&state={state}&redirect_uri={redirect_uri}",
            self.key, credentials.client_id
        ))
    }

    async fn authenticate(
        &self,
        request: AuthRequest<'_>,
    ) -> multiauth_core::Result<Option<Identity>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.error.is_some() {
            return Ok(None);
        }
        let Some(code) = request.code else {
            return Ok(None);
        };
        if code == "network-down" {
            return Err(Error::Exchange {
                provider: self.key,
                message: "connection refused".to_string(),
            });
        }
        Ok(Some(Identity {
            provider: self.key,
            provider_user_id: code.to_string(),
            username: format!("{}-user", self.key),
            email: None,
            avatar: None,
            claims: serde_json::json!({
                "client_id": request.credentials.client_id,
                "redirect_uri": request.redirect_uri,
            }),
        }))
    }
}

fn fake_factory(delay: Duration, handlers: HandlerMap) -> AdapterFactory {
    Arc::new(move |key: ProviderKey, settings: &ProviderSettings| {
        Ok(Arc::new(FakeAdapter {
            key,
            credentials: OAuthCredentials::from(settings),
            callback_url: settings.callback_url.clone(),
            delay,
            handlers: handlers.clone(),
        }) as Arc<dyn ProviderAdapter>)
    })
}

fn settings(key: ProviderKey) -> ProviderSettings {
    ProviderSettings {
        client_id: format!("{key}-client"),
        client_secret: format!("{key}-secret"),
        ..Default::default()
    }
}

fn registry_with(providers: &[(ProviderKey, bool, Duration)]) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for (key, enabled, delay) in providers {
        registry
            .register(
                *key,
                ProviderConfig::new(
                    *enabled,
                    fake_factory(*delay, oauth_handlers()),
                    settings(*key),
                ),
            )
            .unwrap();
    }
    registry.initialize().unwrap();
    Arc::new(registry)
}

fn dispatcher(providers: &[(ProviderKey, bool)]) -> MultiProviderDispatcher {
    let providers: Vec<_> = providers
        .iter()
        .map(|(key, enabled)| (*key, *enabled, Duration::ZERO))
        .collect();
    MultiProviderDispatcher::new(registry_with(&providers), BASE_URL, Duration::from_secs(5))
}

fn callback_ctx(key: ProviderKey) -> HandlerContext {
    HandlerContext::new(
        HandlerRef::callback(key),
        RequestOrigin::new("https", "hub.example.com"),
        format!("{BASE_URL}{key}/callback"),
    )
}

fn login_ctx(key: ProviderKey) -> HandlerContext {
    HandlerContext::new(
        HandlerRef::login(key),
        RequestOrigin::new("https", "hub.example.com"),
        format!("{BASE_URL}{key}/login"),
    )
}

#[test]
fn test_route_table_has_two_routes_per_provider_plus_chooser() {
    let all = dispatcher(&[
        (ProviderKey::Google, true),
        (ProviderKey::Github, true),
        (ProviderKey::Gitlab, true),
    ]);
    let table = all.handlers().unwrap();
    assert_eq!(table.len(), 2 * 3 + 1);
    assert_eq!(table.iter().next().unwrap().path, CHOOSER_PATH);

    for route in &table {
        if let RouteTarget::Provider(handler) = route.target {
            let full_path = format!("{}{}", BASE_URL.trim_end_matches('/'), route.path);
            assert_eq!(all.router().resolve_from_path(&full_path).unwrap(), handler.provider);
            assert_eq!(all.router().resolve_from_handler(&handler).unwrap(), handler.provider);
        }
    }

    let login_url = all.registry().get(ProviderKey::Github).unwrap().login_url(BASE_URL);
    assert_eq!(login_url, "/hub/github/login");
    assert_eq!(
        table.get("/github/login"),
        Some(RouteTarget::Provider(HandlerRef::login(ProviderKey::Github)))
    );
}

#[test]
fn test_disabled_provider_is_absent() {
    let dispatcher = dispatcher(&[(ProviderKey::Google, true), (ProviderKey::Gitlab, false)]);
    let table = dispatcher.handlers().unwrap();
    assert_eq!(table.len(), 3);
    assert!(table.get("/gitlab/login").is_none());
    assert!(table.get("/gitlab/callback").is_none());

    assert!(matches!(
        dispatcher.router().resolve_from_path("/hub/gitlab/callback"),
        Err(Error::ProviderDisabled(ProviderKey::Gitlab))
    ));
    assert!(matches!(
        dispatcher.router().resolve_from_path("/hub/github/callback"),
        Err(Error::UnknownRoute(_))
    ));
    assert!(matches!(
        dispatcher.get_callback_url(Some(&callback_ctx(ProviderKey::Gitlab))),
        Err(Error::UnroutableRequest(_))
    ));
}

#[test]
fn test_route_order_follows_configuration() {
    let dispatcher = dispatcher(&[(ProviderKey::Gitlab, true), (ProviderKey::Google, true)]);
    let paths: Vec<String> = dispatcher
        .handlers()
        .unwrap()
        .iter()
        .map(|route| route.path.clone())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/login",
            "/gitlab/login",
            "/gitlab/callback",
            "/google/login",
            "/google/callback"
        ]
    );
}

#[test]
fn test_adapter_without_native_handlers_is_rejected() {
    let mut only_login = HandlerMap::new();
    only_login.insert(LOGIN_HANDLER, HandlerKind::Login);

    let mut registry = ProviderRegistry::new();
    registry
        .register(
            ProviderKey::Github,
            ProviderConfig::new(
                true,
                fake_factory(Duration::ZERO, only_login),
                settings(ProviderKey::Github),
            ),
        )
        .unwrap();
    let dispatcher =
        MultiProviderDispatcher::new(Arc::new(registry), BASE_URL, Duration::from_secs(5));
    assert!(matches!(dispatcher.handlers(), Err(Error::Configuration(_))));
}

#[test]
fn test_get_callback_url_requires_handler() {
    let dispatcher = dispatcher(&[(ProviderKey::Google, true)]);
    assert!(matches!(
        dispatcher.get_callback_url(None),
        Err(Error::InvalidHandler)
    ));
}

#[test]
fn test_synthesized_callback_url_round_trips() {
    let dispatcher = dispatcher(&[(ProviderKey::Google, true), (ProviderKey::Github, true)]);
    let resolved = dispatcher
        .get_callback_url(Some(&login_ctx(ProviderKey::Google)))
        .unwrap();
    assert_eq!(resolved.key, ProviderKey::Google);
    assert_eq!(
        resolved.callback_url,
        "https://hub.example.com/hub/google/callback"
    );
    assert_eq!(resolved.credentials.client_id, "google-client");

    let path = url::Url::parse(&resolved.callback_url).unwrap().path().to_string();
    assert_eq!(
        dispatcher.router().resolve_from_path(&path).unwrap(),
        ProviderKey::Google
    );

    let authorize = resolved.authorize_url("state-1").unwrap();
    assert!(authorize.contains("client_id=google-client"));
    assert!(authorize.contains("redirect_uri=https://hub.example.com/hub/google/callback"));
}

#[tokio::test]
async fn test_authenticate_routes_to_owning_provider() {
    let dispatcher = dispatcher(&[(ProviderKey::Google, true), (ProviderKey::Github, true)]);
    let data = CallbackData {
        code: Some("abc"),
        error: None,
        redirect_uri: Some("https://hub.example.com/hub/github/callback"),
    };
    let identity = dispatcher
        .authenticate(&callback_ctx(ProviderKey::Github), data)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.provider, ProviderKey::Github);
    assert_eq!(identity.claims["client_id"], "github-client");
    assert_eq!(
        identity.claims["redirect_uri"],
        "https://hub.example.com/hub/github/callback"
    );
}

#[tokio::test]
async fn test_denied_consent_and_network_failure() {
    let dispatcher = dispatcher(&[(ProviderKey::Google, true)]);
    let ctx = callback_ctx(ProviderKey::Google);

    let denied = CallbackData {
        code: None,
        error: Some("access_denied"),
        redirect_uri: None,
    };
    assert!(dispatcher.authenticate(&ctx, denied).await.unwrap().is_none());

    let failing = CallbackData {
        code: Some("network-down"),
        ..Default::default()
    };
    let err = dispatcher.authenticate(&ctx, failing).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Exchange {
            provider: ProviderKey::Google,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_interleaved_attempts_keep_their_own_credentials() {
    // Google's exchange is slow so GitHub resolves and finishes in between
    let registry = registry_with(&[
        (ProviderKey::Google, true, Duration::from_millis(200)),
        (ProviderKey::Github, true, Duration::ZERO),
    ]);
    let dispatcher = Arc::new(MultiProviderDispatcher::new(
        registry,
        BASE_URL,
        Duration::from_secs(5),
    ));

    let a = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let data = CallbackData {
                code: Some("a"),
                ..Default::default()
            };
            dispatcher
                .authenticate(&callback_ctx(ProviderKey::Google), data)
                .await
        })
    };
    let b = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let data = CallbackData {
                code: Some("b"),
                ..Default::default()
            };
            dispatcher
                .authenticate(&callback_ctx(ProviderKey::Github), data)
                .await
        })
    };

    let identity_b = b.await.unwrap().unwrap().unwrap();
    let identity_a = a.await.unwrap().unwrap().unwrap();

    assert_eq!(identity_a.provider, ProviderKey::Google);
    assert_eq!(identity_a.claims["client_id"], "google-client");
    assert_eq!(identity_b.provider, ProviderKey::Github);
    assert_eq!(identity_b.claims["client_id"], "github-client");
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let registry = registry_with(&[(ProviderKey::Gitlab, true, Duration::from_secs(60))]);
    let dispatcher = MultiProviderDispatcher::new(registry, BASE_URL, Duration::from_secs(2));

    let data = CallbackData {
        code: Some("slow"),
        ..Default::default()
    };
    let err = dispatcher
        .authenticate(&callback_ctx(ProviderKey::Gitlab), data)
        .await
        .unwrap_err();
    match err {
        Error::ProviderTimeout { provider, timeout } => {
            assert_eq!(provider, ProviderKey::Gitlab);
            assert_eq!(timeout, Duration::from_secs(2));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

fn form(fields: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<&'static str> {
    move |name| {
        fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }
}

#[test]
fn test_select_provider_uses_configuration_order() {
    let dispatcher = dispatcher(&[
        (ProviderKey::Google, true),
        (ProviderKey::Github, true),
        (ProviderKey::Gitlab, false),
    ]);
    assert_eq!(
        dispatcher.select_provider(form(&[("login_github", "1"), ("login_google", "1")])),
        Some(ProviderKey::Google)
    );
    assert_eq!(
        dispatcher.select_provider(form(&[("login_github", "1")])),
        Some(ProviderKey::Github)
    );
    assert_eq!(dispatcher.select_provider(form(&[("login_gitlab", "1")])), None);
    assert_eq!(dispatcher.select_provider(form(&[("login_google", "")])), None);
    assert_eq!(dispatcher.select_provider(form(&[])), None);
}

#[test]
fn test_provider_choices_list_every_kind() {
    let dispatcher = dispatcher(&[(ProviderKey::Github, true)]);
    let choices = dispatcher.provider_choices();
    assert_eq!(choices.len(), 3);
    let github = choices.iter().find(|c| c.key == ProviderKey::Github).unwrap();
    assert!(github.enabled);
    assert_eq!(github.login_url, "/hub/github/login");
    assert!(!choices.iter().find(|c| c.key == ProviderKey::Google).unwrap().enabled);
}
