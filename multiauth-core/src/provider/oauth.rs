//! Shared `OAuth2` authorization-code adapter
//!
//! Built-in providers differ only in their endpoints, default scopes and the
//! way a profile maps to an [`Identity`]; everything else lives here.

use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use std::borrow::Cow;
use std::time::Duration;
use tracing::debug;

use super::{AuthRequest, Identity, OAuthCredentials, ProviderAdapter, ProviderKey};
use crate::config::ProviderSettings;
use crate::{Error, Result};

// Avoid oauth2 type madness
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps a provider profile document to an identity
pub type ProfileMapper = fn(ProviderKey, serde_json::Value) -> Result<Identity>;

const USER_AGENT: &str = concat!("multiauth/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `OAuth2` endpoints of one identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuth2Endpoints {
    /// Apply per-endpoint overrides from settings
    #[must_use]
    pub fn with_overrides(mut self, settings: &ProviderSettings) -> Self {
        if let Some(url) = &settings.authorize_url {
            self.authorize_url.clone_from(url);
        }
        if let Some(url) = &settings.token_url {
            self.token_url.clone_from(url);
        }
        if let Some(url) = &settings.userinfo_url {
            self.userinfo_url.clone_from(url);
        }
        self
    }
}

/// Authorization-code flow against one identity provider
pub struct OAuth2Adapter {
    key: ProviderKey,
    endpoints: OAuth2Endpoints,
    credentials: OAuthCredentials,
    callback_url: Option<String>,
    http_client: Client,
    mapper: ProfileMapper,
}

impl std::fmt::Debug for OAuth2Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Adapter")
            .field("key", &self.key)
            .field("endpoints", &self.endpoints)
            .field("credentials", &self.credentials)
            .field("callback_url", &self.callback_url)
            .finish_non_exhaustive()
    }
}

impl OAuth2Adapter {
    /// Create an adapter from settings
    ///
    /// `default_scopes` apply when the settings request none.
    pub fn new(
        key: ProviderKey,
        endpoints: OAuth2Endpoints,
        settings: &ProviderSettings,
        default_scopes: &[&str],
        mapper: ProfileMapper,
    ) -> Result<Self> {
        // Fail at construction rather than on the first login
        AuthUrl::new(endpoints.authorize_url.clone()).map_err(|e| {
            Error::Configuration(format!("Invalid {key} authorize URL: {e}"))
        })?;
        TokenUrl::new(endpoints.token_url.clone())
            .map_err(|e| Error::Configuration(format!("Invalid {key} token URL: {e}")))?;
        url::Url::parse(&endpoints.userinfo_url)
            .map_err(|e| Error::Configuration(format!("Invalid {key} userinfo URL: {e}")))?;

        let mut credentials = OAuthCredentials::from(settings);
        if credentials.scopes.is_empty() {
            credentials.scopes = default_scopes.iter().map(ToString::to_string).collect();
        }

        // Following redirects opens the client up to SSRF vulnerabilities.
        let http_client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build {key} HTTP client: {e}")))?;

        Ok(Self {
            key,
            endpoints,
            credentials,
            callback_url: settings.callback_url.clone(),
            http_client,
            mapper,
        })
    }

    #[must_use]
    pub const fn endpoints(&self) -> &OAuth2Endpoints {
        &self.endpoints
    }

    fn client(&self, credentials: &OAuthCredentials) -> Result<ConfiguredClient> {
        let auth_url = AuthUrl::new(self.endpoints.authorize_url.clone())
            .map_err(|e| Error::Configuration(format!("Invalid {} authorize URL: {e}", self.key)))?;
        let token_url = TokenUrl::new(self.endpoints.token_url.clone())
            .map_err(|e| Error::Configuration(format!("Invalid {} token URL: {e}", self.key)))?;

        Ok(BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url))
    }

    fn redirect_url(&self, redirect_uri: &str) -> Result<RedirectUrl> {
        RedirectUrl::new(redirect_uri.to_string()).map_err(|e| Error::OAuthCallbackMismatch {
            provider: self.key,
            detail: format!("callback URL '{redirect_uri}' is not a valid URL: {e}"),
        })
    }

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str, request: &AuthRequest<'_>) -> Result<String> {
        let client = self.client(request.credentials)?;
        let redirect_url = self.redirect_url(request.redirect_uri)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Owned(redirect_url))
            .request_async(&self.http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    let error = response.error().to_string();
                    let description = response.error_description().cloned().unwrap_or_default();
                    if error.contains("redirect_uri") || description.contains("redirect_uri") {
                        Error::OAuthCallbackMismatch {
                            provider: self.key,
                            detail: format!("{error}: {description}"),
                        }
                    } else {
                        Error::Exchange {
                            provider: self.key,
                            message: format!("{error}: {description}"),
                        }
                    }
                }
                other => Error::Exchange {
                    provider: self.key,
                    message: other.to_string(),
                },
            })?;

        Ok(token.access_token().secret().clone())
    }

    /// Fetch the authenticated user's profile document
    async fn fetch_profile(&self, access_token: &str) -> Result<serde_json::Value> {
        let profile_error = |message: String| Error::ProfileFetch {
            provider: self.key,
            message,
        };

        self.http_client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| profile_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| profile_error(e.to_string()))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| profile_error(format!("invalid profile document: {e}")))
    }
}

#[async_trait]
impl ProviderAdapter for OAuth2Adapter {
    fn key(&self) -> ProviderKey {
        self.key
    }

    fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }

    fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    fn authorize_url(
        &self,
        state: &str,
        redirect_uri: &str,
        credentials: &OAuthCredentials,
    ) -> Result<String> {
        let client = self.client(credentials)?;
        let redirect_url = self.redirect_url(redirect_uri)?;
        let state = state.to_string();

        let (auth_url, _csrf_token) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(credentials.scopes.iter().cloned().map(Scope::new))
            .set_redirect_uri(Cow::Owned(redirect_url))
            .url();

        Ok(auth_url.to_string())
    }

    async fn authenticate(&self, request: AuthRequest<'_>) -> Result<Option<Identity>> {
        if let Some(error) = request.error {
            debug!(provider = %self.key, error, "Identity provider reported no authorization");
            return Ok(None);
        }
        let Some(code) = request.code.filter(|code| !code.is_empty()) else {
            debug!(provider = %self.key, "Callback carried no authorization code");
            return Ok(None);
        };

        let access_token = self.exchange_code(code, &request).await?;
        let profile = self.fetch_profile(&access_token).await?;
        (self.mapper)(self.key, profile).map(Some)
    }
}

/// Read a string-or-number profile field
pub(crate) fn profile_id(profile: &serde_json::Value, field: &str) -> Option<String> {
    match profile.get(field)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an optional, non-empty string profile field
pub(crate) fn profile_str(profile: &serde_json::Value, field: &str) -> Option<String> {
    profile
        .get(field)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
