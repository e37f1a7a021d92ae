use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::provider::{builtin_factory, ProviderKey};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Hub prefix every authentication route is mounted under
    pub base_url: String,
    /// Post-login target when the request carries no usable `next`
    pub default_next: Option<String>,
    /// Honour `X-Forwarded-Proto` / `X-Forwarded-Host` from a reverse proxy
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
            base_url: "/hub/".to_string(),
            default_next: None,
            trust_forwarded_headers: false,
        }
    }
}

impl ServerConfig {
    /// Hub prefix with exactly one leading and one trailing slash
    #[must_use]
    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.base_url)
    }

    /// Hub home, used when no `next` target is given
    #[must_use]
    pub fn home_url(&self) -> String {
        self.default_next
            .clone()
            .unwrap_or_else(|| format!("{}home", self.normalized_base_url()))
    }
}

/// Normalize a hub prefix to `/<segments>/`
#[must_use]
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Multi-provider authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enable_google: bool,
    pub enable_github: bool,
    pub enable_gitlab: bool,

    /// Adapter type names (see `provider::builtin_factory`)
    pub google_adapter_type: String,
    pub github_adapter_type: String,
    pub gitlab_adapter_type: String,

    pub google: ProviderSettings,
    pub github: ProviderSettings,
    pub gitlab: ProviderSettings,

    /// Upper bound on one code exchange with an identity provider
    pub exchange_timeout_seconds: u64,
    /// How long a started login may wait for its callback
    pub state_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_google: true,
            enable_github: true,
            enable_gitlab: true,
            google_adapter_type: "google".to_string(),
            github_adapter_type: "github".to_string(),
            gitlab_adapter_type: "gitlab".to_string(),
            google: ProviderSettings::default(),
            github: ProviderSettings::default(),
            gitlab: ProviderSettings::default(),
            exchange_timeout_seconds: 10,
            state_ttl_seconds: 600,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub const fn is_enabled(&self, key: ProviderKey) -> bool {
        match key {
            ProviderKey::Google => self.enable_google,
            ProviderKey::Github => self.enable_github,
            ProviderKey::Gitlab => self.enable_gitlab,
        }
    }

    #[must_use]
    pub fn adapter_type(&self, key: ProviderKey) -> &str {
        match key {
            ProviderKey::Google => &self.google_adapter_type,
            ProviderKey::Github => &self.github_adapter_type,
            ProviderKey::Gitlab => &self.gitlab_adapter_type,
        }
    }

    #[must_use]
    pub const fn settings(&self, key: ProviderKey) -> &ProviderSettings {
        match key {
            ProviderKey::Google => &self.google,
            ProviderKey::Github => &self.github,
            ProviderKey::Gitlab => &self.gitlab,
        }
    }

    #[must_use]
    pub const fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_seconds)
    }

    #[must_use]
    pub const fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_seconds)
    }
}

/// Per-provider `OAuth2` client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Requested scopes; empty means the adapter's defaults
    pub scopes: Vec<String>,
    /// Fixed callback URL; synthesized from the login request when unset
    pub callback_url: Option<String>,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
    /// Base URL of a self-hosted instance (`GitLab`)
    pub server_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: u64,
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "multiauth-session".to_string(),
            ttl_seconds: 14 * 24 * 3600,
            secure: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // MULTIAUTH_AUTH__ENABLE_GITLAB=false, MULTIAUTH_AUTH__GITHUB__CLIENT_ID=...
        builder = builder.add_source(
            Environment::with_prefix("MULTIAUTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Validate configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if self.server.base_url.contains("://") {
            errors.push(format!(
                "server.base_url must be a path, got '{}'",
                self.server.base_url
            ));
        }
        if let Some(next) = &self.server.default_next {
            if !next.starts_with('/') || next.starts_with("//") {
                errors.push(format!("server.default_next must be a local path, got '{next}'"));
            }
        }

        let enabled: Vec<ProviderKey> = ProviderKey::ALL
            .into_iter()
            .filter(|key| self.auth.is_enabled(*key))
            .collect();
        if enabled.is_empty() {
            errors.push(
                "at least one of auth.enable_google/github/gitlab must be true".to_string(),
            );
        }

        for key in enabled {
            let adapter_type = self.auth.adapter_type(key);
            if builtin_factory(adapter_type).is_none() {
                errors.push(format!(
                    "auth.{key}_adapter_type: unknown adapter type '{adapter_type}'"
                ));
            }
            let settings = self.auth.settings(key);
            if settings.client_id.is_empty() {
                errors.push(format!("auth.{key}.client_id is required when {key} is enabled"));
            }
            if settings.client_secret.is_empty() {
                errors.push(format!("auth.{key}.client_secret is required when {key} is enabled"));
            }
            if let Some(callback_url) = &settings.callback_url {
                if url::Url::parse(callback_url).is_err() {
                    errors.push(format!(
                        "auth.{key}.callback_url is not a valid URL: {callback_url}"
                    ));
                }
            }
        }

        if self.auth.exchange_timeout_seconds == 0 {
            errors.push("auth.exchange_timeout_seconds must be non-zero".to_string());
        }
        if self.auth.state_ttl_seconds == 0 {
            errors.push("auth.state_ttl_seconds must be non-zero".to_string());
        }
        if self.session.cookie_name.is_empty() {
            errors.push("session.cookie_name must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
