//! GitHub `OAuth2` provider

use std::sync::Arc;

use super::oauth::{profile_id, profile_str, OAuth2Adapter, OAuth2Endpoints};
use super::{Identity, ProviderAdapter, ProviderKey};
use crate::config::ProviderSettings;
use crate::{Error, Result};

pub const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const USERINFO_URL: &str = "https://api.github.com/user";
pub const DEFAULT_SCOPES: &[&str] = &["read:user"];

#[must_use]
pub fn endpoints() -> OAuth2Endpoints {
    OAuth2Endpoints {
        authorize_url: AUTHORIZE_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        userinfo_url: USERINFO_URL.to_string(),
    }
}

pub fn map_profile(key: ProviderKey, profile: serde_json::Value) -> Result<Identity> {
    let missing = |field: &str| Error::ProfileFetch {
        provider: key,
        message: format!("GitHub profile has no '{field}'"),
    };
    let provider_user_id = profile_id(&profile, "id").ok_or_else(|| missing("id"))?;
    let username = profile_str(&profile, "login").ok_or_else(|| missing("login"))?;

    Ok(Identity {
        provider: key,
        provider_user_id,
        username,
        email: profile_str(&profile, "email"),
        avatar: profile_str(&profile, "avatar_url"),
        claims: profile,
    })
}

/// Factory function for GitHub provider
pub fn github_factory(
    key: ProviderKey,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ProviderAdapter>> {
    let endpoints = match &settings.server_url {
        // GitHub Enterprise Server
        Some(server) => {
            let server = server.trim_end_matches('/');
            OAuth2Endpoints {
                authorize_url: format!("{server}/login/oauth/authorize"),
                token_url: format!("{server}/login/oauth/access_token"),
                userinfo_url: format!("{server}/api/v3/user"),
            }
        }
        None => endpoints(),
    };

    let adapter = OAuth2Adapter::new(
        key,
        endpoints.with_overrides(settings),
        settings,
        DEFAULT_SCOPES,
        map_profile,
    )?;
    Ok(Arc::new(adapter))
}
