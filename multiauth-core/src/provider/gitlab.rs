//! GitLab `OAuth2` provider (gitlab.com or self-hosted)

use std::sync::Arc;

use super::oauth::{profile_id, profile_str, OAuth2Adapter, OAuth2Endpoints};
use super::{Identity, ProviderAdapter, ProviderKey};
use crate::config::ProviderSettings;
use crate::{Error, Result};

pub const DEFAULT_SERVER_URL: &str = "https://gitlab.com";
pub const DEFAULT_SCOPES: &[&str] = &["read_user"];

#[must_use]
pub fn endpoints(server_url: &str) -> OAuth2Endpoints {
    let server = server_url.trim_end_matches('/');
    OAuth2Endpoints {
        authorize_url: format!("{server}/oauth/authorize"),
        token_url: format!("{server}/oauth/token"),
        userinfo_url: format!("{server}/api/v4/user"),
    }
}

pub fn map_profile(key: ProviderKey, profile: serde_json::Value) -> Result<Identity> {
    let missing = |field: &str| Error::ProfileFetch {
        provider: key,
        message: format!("GitLab profile has no '{field}'"),
    };
    let provider_user_id = profile_id(&profile, "id").ok_or_else(|| missing("id"))?;
    let username = profile_str(&profile, "username").ok_or_else(|| missing("username"))?;

    Ok(Identity {
        provider: key,
        provider_user_id,
        username,
        email: profile_str(&profile, "email"),
        avatar: profile_str(&profile, "avatar_url"),
        claims: profile,
    })
}

/// Factory function for GitLab provider
pub fn gitlab_factory(
    key: ProviderKey,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ProviderAdapter>> {
    let server_url = settings.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL);
    let adapter = OAuth2Adapter::new(
        key,
        endpoints(server_url).with_overrides(settings),
        settings,
        DEFAULT_SCOPES,
        map_profile,
    )?;
    Ok(Arc::new(adapter))
}
