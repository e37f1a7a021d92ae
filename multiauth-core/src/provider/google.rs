//! Google `OAuth2` provider

use std::sync::Arc;

use super::oauth::{profile_id, profile_str, OAuth2Adapter, OAuth2Endpoints};
use super::{Identity, ProviderAdapter, ProviderKey};
use crate::config::ProviderSettings;
use crate::{Error, Result};

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_SCOPES: &[&str] = &["openid", "email"];

#[must_use]
pub fn endpoints() -> OAuth2Endpoints {
    OAuth2Endpoints {
        authorize_url: AUTHORIZE_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        userinfo_url: USERINFO_URL.to_string(),
    }
}

/// Map a Google userinfo document
///
/// Google identifies users by `id` (v2 userinfo) or `sub` (OIDC userinfo);
/// the username is the account email.
pub fn map_profile(key: ProviderKey, profile: serde_json::Value) -> Result<Identity> {
    let provider_user_id = profile_id(&profile, "id")
        .or_else(|| profile_id(&profile, "sub"))
        .ok_or_else(|| Error::ProfileFetch {
            provider: key,
            message: "Google profile has no user id".to_string(),
        })?;
    let email = profile_str(&profile, "email");
    let username = email
        .clone()
        .or_else(|| profile_str(&profile, "name"))
        .unwrap_or_else(|| provider_user_id.clone());

    Ok(Identity {
        provider: key,
        provider_user_id,
        username,
        email,
        avatar: profile_str(&profile, "picture"),
        claims: profile,
    })
}

/// Factory function for Google provider
pub fn google_factory(
    key: ProviderKey,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ProviderAdapter>> {
    let adapter = OAuth2Adapter::new(
        key,
        endpoints().with_overrides(settings),
        settings,
        DEFAULT_SCOPES,
        map_profile,
    )?;
    Ok(Arc::new(adapter))
}
