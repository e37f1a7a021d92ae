use std::time::Duration;
use thiserror::Error;

use crate::provider::ProviderKey;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider disabled: {0}")]
    ProviderDisabled(ProviderKey),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Unroutable request: {0}")]
    UnroutableRequest(String),

    #[error("Invalid handler: a handler is required to resolve the provider")]
    InvalidHandler,

    #[error("No enabled provider owns handler: {0}")]
    AmbiguousOrUnknownHandler(String),

    #[error("OAuth callback mismatch for {provider}: {detail}")]
    OAuthCallbackMismatch { provider: ProviderKey, detail: String },

    #[error("Provider {provider} timed out after {}s", timeout.as_secs())]
    ProviderTimeout {
        provider: ProviderKey,
        timeout: Duration,
    },

    #[error("Token exchange with {provider} failed: {message}")]
    Exchange { provider: ProviderKey, message: String },

    #[error("Fetching profile from {provider} failed: {message}")]
    ProfileFetch { provider: ProviderKey, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when no provider could be identified for a request
    ///
    /// Routing failures are local to one request and must be reported to the
    /// client; they never fall through to some other provider.
    #[must_use]
    pub const fn is_routing(&self) -> bool {
        matches!(
            self,
            Self::ProviderDisabled(_)
                | Self::UnknownRoute(_)
                | Self::UnroutableRequest(_)
                | Self::InvalidHandler
                | Self::AmbiguousOrUnknownHandler(_)
        )
    }

    /// Provider the error is attributed to, if any
    #[must_use]
    pub const fn provider(&self) -> Option<ProviderKey> {
        match self {
            Self::ProviderDisabled(provider)
            | Self::OAuthCallbackMismatch { provider, .. }
            | Self::ProviderTimeout { provider, .. }
            | Self::Exchange { provider, .. }
            | Self::ProfileFetch { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
