//! Provider registry and dispatcher initialization

use std::sync::Arc;
use tracing::info;

use crate::registry::ProviderRegistry;
use crate::{Config, MultiProviderDispatcher, Result};

/// Build the registry, construct every enabled adapter, and wrap it in a dispatcher
///
/// Wiring errors (unknown adapter type, bad endpoint URL, malformed handler
/// set) surface here rather than on the first login.
pub fn init_dispatcher(config: &Config) -> Result<Arc<MultiProviderDispatcher>> {
    let registry = ProviderRegistry::from_config(&config.auth)?;
    registry.initialize()?;

    let dispatcher = MultiProviderDispatcher::new(
        Arc::new(registry),
        config.server.normalized_base_url(),
        config.auth.exchange_timeout(),
    );

    let routes = dispatcher.handlers()?;
    info!(routes = routes.len(), "Login routes registered");

    Ok(Arc::new(dispatcher))
}
