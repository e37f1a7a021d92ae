//! Provider registry
//!
//! Holds the configured providers in configuration order and owns the adapter
//! instances built from them. Configuration is fixed before the first adapter
//! is constructed; afterwards the registry is read-only and freely shared.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

use crate::config::{AuthConfig, ProviderSettings};
use crate::provider::{builtin_factory, AdapterFactory, ProviderAdapter, ProviderKey};
use crate::{Error, Result};

/// Static configuration of one provider
#[derive(Clone)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub factory: AdapterFactory,
    pub settings: ProviderSettings,
}

impl ProviderConfig {
    pub fn new(enabled: bool, factory: AdapterFactory, settings: ProviderSettings) -> Self {
        Self {
            enabled,
            factory,
            settings,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("enabled", &self.enabled)
            .field("client_id", &self.settings.client_id)
            .finish_non_exhaustive()
    }
}

type AdapterMap = IndexMap<ProviderKey, Arc<dyn ProviderAdapter>>;

/// Ordered set of configured providers and their adapters
#[derive(Default)]
pub struct ProviderRegistry {
    configs: IndexMap<ProviderKey, ProviderConfig>,
    adapters: OnceCell<AdapterMap>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("configs", &self.configs)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `auth` configuration section
    ///
    /// Providers are registered in `ProviderKey::ALL` order. A disabled
    /// provider whose adapter type is unknown is left out entirely.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let mut registry = Self::new();
        for key in ProviderKey::ALL {
            let enabled = config.is_enabled(key);
            let adapter_type = config.adapter_type(key);
            let Some(factory) = builtin_factory(adapter_type) else {
                if enabled {
                    return Err(Error::Configuration(format!(
                        "Unknown adapter type '{adapter_type}' for provider {key}"
                    )));
                }
                continue;
            };
            registry.register(
                key,
                ProviderConfig::new(enabled, factory, config.settings(key).clone()),
            )?;
        }
        Ok(registry)
    }

    /// Add or replace a provider's configuration
    ///
    /// Fails once any adapter has been constructed.
    pub fn register(&mut self, key: ProviderKey, config: ProviderConfig) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::Configuration(format!(
                "Cannot register provider {key}: adapters are already initialized"
            )));
        }
        self.configs.insert(key, config);
        Ok(())
    }

    /// Construct every enabled adapter
    ///
    /// Idempotent. Call during startup so wiring errors surface before the
    /// first request; `get` performs the same construction on demand.
    pub fn initialize(&self) -> Result<()> {
        self.adapters().map(|_| ())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.adapters.get().is_some()
    }

    /// Adapter for an enabled provider
    ///
    /// Every call for the same key returns the same instance.
    pub fn get(&self, key: ProviderKey) -> Result<Arc<dyn ProviderAdapter>> {
        if !self.is_enabled(key) {
            return Err(Error::ProviderDisabled(key));
        }
        self.adapters()?
            .get(&key)
            .cloned()
            .ok_or(Error::ProviderDisabled(key))
    }

    #[must_use]
    pub fn is_enabled(&self, key: ProviderKey) -> bool {
        self.configs.get(&key).is_some_and(|config| config.enabled)
    }

    /// Enabled providers in configuration order
    #[must_use]
    pub fn enabled_keys(&self) -> Vec<ProviderKey> {
        self.configs
            .iter()
            .filter(|(_, config)| config.enabled)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Every registered provider (enabled or not) in configuration order
    #[must_use]
    pub fn registered_keys(&self) -> Vec<ProviderKey> {
        self.configs.keys().copied().collect()
    }

    fn adapters(&self) -> Result<&AdapterMap> {
        self.adapters.get_or_try_init(|| {
            let mut adapters = IndexMap::new();
            for (key, config) in self.configs.iter().filter(|(_, c)| c.enabled) {
                let adapter = (config.factory)(*key, &config.settings)?;
                if adapter.key() != *key {
                    return Err(Error::Configuration(format!(
                        "Adapter registered for {key} reports itself as {}",
                        adapter.key()
                    )));
                }
                info!(provider = %key, "Initialized identity provider adapter");
                adapters.insert(*key, adapter);
            }
            Ok(adapters)
        })
    }
}
