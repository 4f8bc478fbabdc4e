//! Plugin registry: an explicit name → factory table populated at start-up.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::plugins::plugin::Plugin;

/// Builds a plugin instance.
pub type PluginFactory = Box<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// Registry of available plugin factories, ordered by name.
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory under `name`. A name can only be registered once.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            tracing::warn!(plugin = %name, "Rejected duplicate plugin registration");
            return Err(RegistryError::DuplicateName { name });
        }
        tracing::debug!("Registered plugin: {}", name);
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Check if a plugin name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Get the number of registered plugins.
    pub fn count(&self) -> usize {
        self.factories.len()
    }

    /// Instantiate every registered plugin, ordered by name.
    ///
    /// A plugin whose reported name differs from its registration key is a
    /// configuration error.
    pub fn discover(&self) -> Result<Vec<Arc<dyn Plugin>>, RegistryError> {
        self.factories
            .iter()
            .map(|(registered, factory)| {
                let plugin = factory();
                if plugin.name() != registered {
                    return Err(RegistryError::NameMismatch {
                        registered: registered.clone(),
                        reported: plugin.name().to_string(),
                    });
                }
                Ok(plugin)
            })
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
