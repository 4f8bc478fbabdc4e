//! Plugins shipped with the service.

pub mod entities;
pub mod spam;

use std::sync::Arc;

use crate::error::RegistryError;
use crate::plugins::registry::PluginRegistry;

pub use entities::EntityExtractor;
pub use spam::SpamDetector;

/// Register every built-in plugin.
pub fn register_builtins(registry: &mut PluginRegistry) -> Result<(), RegistryError> {
    registry.register(spam::NAME, || Arc::new(SpamDetector::new()))?;
    registry.register(entities::NAME, || Arc::new(EntityExtractor::new()))?;
    Ok(())
}
