//! Service assembly: store, telemetry, plugins and orchestrator from config.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::AppState;
use crate::config::{GovernanceConfig, TelemetryBackend};
use crate::error::{ConfigError, Result};
use crate::governance::{
    NoTelemetry, Orchestrator, ResourceGovernor, SysfsTelemetry, TelemetrySource, TrustLedger,
};
use crate::plugins::{PluginDispatcher, PluginRegistry, register_builtins};
use crate::store::{LibSqlStateStore, StateStore};

/// Open the store, discover plugins and wire up the orchestrator.
///
/// Opting in to a capability no plugin provides is a configuration error.
pub async fn build_state(config: &GovernanceConfig) -> Result<AppState> {
    let store: Arc<dyn StateStore> = if config.is_in_memory() {
        Arc::new(LibSqlStateStore::new_memory(config.context_id.clone()).await?)
    } else {
        Arc::new(
            LibSqlStateStore::new_local(Path::new(&config.db_path), config.context_id.clone())
                .await?,
        )
    };

    let telemetry: Arc<dyn TelemetrySource> = match &config.telemetry {
        TelemetryBackend::Sysfs { root } => Arc::new(SysfsTelemetry::new(root.clone())),
        TelemetryBackend::None => Arc::new(NoTelemetry),
    };

    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry)?;
    let dispatcher = Arc::new(PluginDispatcher::from_registry(&registry)?);

    if let Some(unknown) = config
        .enabled_capabilities
        .iter()
        .find(|name| !registry.has(name))
    {
        return Err(ConfigError::InvalidValue {
            key: "TUDA_ENABLED_CAPABILITIES".into(),
            message: format!("no plugin named {unknown:?}; known: {}", registry.names().join(", ")),
        }
        .into());
    }

    let capabilities = dispatcher.capabilities(&config.enabled_capabilities);
    for capability in capabilities.values() {
        info!(
            plugin = %capability.name,
            requires = %capability.requires_trust,
            enabled = capability.enabled,
            "Capability registered"
        );
    }

    let ledger = Arc::new(TrustLedger::new());
    let governor = Arc::new(ResourceGovernor::new(telemetry));
    let orchestrator =
        Arc::new(Orchestrator::new(ledger, governor, store).with_capabilities(capabilities));

    Ok(AppState {
        orchestrator,
        dispatcher,
    })
}
