//! Plugin dispatcher. Gates plugin execution on a state snapshot.
//!
//! Gate order for one capability:
//! 1. `inference_mode == sleep` defers, whatever the trust level
//! 2. `trust_level < requires_trust` is `PermissionDenied`
//! 3. a disabled capability is `Disabled`
//! 4. otherwise the plugin runs and its result is returned unchanged

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, RegistryError};
use crate::governance::state::{Capability, InferenceMode, SystemStateSnapshot};
use crate::plugins::plugin::{Plugin, PluginMessage};
use crate::plugins::registry::PluginRegistry;

/// Non-error outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The plugin ran; `result` is exactly what it returned.
    Completed { result: Value },
    /// Execution withheld because of degraded resource state.
    Deferred { mode: InferenceMode },
}

/// Whether a gated capability may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Defer(InferenceMode),
}

/// Apply the trust/mode gate for `capability` under `snapshot`.
pub fn gate(capability: &Capability, snapshot: &SystemStateSnapshot) -> Result<Gate, DispatchError> {
    if snapshot.inference_mode.is_sleep() {
        return Ok(Gate::Defer(snapshot.inference_mode));
    }
    if snapshot.trust_level < capability.requires_trust {
        return Err(DispatchError::PermissionDenied {
            name: capability.name.clone(),
            required: capability.requires_trust,
            current: snapshot.trust_level,
        });
    }
    if !capability.enabled {
        return Err(DispatchError::Disabled {
            name: capability.name.clone(),
        });
    }
    Ok(Gate::Proceed)
}

/// Discovered plugins plus the gate that guards them.
pub struct PluginDispatcher {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginDispatcher {
    /// Build from already-instantiated plugins. Duplicate names are rejected.
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Result<Self, RegistryError> {
        let mut by_name = BTreeMap::new();
        for plugin in plugins {
            let name = plugin.name().to_string();
            if by_name.insert(name.clone(), plugin).is_some() {
                return Err(RegistryError::DuplicateName { name });
            }
        }
        Ok(Self { plugins: by_name })
    }

    /// Discover every plugin in the registry.
    pub fn from_registry(registry: &PluginRegistry) -> Result<Self, RegistryError> {
        let dispatcher = Self::new(registry.discover()?)?;
        info!(plugins = dispatcher.plugins.len(), "Plugins discovered");
        Ok(dispatcher)
    }

    /// Discovered plugins, ordered by name.
    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Capability declarations for every plugin.
    ///
    /// A capability is enabled unless it requires explicit opt-in and its
    /// name is missing from `opted_in`.
    pub fn capabilities(&self, opted_in: &[String]) -> BTreeMap<String, Capability> {
        self.plugins
            .values()
            .map(|plugin| {
                let name = plugin.name().to_string();
                let opt_in = plugin.requires_explicit_opt_in();
                let capability = Capability {
                    enabled: !opt_in || opted_in.iter().any(|n| n == &name),
                    requires_trust: plugin.requires_trust(),
                    requires_explicit_opt_in: opt_in,
                    name: name.clone(),
                };
                (name, capability)
            })
            .collect()
    }

    /// Run the named capability against `message` if the snapshot allows it.
    pub async fn dispatch(
        &self,
        name: &str,
        snapshot: &SystemStateSnapshot,
        message: &PluginMessage,
    ) -> Result<DispatchOutcome, DispatchError> {
        let not_found = || DispatchError::NotFound {
            name: name.to_string(),
        };
        let capability = snapshot.capabilities.get(name).ok_or_else(not_found)?;
        let plugin = self.get(name).ok_or_else(not_found)?;

        match gate(capability, snapshot) {
            Ok(Gate::Defer(mode)) => {
                info!(plugin = name, mode = %mode, "Dispatch deferred");
                Ok(DispatchOutcome::Deferred { mode })
            }
            Ok(Gate::Proceed) => {
                debug!(plugin = name, trust = %snapshot.trust_level, "Dispatching plugin");
                let result = plugin.run(message).await?;
                Ok(DispatchOutcome::Completed { result })
            }
            Err(e) => {
                warn!(plugin = name, error = %e, "Dispatch refused");
                Err(e)
            }
        }
    }

    /// Dispatch every capability in the snapshot, collecting each outcome.
    pub async fn dispatch_all(
        &self,
        snapshot: &SystemStateSnapshot,
        message: &PluginMessage,
    ) -> Vec<(String, Result<DispatchOutcome, DispatchError>)> {
        let mut results = Vec::with_capacity(snapshot.capabilities.len());
        for name in snapshot.capabilities.keys() {
            let outcome = self.dispatch(name, snapshot, message).await;
            results.push((name.clone(), outcome));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use crate::governance::state::{ThermalState, TrustLevel};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPlugin {
        name: &'static str,
        requires: TrustLevel,
        opt_in: bool,
        runs: AtomicUsize,
        fail: bool,
    }

    impl CountingPlugin {
        fn new(name: &'static str, requires: TrustLevel) -> Arc<Self> {
            Arc::new(Self {
                name,
                requires,
                opt_in: false,
                runs: AtomicUsize::new(0),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "counts runs"
        }
        fn requires_trust(&self) -> TrustLevel {
            self.requires
        }
        fn requires_explicit_opt_in(&self) -> bool {
            self.opt_in
        }
        async fn run(&self, message: &PluginMessage) -> Result<Value, PluginError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PluginError::ExecutionFailed {
                    name: self.name.to_string(),
                    reason: "model exploded".into(),
                });
            }
            Ok(json!({"echo": message.get("subject")}))
        }
    }

    fn snapshot(
        dispatcher: &PluginDispatcher,
        trust: TrustLevel,
        thermal: ThermalState,
    ) -> SystemStateSnapshot {
        SystemStateSnapshot::new(trust, thermal, dispatcher.capabilities(&[]), Utc::now())
    }

    fn message() -> PluginMessage {
        json!({"subject": "hello"}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn permitted_plugin_runs_and_result_is_unchanged() {
        let plugin = CountingPlugin::new("echo", TrustLevel::Peer);
        let dispatcher = PluginDispatcher::new(vec![plugin.clone()]).unwrap();
        let snap = snapshot(&dispatcher, TrustLevel::Warden, ThermalState::Hot);

        let outcome = dispatcher.dispatch("echo", &snap, &message()).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                result: json!({"echo": "hello"})
            }
        );
        assert_eq!(plugin.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn insufficient_trust_is_denied() {
        let plugin = CountingPlugin::new("echo", TrustLevel::Warden);
        let dispatcher = PluginDispatcher::new(vec![plugin.clone()]).unwrap();
        let snap = snapshot(&dispatcher, TrustLevel::Peer, ThermalState::Cool);

        let err = dispatcher.dispatch("echo", &snap, &message()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::PermissionDenied {
                required: TrustLevel::Warden,
                current: TrustLevel::Peer,
                ..
            }
        ));
        assert_eq!(plugin.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sleep_mode_defers_even_at_integrated_trust() {
        let plugin = CountingPlugin::new("echo", TrustLevel::Seed);
        let dispatcher = PluginDispatcher::new(vec![plugin.clone()]).unwrap();

        for trust in [TrustLevel::Seed, TrustLevel::Integrated] {
            let snap = snapshot(&dispatcher, trust, ThermalState::Critical);
            let outcome = dispatcher.dispatch("echo", &snap, &message()).await.unwrap();
            assert_eq!(
                outcome,
                DispatchOutcome::Deferred {
                    mode: InferenceMode::Sleep
                }
            );
        }
        assert_eq!(plugin.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sleep_mode_wins_over_insufficient_trust() {
        let plugin = CountingPlugin::new("echo", TrustLevel::Integrated);
        let dispatcher = PluginDispatcher::new(vec![plugin]).unwrap();
        let snap = snapshot(&dispatcher, TrustLevel::Seed, ThermalState::Critical);

        let outcome = dispatcher.dispatch("echo", &snap, &message()).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Deferred { .. }));
    }

    #[tokio::test]
    async fn plugin_errors_pass_through() {
        let plugin = Arc::new(CountingPlugin {
            name: "broken",
            requires: TrustLevel::Seed,
            opt_in: false,
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let dispatcher = PluginDispatcher::new(vec![plugin]).unwrap();
        let snap = snapshot(&dispatcher, TrustLevel::Seed, ThermalState::Cool);

        let err = dispatcher.dispatch("broken", &snap, &message()).await.unwrap_err();
        assert_eq!(err.to_string(), "Plugin broken execution failed: model exploded");
        assert!(matches!(
            err,
            DispatchError::Plugin(PluginError::ExecutionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_capability_is_not_found() {
        let dispatcher = PluginDispatcher::new(vec![]).unwrap();
        let snap = snapshot(&dispatcher, TrustLevel::Integrated, ThermalState::Cool);
        let err = dispatcher.dispatch("ghost", &snap, &message()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { ref name } if name == "ghost"));
    }

    #[tokio::test]
    async fn opt_in_capabilities_start_disabled() {
        let plugin = Arc::new(CountingPlugin {
            name: "optional",
            requires: TrustLevel::Seed,
            opt_in: true,
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let dispatcher = PluginDispatcher::new(vec![plugin]).unwrap();

        let caps = dispatcher.capabilities(&[]);
        assert!(!caps["optional"].enabled);
        let snap = SystemStateSnapshot::new(TrustLevel::Seed, ThermalState::Cool, caps, Utc::now());
        let err = dispatcher.dispatch("optional", &snap, &message()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Disabled { .. }));

        let caps = dispatcher.capabilities(&["optional".to_string()]);
        assert!(caps["optional"].enabled);
        let snap = SystemStateSnapshot::new(TrustLevel::Seed, ThermalState::Cool, caps, Utc::now());
        assert!(dispatcher.dispatch("optional", &snap, &message()).await.is_ok());
    }

    #[test]
    fn duplicate_plugins_are_rejected() {
        let a = CountingPlugin::new("same", TrustLevel::Seed);
        let b = CountingPlugin::new("same", TrustLevel::Peer);
        let err = PluginDispatcher::new(vec![a, b]).err().unwrap();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn dispatch_all_reports_each_capability() {
        let low = CountingPlugin::new("low", TrustLevel::Seed);
        let high = CountingPlugin::new("high", TrustLevel::Integrated);
        let dispatcher = PluginDispatcher::new(vec![low, high]).unwrap();
        let snap = snapshot(&dispatcher, TrustLevel::Peer, ThermalState::Warm);

        let results = dispatcher.dispatch_all(&snap, &message()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "high");
        assert!(matches!(results[0].1, Err(DispatchError::PermissionDenied { .. })));
        assert_eq!(results[1].0, "low");
        assert!(matches!(results[1].1, Ok(DispatchOutcome::Completed { .. })));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let deferred = serde_json::to_value(DispatchOutcome::Deferred {
            mode: InferenceMode::Sleep,
        })
        .unwrap();
        assert_eq!(deferred, json!({"status": "deferred", "mode": "sleep"}));
    }
}
