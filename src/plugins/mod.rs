//! Plugin system: registry, trust-gated dispatcher and built-in plugins.

pub mod builtin;
pub mod dispatcher;
pub mod plugin;
pub mod registry;

pub use builtin::register_builtins;
pub use dispatcher::{DispatchOutcome, Gate, PluginDispatcher, gate};
pub use plugin::{Plugin, PluginMessage};
pub use registry::{PluginFactory, PluginRegistry};
