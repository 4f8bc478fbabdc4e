//! TUDA adaptive governance core.
//!
//! Trust ledger and resource governor feed an orchestrator that emits one
//! state snapshot per cycle; the plugin dispatcher gates capabilities on it.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod governance;
pub mod plugins;
pub mod store;
