//! Governance core: trust ledger, resource governor and the orchestrator
//! that combines them into per-cycle state snapshots.

pub mod clock;
pub mod governor;
pub mod orchestrator;
pub mod state;
pub mod telemetry;
pub mod trust;

pub use clock::{Clock, ManualClock, SystemClock};
pub use governor::ResourceGovernor;
pub use orchestrator::{CycleReport, Orchestrator, classify_feedback, render_directive};
pub use state::{Capability, InferenceMode, SystemStateSnapshot, ThermalState, TrustLevel};
pub use telemetry::{NoTelemetry, SensorReading, StaticTelemetry, SysfsTelemetry, TelemetrySource};
pub use trust::{TrustEvent, TrustLedger, TrustSignal};
