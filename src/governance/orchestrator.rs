//! Governance orchestrator: one feedback event in, one persisted snapshot
//! and one rendered directive out.
//!
//! A cycle runs:
//! 1. feedback classification (at most one trust signal)
//! 2. trust resolution (lazy decay)
//! 3. a single thermal sample and mode selection
//! 4. snapshot assembly and directive rendering
//! 5. persistence (errors propagate; step 1 is not rolled back)

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::clock::{Clock, SystemClock};
use super::governor::ResourceGovernor;
use super::state::{Capability, SystemStateSnapshot};
use super::trust::{TrustLedger, TrustSignal};
use crate::error::Error;
use crate::store::StateStore;

/// Keyword chain for feedback classification, in priority order.
const FEEDBACK_KEYWORDS: &[(&str, TrustSignal)] = &[
    ("correct", TrustSignal::CorrectionAdapted),
    ("confirm", TrustSignal::ConfirmedAnalysis),
    ("false positive", TrustSignal::FalsePositive),
    ("overreach", TrustSignal::OverreachRejected),
    ("rejected", TrustSignal::OverreachRejected),
    ("wrong", TrustSignal::FalsePositive),
];

/// Classify free-text feedback into at most one trust signal.
///
/// Case-insensitive substring match; the first keyword in
/// `FEEDBACK_KEYWORDS` order wins. Note that "incorrect" contains
/// "correct" and therefore classifies as a correction.
pub fn classify_feedback(feedback: &str) -> Option<TrustSignal> {
    let lowered = feedback.to_lowercase();
    FEEDBACK_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, signal)| *signal)
}

/// Render the directive block for a snapshot and the caller's context.
pub fn render_directive(snapshot: &SystemStateSnapshot, context: &str) -> String {
    format!(
        "Trust Level: {}\nThermal State: {}\nInference Mode: {}\nContext: {}",
        snapshot.trust_level, snapshot.thermal_state, snapshot.inference_mode, context
    )
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub directive: String,
    pub signal: Option<TrustSignal>,
    pub snapshot: SystemStateSnapshot,
}

/// Owns one governance context: ledger, governor, store and the configured
/// capability set.
pub struct Orchestrator {
    ledger: Arc<TrustLedger>,
    governor: Arc<ResourceGovernor>,
    store: Arc<dyn StateStore>,
    capabilities: BTreeMap<String, Capability>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<TrustLedger>,
        governor: Arc<ResourceGovernor>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            ledger,
            governor,
            store,
            capabilities: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Capabilities copied into every snapshot.
    pub fn with_capabilities(mut self, capabilities: BTreeMap<String, Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Clock used for snapshot timestamps. Should match the ledger's clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ledger(&self) -> &Arc<TrustLedger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn capabilities(&self) -> &BTreeMap<String, Capability> {
        &self.capabilities
    }

    /// Run one cycle and return the directive text.
    pub async fn run_cycle(&self, context: &str, feedback: Option<&str>) -> Result<String, Error> {
        self.run_cycle_detailed(context, feedback)
            .await
            .map(|report| report.directive)
    }

    /// Run one cycle and return the directive along with the snapshot that
    /// was persisted.
    pub async fn run_cycle_detailed(
        &self,
        context: &str,
        feedback: Option<&str>,
    ) -> Result<CycleReport, Error> {
        let signal = feedback.and_then(classify_feedback);
        if let Some(signal) = signal {
            self.ledger.record_signal(signal);
        }

        let snapshot = self.snapshot().await;
        let directive = render_directive(&snapshot, context);

        self.store.persist(snapshot.clone()).await?;

        info!(
            signal = ?signal,
            trust = %snapshot.trust_level,
            thermal = %snapshot.thermal_state,
            mode = %snapshot.inference_mode,
            "Governance cycle complete"
        );

        Ok(CycleReport {
            directive,
            signal,
            snapshot,
        })
    }

    /// Build a fresh snapshot: decay-and-resolve trust, sample thermal
    /// telemetry once. Records no signal and persists nothing.
    pub async fn snapshot(&self) -> SystemStateSnapshot {
        let trust_level = self.ledger.resolve_level();
        let thermal_state = self.governor.sample_thermal_state().await;
        let inference_mode = self.governor.select_mode(thermal_state);

        SystemStateSnapshot {
            trust_level,
            thermal_state,
            inference_mode,
            capabilities: self.capabilities.clone(),
            last_transition_timestamp: self.clock.now(),
        }
    }
}
