//! Trust ledger: a quality-weighted, time-decaying trust score.
//!
//! The score moves in two ways:
//! - explicit feedback signals add or subtract a fixed weight
//! - elapsed wall-clock time drains it at `DECAY_PER_SECOND`
//!
//! Decay is applied lazily, immediately before every level resolution,
//! so no background timer is involved. All reads and writes of the score
//! go through one mutex; decay-then-resolve is a single critical section.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::state::TrustLevel;

/// Score drained per elapsed second.
pub const DECAY_PER_SECOND: f64 = 0.0001;

/// Number of signal events retained in the ledger history.
pub const HISTORY_LIMIT: usize = 200;

/// A named feedback event that moves the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustSignal {
    ConfirmedAnalysis,
    CorrectionAdapted,
    FalsePositive,
    OverreachRejected,
}

impl TrustSignal {
    /// Signed score delta for this signal.
    pub fn weight(&self) -> f64 {
        match self {
            Self::ConfirmedAnalysis => 2.0,
            Self::CorrectionAdapted => 3.0,
            Self::FalsePositive => -2.0,
            Self::OverreachRejected => -5.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmedAnalysis => "confirmed_analysis",
            Self::CorrectionAdapted => "correction_adapted",
            Self::FalsePositive => "false_positive",
            Self::OverreachRejected => "overreach_rejected",
        }
    }
}

impl fmt::Display for TrustSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEvent {
    pub signal: TrustSignal,
    pub delta: f64,
    pub score_after: f64,
    pub at: DateTime<Utc>,
}

struct LedgerState {
    score: f64,
    last_decay: DateTime<Utc>,
    history: VecDeque<TrustEvent>,
}

impl LedgerState {
    fn decay(&mut self, now: DateTime<Utc>) -> f64 {
        // Elapsed time is kept to the nanosecond so frequent resolution loses
        // none of it. A clock that steps backwards contributes no decay and
        // does not rewind the decay timestamp.
        if let Ok(elapsed) = (now - self.last_decay).to_std() {
            self.score -= elapsed.as_secs_f64() * DECAY_PER_SECOND;
            self.last_decay = now;
        }
        self.score
    }
}

/// Shared, mutex-protected trust ledger. One per governance context.
pub struct TrustLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
}

impl TrustLedger {
    /// A ledger at score zero, decaying against the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A ledger at score zero using the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_score(0.0, clock)
    }

    /// A ledger starting from an arbitrary score.
    pub fn with_score(score: f64, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(LedgerState {
                score,
                last_decay: now,
                history: VecDeque::with_capacity(HISTORY_LIMIT),
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // The guarded state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a signal's fixed weight. Returns the score afterwards.
    pub fn record_signal(&self, signal: TrustSignal) -> f64 {
        let at = self.clock.now();
        let mut state = self.lock();
        state.score += signal.weight();
        let score_after = state.score;

        if state.history.len() == HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(TrustEvent {
            signal,
            delta: signal.weight(),
            score_after,
            at,
        });

        info!(
            signal = %signal,
            weight = signal.weight(),
            score = score_after,
            "Trust signal recorded"
        );
        score_after
    }

    /// Drain the score by the time elapsed since the last decay.
    /// Returns the score afterwards.
    pub fn decay(&self) -> f64 {
        let now = self.clock.now();
        self.lock().decay(now)
    }

    /// Decay, then map the score onto a trust level.
    pub fn resolve_level(&self) -> TrustLevel {
        let now = self.clock.now();
        let score = self.lock().decay(now);
        let level = TrustLevel::from_score(score);
        debug!(score, level = %level, "Trust level resolved");
        level
    }

    /// Current score without applying decay.
    pub fn score(&self) -> f64 {
        self.lock().score
    }

    /// Recorded signals, oldest first.
    pub fn history(&self) -> Vec<TrustEvent> {
        self.lock().history.iter().cloned().collect()
    }
}

impl Default for TrustLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrustLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustLedger")
            .field("score", &self.score())
            .finish()
    }
}
