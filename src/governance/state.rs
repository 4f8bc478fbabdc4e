//! Governance data model: trust levels, thermal states, inference modes,
//! capabilities and the per-cycle state snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete permission tier derived from the trust score.
///
/// Ordered: SEED < PEER < WARDEN < INTEGRATED.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    #[default]
    Seed = 0,
    Peer = 1,
    Warden = 2,
    Integrated = 3,
}

impl TrustLevel {
    /// Map a trust score onto a level. Lower bounds are inclusive.
    pub fn from_score(score: f64) -> Self {
        if score < 5.0 {
            Self::Seed
        } else if score < 20.0 {
            Self::Peer
        } else if score < 50.0 {
            Self::Warden
        } else {
            Self::Integrated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "SEED",
            Self::Peer => "PEER",
            Self::Warden => "WARDEN",
            Self::Integrated => "INTEGRATED",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEED" => Ok(Self::Seed),
            "PEER" => Ok(Self::Peer),
            "WARDEN" => Ok(Self::Warden),
            "INTEGRATED" => Ok(Self::Integrated),
            other => Err(format!("unknown trust level: {other}")),
        }
    }
}

/// Discrete resource-pressure tier derived from the hottest sensor.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThermalState {
    #[default]
    Cool = 0,
    Warm = 1,
    Hot = 2,
    Critical = 3,
}

impl ThermalState {
    /// Map a temperature in degrees Celsius onto a thermal state.
    pub fn from_celsius(celsius: f64) -> Self {
        if celsius < 60.0 {
            Self::Cool
        } else if celsius < 75.0 {
            Self::Warm
        } else if celsius < 85.0 {
            Self::Hot
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cool => "COOL",
            Self::Warm => "WARM",
            Self::Hot => "HOT",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ThermalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThermalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COOL" => Ok(Self::Cool),
            "WARM" => Ok(Self::Warm),
            "HOT" => Ok(Self::Hot),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown thermal state: {other}")),
        }
    }
}

/// How much computation capabilities may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// 4-bit quantized inference.
    Nf4,
    /// 8-bit quantized inference.
    Int8,
    /// No model inference, rules only.
    Heuristic,
    /// Terminal degraded mode: nothing executes.
    Sleep,
}

impl InferenceMode {
    pub fn for_thermal(state: ThermalState) -> Self {
        match state {
            ThermalState::Cool => Self::Nf4,
            ThermalState::Warm => Self::Int8,
            ThermalState::Hot => Self::Heuristic,
            ThermalState::Critical => Self::Sleep,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nf4 => "nf4",
            Self::Int8 => "int8",
            Self::Heuristic => "heuristic",
            Self::Sleep => "sleep",
        }
    }

    pub fn is_sleep(&self) -> bool {
        matches!(self, Self::Sleep)
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nf4" => Ok(Self::Nf4),
            "int8" => Ok(Self::Int8),
            "heuristic" => Ok(Self::Heuristic),
            "sleep" => Ok(Self::Sleep),
            other => Err(format!("unknown inference mode: {other}")),
        }
    }
}

/// A named unit of gated functionality. Owned by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub enabled: bool,
    pub requires_trust: TrustLevel,
    pub requires_explicit_opt_in: bool,
}

/// Authoritative governance state for one orchestration cycle.
///
/// Never updated in place; every cycle builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStateSnapshot {
    pub trust_level: TrustLevel,
    pub thermal_state: ThermalState,
    pub inference_mode: InferenceMode,
    pub capabilities: BTreeMap<String, Capability>,
    pub last_transition_timestamp: DateTime<Utc>,
}

impl SystemStateSnapshot {
    pub fn new(
        trust_level: TrustLevel,
        thermal_state: ThermalState,
        capabilities: BTreeMap<String, Capability>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            trust_level,
            thermal_state,
            inference_mode: InferenceMode::for_thermal(thermal_state),
            capabilities,
            last_transition_timestamp: at,
        }
    }
}
