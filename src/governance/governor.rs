//! Resource governor. Maps thermal telemetry to a thermal state and an inference mode.
//!
//! Never fails: a telemetry read error or an empty sensor list is treated as
//! `ThermalState::Cool`, the least restrictive state.

use std::sync::Arc;

use tracing::{debug, warn};

use super::state::{InferenceMode, ThermalState};
use super::telemetry::{SensorReading, TelemetrySource};

pub struct ResourceGovernor {
    source: Arc<dyn TelemetrySource>,
}

impl ResourceGovernor {
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        Self { source }
    }

    /// Read telemetry once and classify the hottest sample.
    pub async fn sample_thermal_state(&self) -> ThermalState {
        match self.source.sample().await {
            Ok(readings) => {
                let state = classify(&readings);
                debug!(
                    sensors = readings.len(),
                    max_celsius = ?max_celsius(&readings),
                    thermal = %state,
                    "Thermal state sampled"
                );
                state
            }
            Err(e) => {
                warn!(error = %e, "Telemetry unavailable, assuming COOL");
                ThermalState::Cool
            }
        }
    }

    /// Pure thermal-state to mode mapping.
    pub fn select_mode(&self, thermal: ThermalState) -> InferenceMode {
        InferenceMode::for_thermal(thermal)
    }
}

/// Hottest sample across all sensors. NaN is ignored; `+inf` counts as hot.
pub fn max_celsius(readings: &[SensorReading]) -> Option<f64> {
    readings
        .iter()
        .flat_map(|r| r.celsius.iter().copied())
        .filter(|c| !c.is_nan())
        .reduce(f64::max)
}

/// Classify a set of readings; no samples means COOL.
pub fn classify(readings: &[SensorReading]) -> ThermalState {
    max_celsius(readings)
        .map(ThermalState::from_celsius)
        .unwrap_or(ThermalState::Cool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;
    use crate::governance::telemetry::{NoTelemetry, StaticTelemetry};
    use async_trait::async_trait;

    struct BrokenTelemetry;

    #[async_trait]
    impl TelemetrySource for BrokenTelemetry {
        async fn sample(&self) -> Result<Vec<SensorReading>, TelemetryError> {
            Err(TelemetryError::Parse {
                path: "/sys/class/thermal/thermal_zone0/temp".into(),
                value: "??".into(),
            })
        }
    }

    #[tokio::test]
    async fn no_telemetry_is_cool_and_nf4() {
        let governor = ResourceGovernor::new(Arc::new(NoTelemetry));
        let state = governor.sample_thermal_state().await;
        assert_eq!(state, ThermalState::Cool);
        assert_eq!(governor.select_mode(state), InferenceMode::Nf4);
    }

    #[tokio::test]
    async fn read_failure_is_swallowed() {
        let governor = ResourceGovernor::new(Arc::new(BrokenTelemetry));
        assert_eq!(governor.sample_thermal_state().await, ThermalState::Cool);
    }

    #[tokio::test]
    async fn hottest_sensor_wins() {
        let source = StaticTelemetry::new(vec![
            SensorReading::new("acpitz", vec![30.0]),
            SensorReading::new("coretemp", vec![52.0, 86.0, 70.0]),
            SensorReading::new("nvme", vec![41.0]),
        ]);
        let governor = ResourceGovernor::new(Arc::new(source));
        let state = governor.sample_thermal_state().await;
        assert_eq!(state, ThermalState::Critical);
        assert_eq!(governor.select_mode(state), InferenceMode::Sleep);
    }

    #[test]
    fn sensors_without_samples_are_cool() {
        let readings = vec![SensorReading::new("empty", vec![])];
        assert_eq!(classify(&readings), ThermalState::Cool);
    }

    #[test]
    fn nan_samples_are_ignored() {
        let readings = vec![SensorReading::new("flaky", vec![f64::NAN, 76.0])];
        assert_eq!(classify(&readings), ThermalState::Hot);
    }

    #[test]
    fn infinite_sample_is_critical() {
        let readings = vec![
            SensorReading::new("cpu", vec![40.0]),
            SensorReading::new("runaway", vec![f64::NAN, f64::INFINITY]),
        ];
        assert_eq!(max_celsius(&readings), Some(f64::INFINITY));
        assert_eq!(classify(&readings), ThermalState::Critical);
    }
}
