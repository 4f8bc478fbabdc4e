//! Temperature telemetry sources.
//!
//! `SysfsTelemetry` reads Linux hwmon and thermal-zone sensors. Both expose
//! millidegrees Celsius as plain integers:
//!
//! - `/sys/class/hwmon/hwmonN/name` + `tempK_input`
//! - `/sys/class/thermal/thermal_zoneN/type` + `temp`
//!
//! Missing sensor directories mean "no telemetry", which is not an error.
//! A sensor whose file cannot be read or parsed is skipped.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TelemetryError;

/// Current-temperature samples from one named sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub name: String,
    pub celsius: Vec<f64>,
}

impl SensorReading {
    pub fn new(name: impl Into<String>, celsius: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            celsius,
        }
    }
}

/// Something that can report sensor temperatures.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Read all sensors. An empty result means no telemetry is available.
    async fn sample(&self) -> Result<Vec<SensorReading>, TelemetryError>;
}

/// A source with no sensors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetry;

#[async_trait]
impl TelemetrySource for NoTelemetry {
    async fn sample(&self) -> Result<Vec<SensorReading>, TelemetryError> {
        Ok(Vec::new())
    }
}

/// A source returning fixed readings that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticTelemetry {
    readings: RwLock<Vec<SensorReading>>,
}

impl StaticTelemetry {
    pub fn new(readings: Vec<SensorReading>) -> Self {
        Self {
            readings: RwLock::new(readings),
        }
    }

    /// A single sensor with a single sample.
    pub fn single(celsius: f64) -> Self {
        Self::new(vec![SensorReading::new("static", vec![celsius])])
    }

    pub fn set(&self, readings: Vec<SensorReading>) {
        *self.readings.write().unwrap_or_else(|e| e.into_inner()) = readings;
    }
}

#[async_trait]
impl TelemetrySource for StaticTelemetry {
    async fn sample(&self) -> Result<Vec<SensorReading>, TelemetryError> {
        Ok(self
            .readings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// Linux sysfs sensor reader.
#[derive(Debug, Clone)]
pub struct SysfsTelemetry {
    root: PathBuf,
}

impl SysfsTelemetry {
    /// Read sensors under `root` (normally `/sys/class`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_hwmon(&self, scan: &mut Scan) -> Result<(), TelemetryError> {
        let dir = self.root.join("hwmon");
        for device in list_dir(&dir).await? {
            let name = match read_label(&device.join("name")).await {
                Ok(label) => label.unwrap_or_else(|| file_name(&device)),
                Err(e) => {
                    scan.skip(e);
                    file_name(&device)
                }
            };

            let entries = match list_dir(&device).await {
                Ok(entries) => entries,
                Err(e) => {
                    scan.skip(e);
                    continue;
                }
            };
            let mut celsius = Vec::new();
            for entry in entries {
                let fname = file_name(&entry);
                if fname.starts_with("temp") && fname.ends_with("_input") {
                    match read_millidegrees(&entry).await {
                        Ok(Some(value)) => celsius.push(value),
                        Ok(None) => {}
                        Err(e) => scan.skip(e),
                    }
                }
            }
            if !celsius.is_empty() {
                scan.readings.push(SensorReading { name, celsius });
            }
        }
        Ok(())
    }

    async fn read_thermal_zones(&self, scan: &mut Scan) -> Result<(), TelemetryError> {
        let dir = self.root.join("thermal");
        for zone in list_dir(&dir).await? {
            let fname = file_name(&zone);
            if !fname.starts_with("thermal_zone") {
                continue;
            }
            let name = match read_label(&zone.join("type")).await {
                Ok(label) => label.unwrap_or(fname),
                Err(e) => {
                    scan.skip(e);
                    fname
                }
            };
            match read_millidegrees(&zone.join("temp")).await {
                Ok(Some(value)) => scan.readings.push(SensorReading {
                    name,
                    celsius: vec![value],
                }),
                Ok(None) => {}
                Err(e) => scan.skip(e),
            }
        }
        Ok(())
    }
}

/// Readings gathered so far plus the first per-sensor failure.
#[derive(Default)]
struct Scan {
    readings: Vec<SensorReading>,
    first_error: Option<TelemetryError>,
}

impl Scan {
    fn skip(&mut self, e: TelemetryError) {
        warn!(error = %e, "Skipping unreadable sensor");
        self.first_error.get_or_insert(e);
    }
}

impl Default for SysfsTelemetry {
    fn default() -> Self {
        Self::new("/sys/class")
    }
}

#[async_trait]
impl TelemetrySource for SysfsTelemetry {
    /// Unreadable sensors are skipped. Fails only when some sensor failed
    /// and none could be read.
    async fn sample(&self) -> Result<Vec<SensorReading>, TelemetryError> {
        let mut scan = Scan::default();
        self.read_hwmon(&mut scan).await?;
        self.read_thermal_zones(&mut scan).await?;

        if scan.readings.is_empty() {
            if let Some(e) = scan.first_error {
                return Err(e);
            }
        }
        debug!(sensors = scan.readings.len(), root = %self.root.display(), "Sampled sysfs sensors");
        Ok(scan.readings)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn io_err(path: &Path, source: std::io::Error) -> TelemetryError {
    TelemetryError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sorted directory entries; a missing directory yields nothing.
async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, TelemetryError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(dir, e)),
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(dir, e))? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

async fn read_label(path: &Path) -> Result<Option<String>, TelemetryError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

async fn read_millidegrees(path: &Path) -> Result<Option<f64>, TelemetryError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    let value: i64 = raw.trim().parse().map_err(|_| TelemetryError::Parse {
        path: path.display().to_string(),
        value: raw.trim().to_string(),
    })?;
    Ok(Some(value as f64 / 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn missing_root_is_empty_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SysfsTelemetry::new(tmp.path().join("nope"));
        assert!(source.sample().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reads_hwmon_and_thermal_zones() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("hwmon/hwmon0/name"), "coretemp\n");
        write(&root.join("hwmon/hwmon0/temp1_input"), "45000\n");
        write(&root.join("hwmon/hwmon0/temp2_input"), "61500\n");
        write(&root.join("hwmon/hwmon0/temp1_label"), "Package id 0\n");
        write(&root.join("thermal/thermal_zone0/type"), "acpitz\n");
        write(&root.join("thermal/thermal_zone0/temp"), "27800\n");
        write(&root.join("thermal/cooling_device0/type"), "Processor\n");

        let readings = SysfsTelemetry::new(root).sample().await.unwrap();
        assert_eq!(
            readings,
            vec![
                SensorReading::new("coretemp", vec![45.0, 61.5]),
                SensorReading::new("acpitz", vec![27.8]),
            ]
        );
    }

    #[tokio::test]
    async fn unnamed_hwmon_uses_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("hwmon/hwmon3/temp1_input"), "70000");
        let readings = SysfsTelemetry::new(tmp.path()).sample().await.unwrap();
        assert_eq!(readings, vec![SensorReading::new("hwmon3", vec![70.0])]);
    }

    #[tokio::test]
    async fn garbage_value_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("thermal/thermal_zone0/temp"), "hot");
        let err = SysfsTelemetry::new(tmp.path()).sample().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Parse { .. }));
    }

    #[tokio::test]
    async fn unreadable_sensor_does_not_hide_hot_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("hwmon/hwmon0/name"), "coretemp\n");
        write(&root.join("hwmon/hwmon0/temp1_input"), "95000\n");
        write(&root.join("hwmon/hwmon0/temp2_input"), "garbage\n");
        write(&root.join("thermal/thermal_zone0/type"), "acpitz\n");
        write(&root.join("thermal/thermal_zone0/temp"), "N/A\n");

        let readings = SysfsTelemetry::new(root).sample().await.unwrap();
        assert_eq!(readings, vec![SensorReading::new("coretemp", vec![95.0])]);

        let governor = crate::governance::governor::ResourceGovernor::new(std::sync::Arc::new(
            SysfsTelemetry::new(root),
        ));
        assert_eq!(
            governor.sample_thermal_state().await,
            crate::governance::state::ThermalState::Critical
        );
    }

    #[tokio::test]
    async fn static_source_can_be_swapped() {
        let source = StaticTelemetry::single(50.0);
        assert_eq!(source.sample().await.unwrap()[0].celsius, vec![50.0]);
        source.set(Vec::new());
        assert!(source.sample().await.unwrap().is_empty());
    }
}
