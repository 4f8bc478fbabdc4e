//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Where thermal readings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryBackend {
    /// Linux hwmon and thermal-zone sensors under a sysfs root.
    Sysfs { root: PathBuf },
    /// No sensors; the governor always resolves COOL.
    None,
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernanceConfig {
    /// HTTP bind host.
    pub bind: String,
    /// HTTP port.
    pub port: u16,
    /// libSQL database file, or `:memory:`.
    pub db_path: String,
    /// Governance context persisted by this process.
    pub context_id: String,
    /// Opt-in capabilities that should start enabled.
    pub enabled_capabilities: Vec<String>,
    pub telemetry: TelemetryBackend,
    /// Directory for rolling log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            db_path: "./data/tuda.db".to_string(),
            context_id: "default".to_string(),
            enabled_capabilities: Vec::new(),
            telemetry: TelemetryBackend::Sysfs {
                root: PathBuf::from("/sys/class"),
            },
            log_dir: None,
        }
    }
}

impl GovernanceConfig {
    /// Load from `TUDA_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind = lookup("TUDA_BIND").unwrap_or(defaults.bind);

        let port = match lookup("TUDA_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "TUDA_PORT".into(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => defaults.port,
        };

        let db_path = lookup("TUDA_DB_PATH").unwrap_or(defaults.db_path);
        if db_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "TUDA_DB_PATH".into(),
                hint: "Use a file path or \":memory:\" for an ephemeral store.".into(),
            });
        }

        let context_id = lookup("TUDA_CONTEXT_ID").unwrap_or(defaults.context_id);
        if context_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "TUDA_CONTEXT_ID".into(),
                hint: "Unset it to use \"default\".".into(),
            });
        }

        let enabled_capabilities: Vec<String> = lookup("TUDA_ENABLED_CAPABILITIES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let sysfs_root = lookup("TUDA_SYSFS_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/sys/class"));
        let telemetry = match lookup("TUDA_TELEMETRY").as_deref().map(str::trim) {
            None | Some("sysfs") => TelemetryBackend::Sysfs { root: sysfs_root },
            Some("none") => TelemetryBackend::None,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "TUDA_TELEMETRY".into(),
                    message: format!("expected \"sysfs\" or \"none\", got {other:?}"),
                });
            }
        };

        let log_dir = lookup("TUDA_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind,
            port,
            db_path,
            context_id,
            enabled_capabilities,
            telemetry,
            log_dir,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == ":memory:"
    }
}
