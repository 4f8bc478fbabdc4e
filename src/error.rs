//! Error types for the governance core.

use crate::governance::state::TrustLevel;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors. Surfaced to callers of an orchestration cycle as a
/// hard failure; the cycle's in-memory effects are not undone.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Telemetry read errors. The resource governor swallows these.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to read sensor {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed sensor value in {path}: {value:?}")]
    Parse { path: String, value: String },
}

/// Plugin registry configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Plugin {name} is registered more than once")]
    DuplicateName { name: String },

    #[error("Plugin registered as {registered} reports its name as {reported}")]
    NameMismatch { registered: String, reported: String },
}

/// Errors raised by a plugin's own execution. Passed through the dispatcher
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid message for plugin {name}: {reason}")]
    InvalidMessage { name: String, reason: String },

    #[error("Plugin {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },
}

/// Dispatch gate errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Capability {name} not found")]
    NotFound { name: String },

    #[error("Permission denied for {name}: requires {required}, current trust is {current}")]
    PermissionDenied {
        name: String,
        required: TrustLevel,
        current: TrustLevel,
    },

    #[error("Capability {name} is disabled")]
    Disabled { name: String },

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Result type alias for the governance core.
pub type Result<T> = std::result::Result<T, Error>;
