//! Plugin trait: the execution contract for a gated capability.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PluginError;
use crate::governance::state::TrustLevel;

/// The message a plugin runs against: a JSON object such as
/// `{"subject": "...", "sender": "...", "snippet": "..."}`.
pub type PluginMessage = serde_json::Map<String, Value>;

/// A named unit of work that the dispatcher may or may not allow to run.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique name; also the capability name.
    fn name(&self) -> &str;

    /// One-line description for capability listings.
    fn description(&self) -> &str;

    /// Minimum trust level required to run.
    fn requires_trust(&self) -> TrustLevel;

    /// Whether the capability stays disabled until explicitly enabled.
    fn requires_explicit_opt_in(&self) -> bool {
        true
    }

    /// Do the work. Errors are returned to the caller unchanged.
    async fn run(&self, message: &PluginMessage) -> Result<Value, PluginError>;
}

/// Read an optional string field. Absent or null is `""`; any other
/// non-string value is an invalid message.
pub fn text_field<'a>(
    plugin: &str,
    message: &'a PluginMessage,
    field: &str,
) -> Result<&'a str, PluginError> {
    match message.get(field) {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(PluginError::InvalidMessage {
            name: plugin.to_string(),
            reason: format!("field '{field}' must be a string, got {other}"),
        }),
    }
}
