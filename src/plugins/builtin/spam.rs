//! Token heuristic spam check over subject and snippet.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::PluginError;
use crate::governance::state::TrustLevel;
use crate::plugins::plugin::{Plugin, PluginMessage, text_field};

pub const NAME: &str = "spam_detector";

/// Flags messages whose subject or snippet contains a known spam token.
pub struct SpamDetector {
    tokens: Regex,
}

impl SpamDetector {
    pub fn new() -> Self {
        Self {
            // Whole words only: "window" or "freedom" are not spam tokens.
            tokens: Regex::new(r"(?i)\b(win|lottery|prize|urgent|bitcoin|free)\b").unwrap(),
        }
    }
}

impl Default for SpamDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SpamDetector {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Flags messages containing common spam tokens"
    }

    fn requires_trust(&self) -> TrustLevel {
        TrustLevel::Seed
    }

    fn requires_explicit_opt_in(&self) -> bool {
        false
    }

    async fn run(&self, message: &PluginMessage) -> Result<Value, PluginError> {
        let subject = text_field(NAME, message, "subject")?;
        let snippet = text_field(NAME, message, "snippet")?;
        let text = format!("{subject} {snippet}");

        let mut matched: Vec<String> = self
            .tokens
            .find_iter(&text)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        matched.sort();
        matched.dedup();

        Ok(json!({
            "is_spam": !matched.is_empty(),
            "matched": matched,
        }))
    }
}
