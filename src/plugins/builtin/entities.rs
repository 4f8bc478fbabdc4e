//! Email address and URL extraction.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::PluginError;
use crate::governance::state::TrustLevel;
use crate::plugins::plugin::{Plugin, PluginMessage, text_field};

pub const NAME: &str = "entity_extractor";

const FIELDS: &[&str] = &["sender", "subject", "snippet", "body"];

/// Pulls email addresses and URLs out of a message.
pub struct EntityExtractor {
    email: Regex,
    url: Regex,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self {
            email: Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap(),
            url: Regex::new(r#"https?://[^\s<>"')\]]+"#).unwrap(),
        }
    }

    fn collect(regex: &Regex, text: &str, out: &mut Vec<String>) {
        for m in regex.find_iter(text) {
            let found = m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string();
            if !out.contains(&found) {
                out.push(found);
            }
        }
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for EntityExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Extracts email addresses and URLs from message text"
    }

    fn requires_trust(&self) -> TrustLevel {
        TrustLevel::Peer
    }

    async fn run(&self, message: &PluginMessage) -> Result<Value, PluginError> {
        let mut emails = Vec::new();
        let mut urls = Vec::new();

        for field in FIELDS {
            let text = text_field(NAME, message, field)?;
            Self::collect(&self.url, text, &mut urls);
            Self::collect(&self.email, text, &mut emails);
        }

        Ok(json!({ "emails": emails, "urls": urls }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(value: Value) -> PluginMessage {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn extracts_emails_and_urls_in_order() {
        let extractor = EntityExtractor::new();
        let result = extractor
            .run(&message(json!({
                "sender": "alice@example.com",
                "subject": "Docs at https://docs.example.com/start.",
                "body": "Ping bob@example.org or alice@example.com, see http://example.net/a?b=1"
            })))
            .await
            .unwrap();

        assert_eq!(
            result["emails"],
            json!(["alice@example.com", "bob@example.org"])
        );
        assert_eq!(
            result["urls"],
            json!(["https://docs.example.com/start", "http://example.net/a?b=1"])
        );
    }

    #[tokio::test]
    async fn empty_message_yields_empty_lists() {
        let extractor = EntityExtractor::new();
        let result = extractor.run(&PluginMessage::new()).await.unwrap();
        assert_eq!(result, json!({"emails": [], "urls": []}));
    }

    #[test]
    fn requires_opt_in_and_peer_trust() {
        let extractor = EntityExtractor::new();
        assert!(extractor.requires_explicit_opt_in());
        assert_eq!(extractor.requires_trust(), TrustLevel::Peer);
    }
}
