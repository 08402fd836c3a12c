//! External diagnosis source configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// Consult the external source at all; otherwise rule-based plans only
    pub enabled: bool,

    /// API key for the chat-completions endpoint
    pub api_key: Option<String>,

    pub model: String,

    pub endpoint: String,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    pub temperature: f32,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: "gpt-4".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            request_timeout: Duration::from_secs(60),
            temperature: 0.3,
        }
    }
}

impl DiagnosisConfig {
    /// The external source is usable only when enabled and keyed
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for DiagnosisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosisConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}
