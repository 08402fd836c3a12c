//! Diagnosis backed by an OpenAI-compatible chat completions endpoint

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, info};

use super::{DiagnosisRequest, DiagnosisResponse, DiagnosisSource};
use crate::config::DiagnosisConfig;
use crate::error::{VigilError, VigilResult};

const SYSTEM_PROMPT: &str = r#"You are a site reliability engineer analyzing incidents on a small HTTP service.
Examine the symptoms, logs and configuration, identify the root cause and propose the safest fix.

Reply with a single JSON object and nothing else:
{
  "diagnosis": "root cause in one or two sentences",
  "fix_type": "restart" | "config" | "code",
  "fix_steps": ["step", "..."],
  "code": "patch text, only when fix_type is code",
  "confidence": 0.0-1.0
}

Use "restart" when a restart alone recovers the service, "config" when settings must be
restored (name each setting and its correct value in fix_steps), and "code" only when the
service itself must change."#;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiDiagnosis {
    client: reqwest::Client,
    config: DiagnosisConfig,
    known_good: BTreeMap<String, String>,
}

impl OpenAiDiagnosis {
    pub fn new(config: DiagnosisConfig, known_good: BTreeMap<String, String>) -> VigilResult<Self> {
        if config.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(VigilError::ConfigError(
                "diagnosis API key is not set".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            known_good,
        })
    }

    /// User message describing the incident
    pub fn build_prompt(&self, request: &DiagnosisRequest) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Incident {}", request.incident_id);
        let _ = writeln!(out, "- Class: {}", request.class);
        let _ = writeln!(
            out,
            "- Detected at: {}",
            request.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let _ = writeln!(out, "\n## Symptoms");
        if request.symptoms.is_empty() {
            let _ = writeln!(out, "None recorded");
        }
        for (i, symptom) in request.symptoms.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, symptom);
        }

        let _ = writeln!(out, "\n## Recent logs");
        if request.logs.is_empty() {
            let _ = writeln!(out, "None available");
        } else {
            let _ = writeln!(out, "```");
            for line in &request.logs {
                let _ = writeln!(out, "{}", line);
            }
            let _ = writeln!(out, "```");
        }

        write_config_block(&mut out, "Current configuration", &request.configuration);
        write_config_block(&mut out, "Known-good configuration", &self.known_good);

        let _ = write!(out, "\nRespond with the JSON object only.");
        out
    }
}

fn write_config_block(out: &mut String, title: &str, config: &BTreeMap<String, String>) {
    let _ = writeln!(out, "\n## {}", title);
    let _ = writeln!(out, "```json");
    let _ = writeln!(
        out,
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "{}".to_string())
    );
    let _ = writeln!(out, "```");
}

/// Strip a surrounding markdown code fence, if any
pub fn strip_code_fence(content: &str) -> &str {
    let content = content.trim();
    let content = content
        .strip_prefix("```json")
        .or_else(|| content.strip_prefix("```"))
        .unwrap_or(content);
    content.strip_suffix("```").unwrap_or(content).trim()
}

/// Decode the model's reply into a raw response
pub fn parse_reply(content: &str) -> VigilResult<DiagnosisResponse> {
    serde_json::from_str(strip_code_fence(content)).map_err(|e| {
        debug!("Undecodable diagnosis reply: {}", content);
        VigilError::InvalidDiagnosis {
            reason: format!("reply is not valid JSON: {}", e),
        }
    })
}

#[async_trait]
impl DiagnosisSource for OpenAiDiagnosis {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn diagnose(&self, request: &DiagnosisRequest) -> VigilResult<DiagnosisResponse> {
        info!(incident_id = %request.incident_id, model = %self.config.model, "Requesting diagnosis");

        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": self.build_prompt(request) },
            ],
        });

        let completion = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatCompletion>()
            .await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| VigilError::DiagnosisError("no choices in completion".to_string()))?;

        parse_reply(&content)
    }
}
