//! Intent classification through the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::IntentBackend;
use crate::brain::intent::{clamp_confidence, BackendKind, Intent};
use crate::config::CloudSettings;
use crate::error::BackendError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 100;

/// Confidence assumed when the reply names an intent but no score.
pub const DEFAULT_REPLY_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub struct CloudBackend {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
    model: String,
}

impl CloudBackend {
    /// Fails with `Unavailable` when no API key is configured.
    pub fn new(settings: &CloudSettings) -> Result<Self, BackendError> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| BackendError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| BackendError::Unavailable("API key is not a valid header value".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", settings.base_url.as_str().trim_end_matches('/')),
            headers,
            model: settings.model.clone(),
        })
    }

    async fn complete(&self, prompt: String) -> Result<String, BackendError> {
        let payload = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }]
        });

        let res = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable(format!(
                "Messages request failed with status {}: {}",
                status, body
            )));
        }

        let response: MessagesResponse = res.json().await?;
        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| BackendError::Parse("reply has no text block".to_string()))
    }
}

#[async_trait]
impl IntentBackend for CloudBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    async fn classify(&self, text: &str, labels: &[Intent]) -> Result<(Intent, f32), BackendError> {
        let reply = self.complete(build_prompt(text, labels)).await?;
        debug!("Cloud reply: {}", reply);
        parse_reply(&reply, labels)
    }
}

/// Classification prompt listing the allowed labels.
pub fn build_prompt(text: &str, labels: &[Intent]) -> String {
    let intent_list = labels.iter().map(Intent::label).collect::<Vec<_>>().join(", ");
    format!(
        "Analyze the user's intent from the following message and classify it into one of these categories: {intent_list}\n\
         \n\
         User message: \"{text}\"\n\
         \n\
         Respond with ONLY a JSON object in this format:\n\
         {{\"intent\": \"<intent>\", \"confidence\": <0.0-1.0>}}\n\
         \n\
         Where confidence is how certain you are (1.0 = very certain, 0.0 = not certain).\n\
         Available intents: {intent_list}"
    )
}

/// Extracts `{"intent", "confidence"}` from a model reply.
///
/// The JSON object may be wrapped in prose or a code fence. The intent must be
/// one of `labels`.
pub fn parse_reply(reply: &str, labels: &[Intent]) -> Result<(Intent, f32), BackendError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let object = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(BackendError::Parse(format!("no JSON object in reply: {}", reply.trim()))),
    };

    let value: serde_json::Value = serde_json::from_str(object)
        .map_err(|e| BackendError::Parse(format!("invalid JSON in reply: {}", e)))?;

    let label = value["intent"]
        .as_str()
        .ok_or_else(|| BackendError::Parse("reply has no intent field".to_string()))?;
    let intent: Intent = label.parse().map_err(BackendError::Parse)?;
    if !labels.contains(&intent) {
        return Err(BackendError::Parse(format!("intent '{}' is not an allowed label", intent)));
    }

    let confidence = match &value["confidence"] {
        serde_json::Value::Number(n) => n.as_f64().map(|f| f as f32),
        serde_json::Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
    .unwrap_or(DEFAULT_REPLY_CONFIDENCE);

    Ok((intent, clamp_confidence(confidence)))
}
