use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AnalyzeError;
use crate::extract::truncate_text;

// ── Constants ────────────────────────────────────────────────────────────────

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const MAX_TOKENS: u32 = 4096;
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_BODY_CAP: usize = 500;

// ── Client ───────────────────────────────────────────────────────────────────

/// Thin chat-completion client against an OpenRouter-compatible API. One
/// prompt in, one text completion out; no tools, no streaming.
#[derive(Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ModelClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, AnalyzeError> {
        let http = reqwest::ClientBuilder::new()
            .timeout(COMPLETION_TIMEOUT)
            .build()
            .map_err(|e| AnalyzeError::Config(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        })
    }

    /// Build a client from the environment. A missing API key is a hard
    /// configuration error; model and base URL have sensible defaults.
    pub fn from_env() -> Result<Self, AnalyzeError> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            AnalyzeError::Config("OPENROUTER_API_KEY environment variable not set".to_string())
        })?;
        let model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(api_key, model, base_url)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the raw completion text. Any non-success
    /// upstream response surfaces as a `ModelService` error carrying the
    /// upstream body (truncated).
    pub async fn complete(&self, prompt: &str) -> Result<String, AnalyzeError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalyzeError::ModelService(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzeError::ModelService(format!(
                "{}: {}",
                status,
                truncate_text(&body, ERROR_BODY_CAP)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeError::ModelService(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AnalyzeError::ModelService("empty completion".to_string()))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Tests ────────────────────────────────────────────────────────────────────
