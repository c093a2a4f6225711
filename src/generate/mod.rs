//! Client for third-party text-generation APIs.
//!
//! Callers pick a model tier rather than a model id; the tier maps to a
//! concrete model the backend understands. Credential format is checked
//! synchronously before any network call, and the three interesting API
//! failures (bad credential, unknown model, rate limit) map to distinct
//! user-facing messages.

use std::str::FromStr;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::GenerateError;

/// Known credential prefixes for the supported generation providers.
const API_KEY_PREFIXES: &[&str] = &[
    "sk-", // OpenAI-style secret keys
    "hf_", // Hugging Face access tokens
];

/// Validate that a string looks like a generation API credential.
///
/// Format check only — it does not verify the key is active. Used for
/// fast client-side validation before making network calls.
pub fn is_valid_api_key(key: &str) -> bool {
    !key.is_empty() && API_KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Fast,
    #[default]
    Balanced,
    Advanced,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Advanced => "advanced",
        }
    }

    /// Concrete model id sent to the provider.
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::Fast => "gpt-4o-mini",
            Self::Balanced => "gpt-4o",
            Self::Advanced => "gpt-4.1",
        }
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "advanced" => Ok(Self::Advanced),
            _ => Err(format!("Invalid model tier: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub tier: ModelTier,
    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            tier: ModelTier::default(),
            history: Vec::new(),
            max_tokens: 512,
            temperature: 0.7,
        }
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Generated text plus the model that produced it, echoed by the API.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone)]
pub struct GenerateClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GenerateClient {
    /// Fails synchronously on a malformed credential — no network call
    /// is made with a key that cannot possibly work.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, GenerateError> {
        if !is_valid_api_key(api_key) {
            return Err(GenerateError::InvalidCredential(format!(
                "key must start with one of: {}",
                API_KEY_PREFIXES.join(", ")
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<Generation, GenerateError> {
        let model = request.tier.model_id();
        let mut messages = request.history.clone();
        messages.push(ChatMessage::user(&request.prompt));

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": model,
                "messages": messages,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(model = %model, status = status.as_u16(), "Generation request rejected");
            return Err(match status.as_u16() {
                401 | 403 => GenerateError::InvalidCredential(
                    "the API rejected the key; it may be expired or revoked".to_string(),
                ),
                404 => GenerateError::UnknownModel {
                    model: model.to_string(),
                },
                429 => GenerateError::RateLimited,
                _ => GenerateError::Api(format!("status {}: {}", status.as_u16(), body)),
            });
        }

        let completion: CompletionResponse = resp.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerateError::Api("response carried no choices".to_string()))?;
        Ok(Generation {
            text,
            model: completion.model,
        })
    }

    /// Issue `n` simultaneous generations and await them all. The result
    /// vector's order matches issuance order, not completion order, and
    /// each slot carries its own outcome.
    pub async fn generate_variations(
        &self,
        request: &GenerateRequest,
        n: usize,
    ) -> Vec<Result<Generation, GenerateError>> {
        let calls = (0..n).map(|_| self.generate(request));
        join_all(calls).await
    }
}
