//! Rewriting content through a chat-completion API.

pub mod markup;
mod prompt;

pub use prompt::{build_prompt, RewriteOptions, Style, Tone, SYSTEM_PROMPT};

use crate::util::is_secure_or_loopback;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Upstream error bodies are cut to this many characters in messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("Insecure API base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("Request timed out")]
    Timeout,
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// Non-success status; `message` is the upstream `error.message` when present.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("API returned no rewritten text")]
    EmptyResponse,
    #[error("Unexpected API response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RewriteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RewriteError::Timeout
        } else if err.is_decode() {
            RewriteError::Decode(err.to_string())
        } else {
            RewriteError::Network(err)
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for the chat-completion endpoint.
#[derive(Clone)]
pub struct Rewriter {
    client: reqwest::Client,
    api_base: String,
    model: String,
    temperature: f64,
}

impl Rewriter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Point at a different API base, e.g. a proxy or a local mock server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, temperature: f64) -> Self {
        self.model = model.into();
        self.temperature = temperature;
        self
    }

    /// Rewrite `text` and return the model's reply verbatim.
    ///
    /// # Errors
    ///
    /// Refuses to send the key to a non-HTTPS, non-loopback base. Otherwise
    /// fails on transport errors, non-success statuses (carrying the upstream
    /// message), an empty `choices` array, or an undecodable body.
    pub async fn rewrite(
        &self,
        text: &str,
        api_key: &SecretString,
        options: &RewriteOptions,
    ) -> Result<String, RewriteError> {
        if !is_secure_or_loopback(&self.api_base) {
            tracing::error!(api_base = %self.api_base, "Rejecting non-HTTPS API base URL");
            return Err(RewriteError::InsecureBaseUrl);
        }

        let prompt = build_prompt(text, options);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(model = %self.model, tone = %options.tone, style = %options.style, seo = options.seo, "Requesting rewrite");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(RewriteError::Api {
                status: status.as_u16(),
                message: upstream_message(&raw),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(RewriteError::EmptyResponse)
    }
}

fn upstream_message(raw: &str) -> String {
    if let Ok(body) = serde_json::from_str::<ApiErrorBody>(raw) {
        return body.error.message;
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}
