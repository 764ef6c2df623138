use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod gemini;
mod ollama;
mod openai;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "groq")]
    Groq,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "ollama")]
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Groq => "groq",
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" | "google_genai" | "gemini" => Ok(Provider::Google),
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(format!("unsupported model provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0} environment variable not found")]
    MissingApiKey(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    #[error("Failed to get content from response: {0}")]
    EmptyResponse(String),

    #[error("Ollama request failed: {0}")]
    Ollama(String),
}

/// A hosted or local model that turns messages into one completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<String, LlmError>;
}

/// Builds an [`LlmError::Api`] from a non-2xx body, preferring the
/// provider's own `error.message`.
pub(crate) fn api_error(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|data| match &data["error"] {
            Value::String(message) => Some(message.clone()),
            error => error["message"].as_str().map(str::to_string),
        })
        .unwrap_or_else(|| body.trim().to_string());

    LlmError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse() {
        assert_eq!("google".parse::<Provider>(), Ok(Provider::Google));
        assert_eq!("Gemini".parse::<Provider>(), Ok(Provider::Google));
        assert_eq!("openai".parse::<Provider>(), Ok(Provider::OpenAi));
        assert!("anthropic".parse::<Provider>().is_err());
        assert_eq!(Provider::OpenAi.to_string(), "openai");
    }

    #[test]
    fn api_error_prefers_provider_message() {
        let err = api_error(
            403,
            r#"{"error": {"code": 403, "message": "API key not valid"}}"#,
        );
        assert_eq!(err.to_string(), "API key not valid (status 403)");

        let err = api_error(500, "upstream exploded\n");
        assert_eq!(err.to_string(), "upstream exploded (status 500)");
    }
}
