use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::{api_error, ChatModel, LlmError, Message};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1/";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

/// Client for any OpenAI-style `chat/completions` endpoint (Groq, OpenAI).
pub struct OpenAiCompatClient {
    api_key: String,
    model: String,
    base_url: Url,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(client: Client, base_url: &str, api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model: model.into(),
            base_url: Url::parse(base_url)?,
            client,
        })
    }

    pub fn groq(client: Client, api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(client, GROQ_BASE_URL, api_key, model)
    }

    pub fn openai(client: Client, api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(client, OPENAI_BASE_URL, api_key, model)
    }
}

fn extract_content(data: &Value) -> Result<String, LlmError> {
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            let reason = data["choices"][0]["finish_reason"]
                .as_str()
                .unwrap_or("no choices returned");
            LlmError::EmptyResponse(reason.to_string())
        })
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn invoke(&self, messages: &[Message]) -> Result<String, LlmError> {
        let url = self.base_url.join("chat/completions")?;

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0.7
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(api_error(status.as_u16(), &body));
        }

        let data = response.json::<Value>().await?;
        extract_content(&data)
    }
}
