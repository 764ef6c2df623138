use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::{api_error, ChatModel, LlmError, Message, Role};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: Url,
    client: Client,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: String, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model: model.into(),
            base_url: Url::parse(GEMINI_BASE_URL)?,
            client,
        })
    }
}

fn request_body(messages: &[Message]) -> Value {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = if m.role == Role::Assistant { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

fn extract_text(data: &Value) -> Result<String, LlmError> {
    let parts = data["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        let reason = data["promptFeedback"]["blockReason"]
            .as_str()
            .or_else(|| data["candidates"][0]["finishReason"].as_str())
            .unwrap_or("no candidates returned");
        return Err(LlmError::EmptyResponse(reason.to_string()));
    }
    Ok(parts)
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn invoke(&self, messages: &[Message]) -> Result<String, LlmError> {
        let url = self
            .base_url
            .join(&format!("models/{}:generateContent", self.model))?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(api_error(status.as_u16(), &body));
        }

        let data = response.json::<Value>().await?;
        extract_text(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_instruction() {
        let body = request_body(&[
            Message::system("be brief"),
            Message::user("what is rust?"),
        ]);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "what is rust?");
    }

    #[test]
    fn plain_prompt_has_no_instruction() {
        let body = request_body(&[Message::user("hi")]);
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn joins_candidate_parts() {
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] }
            }]
        });
        assert_eq!(extract_text(&data).unwrap(), "Hello, world");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let data = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = extract_text(&data).unwrap_err();
        assert_eq!(err.to_string(), "Failed to get content from response: SAFETY");
    }
}
