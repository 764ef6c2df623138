use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::Ollama;
use url::Url;

use super::{ChatModel, LlmError, Message};

pub struct OllamaClient {
    ollama: Ollama,
    model: String,
}

impl OllamaClient {
    pub fn new(server: &Url, model: impl Into<String>) -> Result<Self, LlmError> {
        let host = server
            .host_str()
            .ok_or_else(|| LlmError::Ollama(format!("no host in {server}")))?;
        let port = server.port_or_known_default().unwrap_or(11434);

        Ok(Self {
            ollama: Ollama::new(format!("{}://{}", server.scheme(), host), port),
            model: model.into(),
        })
    }
}

/// Ollama's generate endpoint takes one prompt, so the messages are
/// concatenated in order.
fn prompt(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn invoke(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = GenerationRequest::new(self.model.clone(), prompt(messages));
        let response = self
            .ollama
            .generate(request)
            .await
            .map_err(|e| LlmError::Ollama(e.to_string()))?;
        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_join_into_one_prompt() {
        let joined = prompt(&[Message::system("rules"), Message::user("question")]);
        assert_eq!(joined, "rules\n\nquestion");
    }

    #[test]
    fn rejects_hostless_url() {
        let url = Url::parse("unix:/var/run/ollama.sock").unwrap();
        assert!(OllamaClient::new(&url, "llama3").is_err());
    }
}
