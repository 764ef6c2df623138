use std::sync::Arc;

use reqwest::Client;
use url::Url;

use crate::configuration::Credentials;
use crate::llm::{ChatModel, GeminiClient, LlmError, OllamaClient, OpenAiCompatClient, Provider};
use crate::search::{PerplexitySearch, SearchApi, SearchError, TavilySearch, WebSearch};

/// Hands out model and search clients by name.
pub trait Toolbox: Send + Sync {
    fn chat_model(&self, provider: Provider, model: &str) -> Result<Arc<dyn ChatModel>, LlmError>;

    fn web_search(&self, api: SearchApi) -> Result<Arc<dyn WebSearch>, SearchError>;
}

/// Builds clients over one shared HTTP connection pool.
pub struct HttpToolbox {
    http: Client,
    credentials: Credentials,
    ollama_url: Url,
}

impl HttpToolbox {
    pub fn new(http: Client, credentials: Credentials, ollama_url: Url) -> Self {
        Self {
            http,
            credentials,
            ollama_url,
        }
    }
}

fn require(key: &Option<String>) -> Option<String> {
    key.clone().filter(|k| !k.is_empty())
}

impl Toolbox for HttpToolbox {
    fn chat_model(&self, provider: Provider, model: &str) -> Result<Arc<dyn ChatModel>, LlmError> {
        let creds = &self.credentials;
        let client: Arc<dyn ChatModel> = match provider {
            Provider::Google => {
                let key = require(&creds.google_api_key)
                    .ok_or(LlmError::MissingApiKey("GOOGLE_API_KEY"))?;
                Arc::new(GeminiClient::new(self.http.clone(), key, model)?)
            }
            Provider::Groq => {
                let key = require(&creds.groq_api_key)
                    .ok_or(LlmError::MissingApiKey("GROQ_API_KEY"))?;
                Arc::new(OpenAiCompatClient::groq(self.http.clone(), key, model)?)
            }
            Provider::OpenAi => {
                let key = require(&creds.openai_api_key)
                    .ok_or(LlmError::MissingApiKey("OPENAI_API_KEY"))?;
                Arc::new(OpenAiCompatClient::openai(self.http.clone(), key, model)?)
            }
            Provider::Ollama => Arc::new(OllamaClient::new(&self.ollama_url, model)?),
        };
        Ok(client)
    }

    fn web_search(&self, api: SearchApi) -> Result<Arc<dyn WebSearch>, SearchError> {
        let creds = &self.credentials;
        let search: Arc<dyn WebSearch> = match api {
            SearchApi::Perplexity => {
                let key = require(&creds.perplexity_api_key)
                    .ok_or(SearchError::MissingApiKey("PERPLEXITY_API_KEY"))?;
                Arc::new(PerplexitySearch::new(self.http.clone(), key))
            }
            SearchApi::Tavily => {
                let key = require(&creds.tavily_api_key)
                    .ok_or(SearchError::MissingApiKey("TAVILY_API_KEY"))?;
                Arc::new(TavilySearch::new(self.http.clone(), key))
            }
        };
        Ok(search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolbox(credentials: Credentials) -> HttpToolbox {
        HttpToolbox::new(
            Client::new(),
            credentials,
            Url::parse("http://localhost:11434").unwrap(),
        )
    }

    #[test]
    fn missing_keys_name_the_variable() {
        let toolbox = toolbox(Credentials::default());

        let err = toolbox.chat_model(Provider::Google, "gemini-1.5-pro").err().unwrap();
        assert_eq!(err.to_string(), "GOOGLE_API_KEY environment variable not found");

        let err = toolbox.web_search(SearchApi::Tavily).err().unwrap();
        assert_eq!(err.to_string(), "TAVILY_API_KEY environment variable not found");
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let toolbox = toolbox(Credentials {
            groq_api_key: Some(String::new()),
            ..Credentials::default()
        });
        assert!(toolbox.chat_model(Provider::Groq, "llama").is_err());
    }

    #[test]
    fn configured_providers_resolve() {
        let toolbox = toolbox(Credentials {
            google_api_key: Some("g".into()),
            perplexity_api_key: Some("p".into()),
            ..Credentials::default()
        });
        assert!(toolbox.chat_model(Provider::Google, "gemini-1.5-pro").is_ok());
        assert!(toolbox.chat_model(Provider::Ollama, "llama3").is_ok());
        assert!(toolbox.web_search(SearchApi::Perplexity).is_ok());
    }
}
