use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

const PERPLEXITY_URL: &str = "https://api.perplexity.ai/chat/completions";
const TAVILY_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchApi {
    #[default]
    #[serde(rename = "perplexity")]
    Perplexity,
    #[serde(rename = "tavily")]
    Tavily,
}

impl fmt::Display for SearchApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchApi::Perplexity => f.write_str("perplexity"),
            SearchApi::Tavily => f.write_str("tavily"),
        }
    }
}

impl FromStr for SearchApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "perplexity" => Ok(SearchApi::Perplexity),
            "tavily" => Ok(SearchApi::Tavily),
            other => Err(format!("unsupported search api: {other}")),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} environment variable not found")]
    MissingApiKey(&'static str),

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to get content from response: {0}")]
    EmptyResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub raw_content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub query: String,
    pub results: Vec<SearchResult>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}

/// Runs every query concurrently; the first failure wins.
pub async fn search_all(search: &dyn WebSearch, queries: &[String]) -> Result<Vec<SearchResponse>, SearchError> {
    try_join_all(queries.iter().map(|query| search.search(query))).await
}

/// Formats search results as model context, keeping the first result seen
/// for each URL.
pub fn deduplicate_and_format_sources(
    responses: &[SearchResponse],
    max_tokens_per_source: usize,
    include_raw_content: bool,
) -> String {
    let mut seen = HashSet::new();
    let unique_sources = responses
        .iter()
        .flat_map(|response| response.results.iter())
        .filter(|source| seen.insert(source.url.as_str()));

    let mut formatted_text = String::from("Sources:\n\n");
    for source in unique_sources {
        formatted_text.push_str(&format!("Source {}:\n===\n", source.title));
        formatted_text.push_str(&format!("URL: {}\n===\n", source.url));
        formatted_text.push_str(&format!(
            "Most relevant content from source: {}\n===\n",
            source.content
        ));

        if include_raw_content {
            if let Some(raw_content) = &source.raw_content {
                let char_limit = max_tokens_per_source * 4;
                let truncated_content = if raw_content.chars().count() > char_limit {
                    let head: String = raw_content.chars().take(char_limit).collect();
                    format!("{head}... [truncated]")
                } else {
                    raw_content.clone()
                };
                formatted_text.push_str(&format!(
                    "Full source content limited to {} tokens: {}\n\n",
                    max_tokens_per_source, truncated_content
                ));
            }
        }
    }

    formatted_text.trim().to_string()
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await?;
    Err(SearchError::Api {
        status: status.as_u16(),
        message: message.trim().to_string(),
    })
}

pub struct PerplexitySearch {
    client: Client,
    api_key: String,
}

impl PerplexitySearch {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

/// Perplexity answers with one synthesized text plus citation URLs. The
/// answer is attached to the first citation, the rest point back to it.
fn perplexity_results(query: &str, data: &Value) -> Result<SearchResponse, SearchError> {
    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| SearchError::EmptyResponse("perplexity returned no answer".to_string()))?;

    let citations: Vec<&str> = data["citations"]
        .as_array()
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut results = vec![SearchResult {
        title: format!("Perplexity Search: {query}, Source 1"),
        url: citations
            .first()
            .copied()
            .unwrap_or("https://perplexity.ai")
            .to_string(),
        content: content.to_string(),
        raw_content: Some(content.to_string()),
    }];

    for (i, url) in citations.iter().skip(1).enumerate() {
        results.push(SearchResult {
            title: format!("Perplexity Search: {query}, Source {}", i + 2),
            url: url.to_string(),
            content: "See above for full content".to_string(),
            raw_content: None,
        });
    }

    Ok(SearchResponse {
        query: query.to_string(),
        results,
    })
}

#[async_trait]
impl WebSearch for PerplexitySearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let response = self
            .client
            .post(PERPLEXITY_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": "sonar-pro",
                "messages": [
                    {
                        "role": "system",
                        "content": "Search the web and provide factual information with sources."
                    },
                    {
                        "role": "user",
                        "content": query
                    }
                ]
            }))
            .send()
            .await?;

        let data: Value = error_for_status(response).await?.json().await?;
        perplexity_results(query, &data)
    }
}

pub struct TavilySearch {
    client: Client,
    api_key: String,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            max_results: 5,
        }
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let response = self
            .client
            .post(TAVILY_URL)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
                "include_raw_content": true,
                "topic": "general"
            }))
            .send()
            .await?;

        let mut data: SearchResponse = error_for_status(response).await?.json().await?;
        data.query = query.to_string();
        Ok(data)
    }
}
