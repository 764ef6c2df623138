use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::assistant::configuration::ResearchConfig;
use crate::llm::Provider;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL for {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },
    #[error("Invalid number for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// API keys for the model and search providers. Each one is only checked
/// when a request actually needs that provider.
#[derive(Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| if key.is_some() { "***" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("google_api_key", &mask(&self.google_api_key))
            .field("groq_api_key", &mask(&self.groq_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("perplexity_api_key", &mask(&self.perplexity_api_key))
            .field("tavily_api_key", &mask(&self.tavily_api_key))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_host: String,
    pub app_port: u16,

    /// Model behind `/query`.
    pub query_provider: Provider,
    pub query_model: String,

    /// Session configuration handed to every `/dr` thread.
    pub research: ResearchConfig,
    /// How many times `/dr` resumes a suspended plan before giving up.
    pub max_plan_resumes: usize,

    pub ollama_url: Url,
    pub credentials: Credentials,
}

const DEFAULT_APP_HOST: &str = "0.0.0.0";
const DEFAULT_APP_PORT: u16 = 8000;
const DEFAULT_QUERY_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_MAX_PLAN_RESUMES: usize = 3;
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const TRACKED_VARS: [&str; 19] = [
    "APP_HOST",
    "APP_PORT",
    "QUERY_PROVIDER",
    "QUERY_MODEL",
    "SEARCH_API",
    "PLANNER_PROVIDER",
    "PLANNER_MODEL",
    "WRITER_PROVIDER",
    "WRITER_MODEL",
    "MAX_SEARCH_DEPTH",
    "NUMBER_OF_QUERIES",
    "REPORT_STRUCTURE",
    "MAX_PLAN_RESUMES",
    "OLLAMA_URL",
    "GOOGLE_API_KEY",
    "GROQ_API_KEY",
    "OPENAI_API_KEY",
    "PERPLEXITY_API_KEY",
    "TAVILY_API_KEY",
];

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        for var in TRACKED_VARS {
            match env::var(var) {
                Ok(value) => info!(
                    "Found env var {}: {}",
                    var,
                    if var.contains("KEY") { "***" } else { value.as_str() }
                ),
                Err(_) => warn!("{} not set, using default", var),
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let research_defaults = ResearchConfig::default();

        let research = ResearchConfig {
            search_api: parse_or(&lookup, "SEARCH_API", research_defaults.search_api)?,
            planner_provider: parse_or(&lookup, "PLANNER_PROVIDER", research_defaults.planner_provider)?,
            planner_model: lookup("PLANNER_MODEL").unwrap_or(research_defaults.planner_model),
            writer_provider: parse_or(&lookup, "WRITER_PROVIDER", research_defaults.writer_provider)?,
            writer_model: lookup("WRITER_MODEL").unwrap_or(research_defaults.writer_model),
            max_search_depth: number_or(&lookup, "MAX_SEARCH_DEPTH", research_defaults.max_search_depth)?,
            number_of_queries: number_or(&lookup, "NUMBER_OF_QUERIES", research_defaults.number_of_queries)?,
            report_structure: lookup("REPORT_STRUCTURE").unwrap_or(research_defaults.report_structure),
        };

        let raw_ollama_url = lookup("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let ollama_url = Url::parse(&raw_ollama_url).map_err(|_| ConfigError::InvalidUrl {
            name: "OLLAMA_URL",
            value: raw_ollama_url.clone(),
        })?;

        Ok(Self {
            app_host: lookup("APP_HOST").unwrap_or_else(|| DEFAULT_APP_HOST.to_string()),
            app_port: number_or(&lookup, "APP_PORT", DEFAULT_APP_PORT)?,
            query_provider: parse_or(&lookup, "QUERY_PROVIDER", Provider::Google)?,
            query_model: lookup("QUERY_MODEL").unwrap_or_else(|| DEFAULT_QUERY_MODEL.to_string()),
            research,
            max_plan_resumes: number_or(&lookup, "MAX_PLAN_RESUMES", DEFAULT_MAX_PLAN_RESUMES)?,
            ollama_url,
            credentials: Credentials {
                google_api_key: lookup("GOOGLE_API_KEY"),
                groq_api_key: lookup("GROQ_API_KEY"),
                openai_api_key: lookup("OPENAI_API_KEY"),
                perplexity_api_key: lookup("PERPLEXITY_API_KEY"),
                tavily_api_key: lookup("TAVILY_API_KEY"),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }
}

/* --------------------------- helpers --------------------------- */

fn number_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(v) => v.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            name: key,
            value: v,
        }),
        None => Ok(default),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr<Err = String>,
{
    match lookup(key) {
        Some(v) => v
            .parse::<T>()
            .map_err(|reason| ConfigError::InvalidValue { name: key, reason }),
        None => Ok(default),
    }
}
