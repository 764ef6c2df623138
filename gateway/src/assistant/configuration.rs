use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::graph::RunConfig;
use crate::llm::Provider;
use crate::search::SearchApi;

pub const DEFAULT_REPORT_STRUCTURE: &str = "Use this structure to create a report on the user-provided topic:

1. Introduction (no research needed)
   - Brief overview of the topic area

2. Main Body Sections:
   - Each section should focus on a sub-topic of the user-provided topic

3. Conclusion
   - Aim for 1 structural element (either a list or table) that distills the main body sections
   - Provide a concise summary of the report";

/// Per-thread settings of the report graph, carried in
/// [`RunConfig::configurable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub search_api: SearchApi,
    pub planner_provider: Provider,
    pub planner_model: String,
    pub writer_provider: Provider,
    pub writer_model: String,
    /// Search/write iterations per section before the draft is accepted.
    pub max_search_depth: u32,
    pub number_of_queries: u32,
    pub report_structure: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            search_api: SearchApi::Perplexity,
            planner_provider: Provider::Google,
            planner_model: "gemini-1.5-pro".to_string(),
            writer_provider: Provider::Google,
            writer_model: "gemini-1.5-flash".to_string(),
            max_search_depth: 2,
            number_of_queries: 2,
            report_structure: DEFAULT_REPORT_STRUCTURE.to_string(),
        }
    }
}

impl ResearchConfig {
    pub fn from_runnable_config(config: &RunConfig) -> Result<Self> {
        if config.configurable.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.configurable.clone())
            .context("invalid research configuration")
    }

    pub fn to_configurable(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_take_defaults() {
        let config = RunConfig::new(
            "t",
            json!({ "search_api": "tavily", "max_search_depth": 1 }),
        );
        let research = ResearchConfig::from_runnable_config(&config).unwrap();
        assert_eq!(research.search_api, SearchApi::Tavily);
        assert_eq!(research.max_search_depth, 1);
        assert_eq!(research.planner_model, "gemini-1.5-pro");
    }

    #[test]
    fn round_trips_through_configurable() {
        let research = ResearchConfig {
            writer_provider: Provider::Groq,
            ..ResearchConfig::default()
        };
        let config = RunConfig::new("t", research.to_configurable());
        assert_eq!(ResearchConfig::from_runnable_config(&config).unwrap(), research);
    }

    #[test]
    fn rejects_unknown_provider() {
        let config = RunConfig::new("t", json!({ "planner_provider": "carrier-pigeon" }));
        assert!(ResearchConfig::from_runnable_config(&config).is_err());
    }
}
