//! Scripted stand-ins for the model and search providers.
//!
//! The fake model answers by looking at the request message, so every node
//! of the report graph gets a well-formed reply without network access.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use research_gateway::assistant::prompts::{
    GRADE_SECTION_REQUEST, PLAN_QUERIES_REQUEST, PLAN_SECTIONS_REQUEST, SECTION_QUERIES_REQUEST,
    WRITE_FINAL_SECTION_REQUEST, WRITE_SECTION_REQUEST,
};
use research_gateway::llm::{ChatModel, LlmError, Message, Provider};
use research_gateway::search::{SearchApi, SearchError, SearchResponse, SearchResult, WebSearch};
use research_gateway::toolbox::Toolbox;

#[derive(Default)]
pub struct Script {
    /// Every model call fails with this message.
    pub fail_with: Option<String>,
    /// The grader asks for one follow-up search instead of passing.
    pub grade_fail: bool,
    /// The planner answers the section request with prose.
    pub bad_plan: bool,
    /// The planner names both researched sections "Case study".
    pub duplicate_names: bool,
    pub requests: Mutex<Vec<String>>,
    pub searches: Mutex<Vec<String>>,
}

impl Script {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn count(&self, request: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == request).count()
    }
}

#[derive(Clone, Default)]
pub struct FakeToolbox {
    pub script: Arc<Script>,
}

impl FakeToolbox {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
        }
    }
}

impl Toolbox for FakeToolbox {
    fn chat_model(&self, _provider: Provider, _model: &str) -> Result<Arc<dyn ChatModel>, LlmError> {
        Ok(Arc::new(FakeModel {
            script: self.script.clone(),
        }))
    }

    fn web_search(&self, _api: SearchApi) -> Result<Arc<dyn WebSearch>, SearchError> {
        Ok(Arc::new(FakeSearch {
            script: self.script.clone(),
        }))
    }
}

/// Text between `open` and `close` in `text`, empty when absent.
fn between<'a>(text: &'a str, open: &str, close: &str) -> &'a str {
    text.find(open)
        .map(|start| &text[start + open.len()..])
        .and_then(|rest| rest.find(close).map(|end| rest[..end].trim()))
        .unwrap_or("")
}

pub struct FakeModel {
    script: Arc<Script>,
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn invoke(&self, messages: &[Message]) -> Result<String, LlmError> {
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        let request = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.script.requests.lock().unwrap().push(request.clone());

        if let Some(message) = &self.script.fail_with {
            return Err(LlmError::Api {
                status: 503,
                message: message.clone(),
            });
        }

        let topic = between(system, "<Report topic>", "</Report topic>");
        let section_name = between(system, "<Section name>", "</Section name>");

        let reply = match request.as_str() {
            PLAN_QUERIES_REQUEST => json!({
                "queries": [format!("{topic} overview"), format!("{topic} details")]
            })
            .to_string(),
            PLAN_SECTIONS_REQUEST if self.script.bad_plan => "I would rather not plan.".to_string(),
            PLAN_SECTIONS_REQUEST => {
                let (background, details) = if self.script.duplicate_names {
                    ("Case study".to_string(), "Case study")
                } else {
                    (format!("Background on {topic}"), "Details")
                };
                let mut sections = vec![
                    json!({ "name": "Introduction", "description": "Overview", "research": false, "content": "" }),
                    json!({ "name": background, "description": format!("History of {topic}"), "research": true, "content": "" }),
                    json!({ "name": details, "description": format!("How {topic} works"), "research": true, "content": "" }),
                ];
                let feedback = between(
                    system,
                    "Feedback from review on the report structure (if any):",
                    "</Feedback>",
                );
                if !feedback.is_empty() {
                    sections.push(json!({ "name": format!("Revised: {feedback}"), "description": feedback, "research": true }));
                }
                sections.push(json!({ "name": "Conclusion", "description": "Summary", "research": false, "content": "" }));
                format!("```json\n{}\n```", json!({ "sections": sections }))
            }
            SECTION_QUERIES_REQUEST => json!({
                "queries": [format!("search: {}", between(system, "<Section topic>", "</Section topic>"))]
            })
            .to_string(),
            WRITE_SECTION_REQUEST => format!(
                "<think>drafting</think>## {section_name}\nAbout {topic}.\n{}",
                between(system, "<Section topic>", "</Section topic>")
            ),
            GRADE_SECTION_REQUEST if self.script.grade_fail => json!({
                "grade": "fail",
                "follow_up_queries": ["follow up"]
            })
            .to_string(),
            GRADE_SECTION_REQUEST => json!({ "grade": "pass", "follow_up_queries": [] }).to_string(),
            WRITE_FINAL_SECTION_REQUEST => format!("# {section_name} of {topic}"),
            _ => format!("echo: {request}"),
        };
        Ok(reply)
    }
}

pub struct FakeSearch {
    script: Arc<Script>,
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        self.script.searches.lock().unwrap().push(query.to_string());
        Ok(SearchResponse {
            query: query.to_string(),
            results: vec![SearchResult {
                title: query.to_string(),
                url: format!("https://example.com/{}", query.replace(' ', "-")),
                content: format!("facts about {query}"),
                raw_content: Some(format!("long text about {query}")),
            }],
        })
    }
}
