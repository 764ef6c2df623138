use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub description: String,
    /// Whether the section needs web research, or is written from the others.
    pub research: bool,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportState {
    pub topic: String,
    pub feedback_on_report_plan: Option<String>,
    pub sections: Vec<Section>,
    pub completed_sections: Vec<Section>,
    pub report_sections_from_research: String,
    pub final_report: Option<String>,
}

impl ReportState {
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    /// Plan positions of the sections that need web research.
    pub fn research_positions(&self) -> Vec<usize> {
        self.positions(true)
    }

    /// Plan positions of the sections written from the researched ones.
    pub fn final_positions(&self) -> Vec<usize> {
        self.positions(false)
    }

    fn positions(&self, research: bool) -> Vec<usize> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.research == research)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Section contents in plan order, skipping unwritten ones.
    pub fn compile_report(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.content.as_str())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQueries {
    #[serde(default)]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sections {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionFeedback {
    pub grade: Grade,
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}
