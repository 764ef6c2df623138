use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{info, warn};

use super::configuration::ResearchConfig;
use super::prompts::{
    format_final_section_writer_instructions, format_query_writer_instructions,
    format_report_planner_instructions, format_report_planner_query_writer_instructions,
    format_section_grader_instructions, format_section_writer_instructions, GRADE_SECTION_REQUEST,
    PLAN_QUERIES_REQUEST, PLAN_SECTIONS_REQUEST, SECTION_QUERIES_REQUEST,
    WRITE_FINAL_SECTION_REQUEST, WRITE_SECTION_REQUEST,
};
use super::state::{Grade, ReportState, SearchQueries, Section, SectionFeedback, Sections};
use super::utils::{format_sections, parse_json, strip_think_tags};
use crate::graph::{Node, NodeContext, NodeError, StateGraph, Transition, END, START};
use crate::llm::Message;
use crate::search::{deduplicate_and_format_sources, search_all};
use crate::toolbox::Toolbox;

pub const GENERATE_REPORT_PLAN: &str = "generate_report_plan";
pub const HUMAN_FEEDBACK: &str = "human_feedback";
pub const BUILD_RESEARCH_SECTIONS: &str = "build_research_sections";
pub const GATHER_COMPLETED_SECTIONS: &str = "gather_completed_sections";
pub const WRITE_FINAL_SECTIONS: &str = "write_final_sections";
pub const COMPILE_FINAL_REPORT: &str = "compile_final_report";

const PLANNING_TOKENS_PER_SOURCE: usize = 1000;
const SECTION_TOKENS_PER_SOURCE: usize = 5000;

/// Queries from a `{"queries": [...]}` reply, or just the fallback text.
fn queries_or(reply: &str, fallback: &str) -> Vec<String> {
    match parse_json::<SearchQueries>(reply) {
        Ok(parsed) if !parsed.queries.is_empty() => parsed.queries,
        Ok(_) => vec![fallback.to_string()],
        Err(e) => {
            warn!("falling back to `{}` as search query: {:#}", fallback, e);
            vec![fallback.to_string()]
        }
    }
}

pub struct GenerateReportPlanNode {
    toolbox: Arc<dyn Toolbox>,
}

impl GenerateReportPlanNode {
    async fn plan(&self, state: &ReportState, config: &ResearchConfig) -> anyhow::Result<Vec<Section>> {
        let planner = self
            .toolbox
            .chat_model(config.planner_provider, &config.planner_model)?;

        let instructions = format_report_planner_query_writer_instructions(
            &state.topic,
            &config.report_structure,
            config.number_of_queries,
        );
        let reply = planner
            .invoke(&[Message::system(instructions), Message::user(PLAN_QUERIES_REQUEST)])
            .await?;
        let queries = queries_or(&reply, &state.topic);

        let search = self.toolbox.web_search(config.search_api)?;
        let results = search_all(search.as_ref(), &queries).await?;
        let context = deduplicate_and_format_sources(&results, PLANNING_TOKENS_PER_SOURCE, false);

        let instructions = format_report_planner_instructions(
            &state.topic,
            &config.report_structure,
            &context,
            state.feedback_on_report_plan.as_deref(),
        );
        let reply = planner
            .invoke(&[Message::system(instructions), Message::user(PLAN_SECTIONS_REQUEST)])
            .await?;
        let plan: Sections = parse_json(&reply).context("planner did not return report sections")?;

        if plan.sections.is_empty() {
            bail!("planner returned an empty report plan");
        }
        Ok(plan.sections)
    }
}

#[async_trait]
impl Node<ReportState> for GenerateReportPlanNode {
    async fn process(&self, mut state: ReportState, ctx: &NodeContext) -> Result<Transition<ReportState>, NodeError> {
        let config = ResearchConfig::from_runnable_config(ctx.config())?;
        state.sections = self.plan(&state, &config).await?;
        info!(
            topic = %state.topic,
            sections = state.sections.len(),
            "generated report plan"
        );
        Ok(Transition::next(state))
    }
}

/// Pauses for review of the plan. Resuming with `true` (or an empty string)
/// approves it; any other text is fed back to the planner.
pub struct HumanFeedbackNode;

#[async_trait]
impl Node<ReportState> for HumanFeedbackNode {
    async fn process(&self, mut state: ReportState, ctx: &NodeContext) -> Result<Transition<ReportState>, NodeError> {
        let message = format!(
            "Please provide feedback on the following report plan.\n{}\n\nDoes the report plan meet your needs?\nPass 'true' to approve the report plan.\nOr, provide feedback to regenerate the report plan:",
            format_sections(&state.sections)
        );

        match ctx.interrupt(Value::String(message))? {
            Value::Bool(true) => Ok(Transition::next(state)),
            Value::String(text) if text.trim().is_empty() => Ok(Transition::next(state)),
            Value::String(text) => {
                info!(feedback = %text, "report plan sent back for revision");
                state.feedback_on_report_plan = Some(text);
                Ok(Transition::goto(state, GENERATE_REPORT_PLAN))
            }
            other => Err(anyhow!("Interrupt value {} is not supported", other).into()),
        }
    }
}

pub struct BuildResearchSectionsNode {
    toolbox: Arc<dyn Toolbox>,
}

impl BuildResearchSectionsNode {
    /// Search, write and grade one section until it passes or the search
    /// depth is used up.
    async fn build_section(&self, topic: &str, section: &Section, config: &ResearchConfig) -> anyhow::Result<Section> {
        let writer = self
            .toolbox
            .chat_model(config.writer_provider, &config.writer_model)?;
        let planner = self
            .toolbox
            .chat_model(config.planner_provider, &config.planner_model)?;
        let search = self.toolbox.web_search(config.search_api)?;

        let instructions =
            format_query_writer_instructions(topic, &section.description, config.number_of_queries);
        let reply = writer
            .invoke(&[Message::system(instructions), Message::user(SECTION_QUERIES_REQUEST)])
            .await?;
        let mut queries = queries_or(&reply, &section.description);

        let mut section = section.clone();
        let mut search_iterations = 0;
        loop {
            let results = search_all(search.as_ref(), &queries).await?;
            let source_str = deduplicate_and_format_sources(&results, SECTION_TOKENS_PER_SOURCE, true);
            search_iterations += 1;

            let instructions = format_section_writer_instructions(
                topic,
                &section.name,
                &section.description,
                &section.content,
                &source_str,
            );
            let reply = writer
                .invoke(&[Message::system(instructions), Message::user(WRITE_SECTION_REQUEST)])
                .await?;
            section.content = strip_think_tags(&reply);
            info!(section = %section.name, search_iterations, "wrote section draft");

            if search_iterations >= config.max_search_depth {
                break;
            }

            let instructions = format_section_grader_instructions(
                topic,
                &section.description,
                &section.content,
                config.number_of_queries,
            );
            let reply = planner
                .invoke(&[Message::system(instructions), Message::user(GRADE_SECTION_REQUEST)])
                .await?;
            let feedback: SectionFeedback = match parse_json(&reply) {
                Ok(feedback) => feedback,
                Err(e) => {
                    warn!(section = %section.name, "unreadable grade, keeping draft: {:#}", e);
                    break;
                }
            };

            if feedback.grade == Grade::Pass || feedback.follow_up_queries.is_empty() {
                break;
            }
            queries = feedback.follow_up_queries;
        }

        Ok(section)
    }
}

#[async_trait]
impl Node<ReportState> for BuildResearchSectionsNode {
    async fn process(&self, mut state: ReportState, ctx: &NodeContext) -> Result<Transition<ReportState>, NodeError> {
        let config = ResearchConfig::from_runnable_config(ctx.config())?;
        let positions = state.research_positions();
        let completed = try_join_all(
            positions
                .iter()
                .map(|&idx| self.build_section(&state.topic, &state.sections[idx], &config)),
        )
        .await?;

        for (&idx, section) in positions.iter().zip(&completed) {
            state.sections[idx] = section.clone();
        }
        state.completed_sections = completed;
        Ok(Transition::next(state))
    }
}

pub struct GatherCompletedSectionsNode;

#[async_trait]
impl Node<ReportState> for GatherCompletedSectionsNode {
    async fn process(&self, mut state: ReportState, _ctx: &NodeContext) -> Result<Transition<ReportState>, NodeError> {
        state.report_sections_from_research = format_sections(&state.completed_sections);
        Ok(Transition::next(state))
    }
}

/// Writes the sections that need no research (introduction, conclusion)
/// from the researched ones.
pub struct WriteFinalSectionsNode {
    toolbox: Arc<dyn Toolbox>,
}

impl WriteFinalSectionsNode {
    async fn write_section(&self, state: &ReportState, section: &Section, config: &ResearchConfig) -> anyhow::Result<Section> {
        let writer = self
            .toolbox
            .chat_model(config.writer_provider, &config.writer_model)?;
        let instructions = format_final_section_writer_instructions(
            &state.topic,
            &section.name,
            &section.description,
            &state.report_sections_from_research,
        );
        let reply = writer
            .invoke(&[Message::system(instructions), Message::user(WRITE_FINAL_SECTION_REQUEST)])
            .await?;

        Ok(Section {
            content: strip_think_tags(&reply),
            ..section.clone()
        })
    }
}

#[async_trait]
impl Node<ReportState> for WriteFinalSectionsNode {
    async fn process(&self, mut state: ReportState, ctx: &NodeContext) -> Result<Transition<ReportState>, NodeError> {
        let config = ResearchConfig::from_runnable_config(ctx.config())?;
        let positions = state.final_positions();
        let written = try_join_all(
            positions
                .iter()
                .map(|&idx| self.write_section(&state, &state.sections[idx], &config)),
        )
        .await?;

        for (&idx, section) in positions.iter().zip(&written) {
            state.sections[idx] = section.clone();
        }
        state.completed_sections.extend(written);
        Ok(Transition::next(state))
    }
}

pub struct CompileFinalReportNode;

#[async_trait]
impl Node<ReportState> for CompileFinalReportNode {
    async fn process(&self, mut state: ReportState, _ctx: &NodeContext) -> Result<Transition<ReportState>, NodeError> {
        state.final_report = Some(state.compile_report());
        Ok(Transition::end(state))
    }
}

/// Plan, review, research, write, compile.
pub fn report_graph(toolbox: Arc<dyn Toolbox>) -> StateGraph<ReportState> {
    let mut builder = StateGraph::new();
    builder
        .add_node(
            GENERATE_REPORT_PLAN,
            GenerateReportPlanNode {
                toolbox: toolbox.clone(),
            },
        )
        .add_node(HUMAN_FEEDBACK, HumanFeedbackNode)
        .add_node(
            BUILD_RESEARCH_SECTIONS,
            BuildResearchSectionsNode {
                toolbox: toolbox.clone(),
            },
        )
        .add_node(GATHER_COMPLETED_SECTIONS, GatherCompletedSectionsNode)
        .add_node(WRITE_FINAL_SECTIONS, WriteFinalSectionsNode { toolbox })
        .add_node(COMPILE_FINAL_REPORT, CompileFinalReportNode)
        .add_edge(START, GENERATE_REPORT_PLAN)
        .add_edge(GENERATE_REPORT_PLAN, HUMAN_FEEDBACK)
        .add_edge(HUMAN_FEEDBACK, BUILD_RESEARCH_SECTIONS)
        .add_edge(BUILD_RESEARCH_SECTIONS, GATHER_COMPLETED_SECTIONS)
        .add_edge(GATHER_COMPLETED_SECTIONS, WRITE_FINAL_SECTIONS)
        .add_edge(WRITE_FINAL_SECTIONS, COMPILE_FINAL_REPORT)
        .add_edge(COMPILE_FINAL_REPORT, END);
    builder
}
