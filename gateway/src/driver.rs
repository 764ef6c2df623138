use std::sync::Arc;

use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assistant::configuration::ResearchConfig;
use crate::assistant::state::ReportState;
use crate::graph::{CompiledGraph, GraphError, GraphInput, MemorySaver, RunConfig, StateGraph};

/// What to answer when the graph asks for a review of its report plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanFeedback {
    Approve,
    Revise(String),
}

impl PlanFeedback {
    pub fn from_param(feedback: Option<String>) -> Self {
        match feedback {
            Some(text) if !text.trim().is_empty() => PlanFeedback::Revise(text),
            _ => PlanFeedback::Approve,
        }
    }

    fn resume_value(&self) -> Value {
        match self {
            PlanFeedback::Approve => Value::Bool(true),
            PlanFeedback::Revise(text) => Value::String(text.clone()),
        }
    }
}

/// Runs one report per call on its own thread and checkpointer.
pub struct ResearchDriver {
    builder: StateGraph<ReportState>,
    max_resumes: usize,
}

impl ResearchDriver {
    pub fn new(builder: StateGraph<ReportState>, max_resumes: usize) -> Self {
        Self {
            builder,
            max_resumes,
        }
    }

    /// Streams the graph to its first interrupt, answers it with `feedback`,
    /// approves any later interrupt, and returns the finished report.
    /// `None` when the graph never produced one.
    pub async fn run(
        &self,
        topic: &str,
        research: &ResearchConfig,
        feedback: PlanFeedback,
    ) -> Result<Option<String>, GraphError> {
        let graph = self.builder.compile(Arc::new(MemorySaver::new()))?;
        let thread = RunConfig::new(Uuid::new_v4().to_string(), research.to_configurable());
        info!(thread_id = %thread.thread_id, topic, "starting research thread");

        let mut interrupted = drive(
            &graph,
            GraphInput::State(ReportState::with_topic(topic)),
            &thread,
        )
        .await?;

        let mut resume = feedback.resume_value();
        let mut resumes = 0;
        while interrupted && resumes < self.max_resumes {
            resumes += 1;
            interrupted = drive(&graph, GraphInput::Resume(resume), &thread).await?;
            resume = PlanFeedback::Approve.resume_value();
        }

        if interrupted {
            warn!(
                thread_id = %thread.thread_id,
                resumes,
                "research thread still suspended, returning without a report"
            );
        }

        let snapshot = graph.get_state(&thread).await?;
        Ok(snapshot.and_then(|snapshot| snapshot.values.final_report))
    }
}

/// Drains one stream; true if it stopped on an interrupt.
async fn drive(
    graph: &CompiledGraph<ReportState>,
    input: GraphInput<ReportState>,
    thread: &RunConfig,
) -> Result<bool, GraphError> {
    let stream = graph.astream(input, thread.clone());
    tokio::pin!(stream);

    let mut interrupted = false;
    while let Some(update) = stream.next().await {
        let update = update?;
        info!(thread_id = %thread.thread_id, "{}", update.name());
        if let Some(interrupt) = update.as_interrupt() {
            info!(thread_id = %thread.thread_id, node = %interrupt.node, "graph interrupted");
            interrupted = true;
        }
    }
    Ok(interrupted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_feedback_means_approval() {
        assert_eq!(PlanFeedback::from_param(None), PlanFeedback::Approve);
        assert_eq!(PlanFeedback::from_param(Some("  ".into())), PlanFeedback::Approve);
        assert_eq!(
            PlanFeedback::from_param(Some("add a section on costs".into())),
            PlanFeedback::Revise("add a section on costs".into())
        );
        assert_eq!(PlanFeedback::Approve.resume_value(), Value::Bool(true));
    }
}
