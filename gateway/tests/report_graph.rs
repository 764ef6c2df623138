mod common;

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use common::{FakeToolbox, Script};
use research_gateway::assistant::graph::{GENERATE_REPORT_PLAN, HUMAN_FEEDBACK};
use research_gateway::assistant::prompts::{
    GRADE_SECTION_REQUEST, PLAN_SECTIONS_REQUEST, WRITE_SECTION_REQUEST,
};
use research_gateway::graph::{
    GraphError, GraphInput, MemorySaver, RunConfig, StreamUpdate, INTERRUPT,
};
use research_gateway::{report_graph, PlanFeedback, ResearchConfig, ResearchDriver, ReportState};

fn driver(toolbox: &FakeToolbox, max_resumes: usize) -> ResearchDriver {
    ResearchDriver::new(report_graph(Arc::new(toolbox.clone())), max_resumes)
}

#[tokio::test]
async fn approved_plan_produces_report_in_plan_order() {
    let toolbox = FakeToolbox::default();
    let report = driver(&toolbox, 3)
        .run("Rust async", &ResearchConfig::default(), PlanFeedback::Approve)
        .await
        .unwrap()
        .expect("report");

    let positions: Vec<usize> = [
        "# Introduction of Rust async",
        "## Background on Rust async\nAbout Rust async.",
        "## Details\nAbout Rust async.",
        "# Conclusion of Rust async",
    ]
    .iter()
    .map(|part| report.find(part).unwrap_or_else(|| panic!("missing {part:?} in {report}")))
    .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(!report.contains("<think>"));

    // two planning queries plus one per researched section
    assert_eq!(toolbox.script.searches().len(), 4);
    assert_eq!(toolbox.script.count(WRITE_SECTION_REQUEST), 2);
    assert_eq!(toolbox.script.count(GRADE_SECTION_REQUEST), 2);
}

#[tokio::test]
async fn written_feedback_replans_before_research() {
    let toolbox = FakeToolbox::default();
    let report = driver(&toolbox, 3)
        .run(
            "Rust async",
            &ResearchConfig::default(),
            PlanFeedback::Revise("cover costs".into()),
        )
        .await
        .unwrap()
        .expect("report");

    assert!(report.contains("## Revised: cover costs"));
    assert_eq!(toolbox.script.count(PLAN_SECTIONS_REQUEST), 2);
    assert_eq!(toolbox.script.count(WRITE_SECTION_REQUEST), 3);
}

#[tokio::test]
async fn failing_grade_searches_again_up_to_depth() {
    let toolbox = FakeToolbox::new(Script {
        grade_fail: true,
        ..Script::default()
    });
    let config = ResearchConfig {
        max_search_depth: 2,
        ..ResearchConfig::default()
    };

    driver(&toolbox, 3)
        .run("Rust async", &config, PlanFeedback::Approve)
        .await
        .unwrap()
        .expect("report");

    let searches = toolbox.script.searches();
    assert_eq!(searches.len(), 6);
    assert_eq!(searches.iter().filter(|q| q.as_str() == "follow up").count(), 2);
    assert_eq!(toolbox.script.count(WRITE_SECTION_REQUEST), 4);
    assert_eq!(toolbox.script.count(GRADE_SECTION_REQUEST), 2);
}

#[tokio::test]
async fn depth_of_one_skips_grading() {
    let toolbox = FakeToolbox::new(Script {
        grade_fail: true,
        ..Script::default()
    });
    let config = ResearchConfig {
        max_search_depth: 1,
        ..ResearchConfig::default()
    };

    driver(&toolbox, 3)
        .run("Rust async", &config, PlanFeedback::Approve)
        .await
        .unwrap();

    assert_eq!(toolbox.script.count(GRADE_SECTION_REQUEST), 0);
    assert_eq!(toolbox.script.count(WRITE_SECTION_REQUEST), 2);
}

#[tokio::test]
async fn same_named_sections_both_reach_the_report() {
    let toolbox = FakeToolbox::new(Script {
        duplicate_names: true,
        ..Script::default()
    });
    let report = driver(&toolbox, 3)
        .run("Rust async", &ResearchConfig::default(), PlanFeedback::Approve)
        .await
        .unwrap()
        .expect("report");

    let first = "## Case study\nAbout Rust async.\nHistory of Rust async";
    let second = "## Case study\nAbout Rust async.\nHow Rust async works";
    assert_eq!(report.matches(first).count(), 1, "{report}");
    assert_eq!(report.matches(second).count(), 1, "{report}");
    assert!(report.find(first).unwrap() < report.find(second).unwrap());
    assert!(report.ends_with("# Conclusion of Rust async"));
}

#[tokio::test]
async fn no_resume_budget_leaves_report_empty() {
    let toolbox = FakeToolbox::default();
    let report = driver(&toolbox, 0)
        .run("Rust async", &ResearchConfig::default(), PlanFeedback::Approve)
        .await
        .unwrap();

    assert!(report.is_none());
    assert_eq!(toolbox.script.count(WRITE_SECTION_REQUEST), 0);
}

#[tokio::test]
async fn unusable_plan_fails_in_planner_node() {
    let toolbox = FakeToolbox::new(Script {
        bad_plan: true,
        ..Script::default()
    });
    let err = driver(&toolbox, 3)
        .run("Rust async", &ResearchConfig::default(), PlanFeedback::Approve)
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::Node { ref node, .. } if node == GENERATE_REPORT_PLAN));
}

#[tokio::test]
async fn plan_review_suspends_and_rejects_odd_answers() {
    let toolbox = FakeToolbox::default();
    let graph = report_graph(Arc::new(toolbox))
        .compile(Arc::new(MemorySaver::new()))
        .unwrap();
    let thread = RunConfig::new("review-thread", ResearchConfig::default().to_configurable());

    let updates: Vec<StreamUpdate> = graph
        .astream(GraphInput::State(ReportState::with_topic("Rust async")), thread.clone())
        .map(|update| update.unwrap())
        .collect()
        .await;
    let names: Vec<&str> = updates.iter().map(StreamUpdate::name).collect();
    assert_eq!(names, vec![GENERATE_REPORT_PLAN, INTERRUPT]);

    let interrupt = updates[1].as_interrupt().unwrap();
    assert_eq!(interrupt.node, HUMAN_FEEDBACK);
    assert!(interrupt
        .value
        .as_str()
        .unwrap()
        .contains("Section 2: Background on Rust async"));

    let paused = graph.get_state(&thread).await.unwrap().unwrap();
    assert_eq!(paused.next.as_deref(), Some(HUMAN_FEEDBACK));
    assert_eq!(paused.values.sections.len(), 4);

    let results: Vec<_> = graph
        .astream(GraphInput::Resume(json!(42)), thread.clone())
        .collect()
        .await;
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert!(matches!(err, GraphError::Node { ref node, .. } if node == HUMAN_FEEDBACK));
}
