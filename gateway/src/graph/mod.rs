//! A small state-graph runtime.
//!
//! Nodes take the whole state and hand back the next state plus where to go.
//! Every step is checkpointed per thread, which is what lets a node suspend
//! with [`NodeContext::interrupt`] and pick up again on a
//! [`GraphInput::Resume`] stream.

pub mod checkpoint;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use checkpoint::{Checkpoint, Checkpointer, MemorySaver};
pub use stream::{GraphInput, Interrupt, NodeUpdate, StreamUpdate};

pub const START: &str = "__start__";
pub const END: &str = "__end__";
pub const INTERRUPT: &str = "__interrupt__";

const DEFAULT_RECURSION_LIMIT: usize = 25;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph has no entry edge from {START}")]
    MissingEntry,

    #[error("unknown node `{0}`")]
    NodeNotFound(String),

    #[error("node `{0}` has no outgoing edge")]
    NoEdge(String),

    #[error("thread `{0}` has nothing to resume")]
    NothingToResume(String),

    #[error("recursion limit of {0} steps reached without hitting END")]
    RecursionLimit(usize),

    #[error("node `{node}` failed: {error}")]
    Node { node: String, error: anyhow::Error },

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NodeError {
    /// Raised by [`NodeContext::interrupt`]; the runtime turns it into a suspension.
    #[error("interrupted")]
    Interrupt(Value),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Anything that can flow through a graph and be checkpointed as JSON.
pub trait GraphState: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> GraphState for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Per-thread run settings. `configurable` is opaque to the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub thread_id: String,
    #[serde(default)]
    pub configurable: Value,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
}

fn default_recursion_limit() -> usize {
    DEFAULT_RECURSION_LIMIT
}

impl RunConfig {
    pub fn new(thread_id: impl Into<String>, configurable: Value) -> Self {
        Self {
            thread_id: thread_id.into(),
            configurable,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

pub struct NodeContext {
    node: String,
    config: RunConfig,
    resume: Option<Value>,
}

impl NodeContext {
    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Suspends the graph with `value`, or returns the resume value when
    /// this node is being re-run after a suspension.
    pub fn interrupt(&self, value: Value) -> Result<Value, NodeError> {
        match &self.resume {
            Some(resume) => Ok(resume.clone()),
            None => Err(NodeError::Interrupt(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Goto {
    /// Follow the node's static edge.
    Next,
    Node(String),
    End,
}

#[derive(Debug, Clone)]
pub struct Transition<S> {
    pub state: S,
    pub goto: Goto,
}

impl<S> Transition<S> {
    pub fn next(state: S) -> Self {
        Self {
            state,
            goto: Goto::Next,
        }
    }

    pub fn goto(state: S, node: impl Into<String>) -> Self {
        Self {
            state,
            goto: Goto::Node(node.into()),
        }
    }

    pub fn end(state: S) -> Self {
        Self {
            state,
            goto: Goto::End,
        }
    }
}

#[async_trait]
pub trait Node<S>: Send + Sync {
    async fn process(&self, state: S, ctx: &NodeContext) -> Result<Transition<S>, NodeError>;
}

pub struct StateGraph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, node: impl Node<S> + 'static) -> &mut Self {
        self.nodes.insert(name.into(), Arc::new(node));
        self
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.edges.insert(from.into(), to.into());
        self
    }

    pub fn compile(&self, checkpointer: Arc<dyn Checkpointer>) -> Result<CompiledGraph<S>, GraphError> {
        let entry = self.edges.get(START).cloned().ok_or(GraphError::MissingEntry)?;

        for (from, to) in &self.edges {
            if from != START && !self.nodes.contains_key(from) {
                return Err(GraphError::NodeNotFound(from.clone()));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(GraphError::NodeNotFound(to.clone()));
            }
        }

        Ok(CompiledGraph {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            entry,
            checkpointer,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StateSnapshot<S> {
    pub values: S,
    pub next: Option<String>,
    pub interrupt: Option<Interrupt>,
    pub step: usize,
}

impl<S: GraphState> StateSnapshot<S> {
    fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, GraphError> {
        Ok(Self {
            values: serde_json::from_value(checkpoint.values)?,
            next: checkpoint.next,
            interrupt: checkpoint.interrupt,
            step: checkpoint.step,
        })
    }
}

pub struct CompiledGraph<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, String>,
    entry: String,
    checkpointer: Arc<dyn Checkpointer>,
}

impl<S: GraphState> CompiledGraph<S> {
    /// Runs the graph and yields one update per executed node.
    ///
    /// The stream ends at END, or right after yielding an
    /// [`StreamUpdate::Interrupt`]; resume it with [`GraphInput::Resume`]
    /// on the same thread.
    pub fn astream(
        &self,
        input: GraphInput<S>,
        config: RunConfig,
    ) -> impl Stream<Item = Result<StreamUpdate, GraphError>> + Send + '_ {
        try_stream! {
            let thread_id = config.thread_id.clone();
            let (mut state, mut current, mut resume, mut step) = match input {
                GraphInput::State(state) => (state, self.entry.clone(), None, 0),
                GraphInput::Resume(value) => {
                    let checkpoint = self
                        .checkpointer
                        .get(&thread_id)
                        .await?
                        .ok_or_else(|| GraphError::NothingToResume(thread_id.clone()))?;
                    let next = checkpoint
                        .next
                        .ok_or_else(|| GraphError::NothingToResume(thread_id.clone()))?;
                    let state: S = serde_json::from_value(checkpoint.values)?;
                    (state, next, Some(value), checkpoint.step)
                }
            };

            let mut executed = 0;
            while current != END {
                executed += 1;
                if executed > config.recursion_limit {
                    Err::<(), _>(GraphError::RecursionLimit(config.recursion_limit))?;
                }

                let node = self
                    .nodes
                    .get(&current)
                    .cloned()
                    .ok_or_else(|| GraphError::NodeNotFound(current.clone()))?;
                let ctx = NodeContext {
                    node: current.clone(),
                    config: config.clone(),
                    resume: resume.take(),
                };

                let transition = match node.process(state.clone(), &ctx).await {
                    Ok(transition) => transition,
                    Err(NodeError::Interrupt(value)) => {
                        let interrupt = Interrupt {
                            node: current.clone(),
                            value,
                        };
                        self.checkpointer
                            .put(
                                &thread_id,
                                Checkpoint {
                                    values: serde_json::to_value(&state)?,
                                    next: Some(current.clone()),
                                    interrupt: Some(interrupt.clone()),
                                    step,
                                },
                            )
                            .await?;
                        yield StreamUpdate::Interrupt(interrupt);
                        break;
                    }
                    Err(NodeError::Failed(error)) => Err(GraphError::Node {
                        node: current.clone(),
                        error,
                    })?,
                };

                step += 1;
                state = transition.state;
                let next = match transition.goto {
                    Goto::Next => self
                        .edges
                        .get(&current)
                        .cloned()
                        .ok_or_else(|| GraphError::NoEdge(current.clone()))?,
                    Goto::Node(name) => name,
                    Goto::End => END.to_string(),
                };

                let values = serde_json::to_value(&state)?;
                self.checkpointer
                    .put(
                        &thread_id,
                        Checkpoint {
                            values: values.clone(),
                            next: (next != END).then(|| next.clone()),
                            interrupt: None,
                            step,
                        },
                    )
                    .await?;
                yield StreamUpdate::Node(NodeUpdate {
                    name: current.clone(),
                    values,
                });
                current = next;
            }
        }
    }

    pub async fn get_state(&self, config: &RunConfig) -> Result<Option<StateSnapshot<S>>, GraphError> {
        self.checkpointer
            .get(&config.thread_id)
            .await?
            .map(StateSnapshot::from_checkpoint)
            .transpose()
    }

    /// Snapshots of a thread, newest first.
    pub async fn get_state_history(&self, config: &RunConfig) -> Result<Vec<StateSnapshot<S>>, GraphError> {
        self.checkpointer
            .list(&config.thread_id)
            .await?
            .into_iter()
            .map(StateSnapshot::from_checkpoint)
            .collect()
    }
}
