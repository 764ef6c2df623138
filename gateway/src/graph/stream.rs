use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::INTERRUPT;

/// A suspension raised by a node waiting for outside input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    pub node: String,
    pub value: Value,
}

/// State written by a node, as emitted in "updates" mode.
#[derive(Debug, Clone, Serialize)]
pub struct NodeUpdate {
    pub name: String,
    pub values: Value,
}

#[derive(Debug, Clone, Serialize, EnumAsInner)]
pub enum StreamUpdate {
    Node(NodeUpdate),
    Interrupt(Interrupt),
}

impl StreamUpdate {
    /// Leading event name: the node that ran, or `__interrupt__`.
    pub fn name(&self) -> &str {
        match self {
            StreamUpdate::Node(update) => &update.name,
            StreamUpdate::Interrupt(_) => INTERRUPT,
        }
    }
}

/// What a stream starts from: fresh state or a resume of the pending node.
#[derive(Debug, Clone)]
pub enum GraphInput<S> {
    State(S),
    Resume(Value),
}
