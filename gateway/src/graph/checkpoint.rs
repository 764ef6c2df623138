use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::stream::Interrupt;
use super::GraphError;

/// Graph state persisted after a node runs or suspends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub values: Value,
    /// Node to run next; `None` once the graph reached END.
    pub next: Option<String>,
    pub interrupt: Option<Interrupt>,
    pub step: usize,
}

#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), GraphError>;

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError>;

    /// All checkpoints of a thread, newest first.
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, GraphError>;
}

/// Process-local checkpointer. Everything is lost when it is dropped.
#[derive(Default)]
pub struct MemorySaver {
    threads: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> Result<(), GraphError> {
        let mut threads = self.threads.write().await;
        threads
            .entry(thread_id.to_string())
            .or_default()
            .push(checkpoint);
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|history| history.last().cloned()))
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, GraphError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .map(|history| history.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}
