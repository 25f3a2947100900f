// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use landscape_model::{Node, VIRTUAL_KEY};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::StoreError;

/// Operator-maintained nodes merged into every graph as one more source.
#[async_trait]
pub trait NodeStore: Send + Sync + 'static {
    async fn get_all_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// Parses a raw node document, marks it virtual and stores it,
    /// replacing any node with the same id.
    async fn save_node(&self, raw: &str) -> Result<Node, StoreError>;

    async fn delete_node(&self, id: &str) -> Result<(), StoreError>;

    async fn delete_all_nodes(&self) -> Result<(), StoreError>;

    /// Wipes the backing store. A store holding only virtual nodes makes this
    /// the same as `delete_all_nodes`.
    async fn flush(&self) -> Result<(), StoreError>;
}

/// Virtual nodes keyed by id.
#[derive(Default)]
pub struct InMemoryNodeStore {
    entries: Mutex<BTreeMap<String, Node>>,
}

impl InMemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn get_all_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .cloned()
            .collect())
    }

    async fn save_node(&self, raw: &str) -> Result<Node, StoreError> {
        let mut node: Node =
            serde_json::from_str(raw).map_err(|e| StoreError::InvalidNode(e.to_string()))?;
        if node.id().trim().is_empty() {
            return Err(StoreError::InvalidNode("id must not be empty".to_string()));
        }
        node.details_mut()
            .insert(VIRTUAL_KEY.to_string(), serde_json::Value::Bool(true));
        info!(node_id = %node.id(), "saving virtual node");
        self.entries
            .lock()
            .await
            .insert(node.id().to_string(), node.clone());
        Ok(node)
    }

    async fn delete_node(&self, id: &str) -> Result<(), StoreError> {
        match self.entries.lock().await.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn delete_all_nodes(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        info!(removed = entries.len(), "deleting all virtual nodes");
        entries.clear();
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}
