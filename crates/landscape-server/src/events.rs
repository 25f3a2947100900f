// SPDX-License-Identifier: Apache-2.0

use landscape_model::{EventLevel, SystemEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, warn};

/// In-memory log of diagnostic events, oldest first.
#[derive(Default)]
pub struct EventStore {
    events: Mutex<Vec<SystemEvent>>,
    published_total: AtomicU64,
}

impl EventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, event: SystemEvent) {
        self.published_total.fetch_add(1, Ordering::Relaxed);
        self.events.lock().await.push(event);
    }

    pub async fn events(&self) -> Vec<SystemEvent> {
        self.events.lock().await.clone()
    }

    pub async fn delete_events(&self) {
        self.events.lock().await.clear();
    }

    /// Monotonic count of everything ever published, unaffected by deletes.
    #[must_use]
    pub fn published_total(&self) -> u64 {
        self.published_total.load(Ordering::Relaxed)
    }
}

/// Logs a skipped unit of work and records it as an event.
#[derive(Clone, Default)]
pub struct ErrorHandler {
    store: Arc<EventStore>,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub async fn handle_node_warning(&self, node_id: &str, message: &str) {
        warn!(service_id = %node_id, "{message}");
        self.store
            .publish(SystemEvent::node(EventLevel::Warning, node_id, message, None))
            .await;
    }

    pub async fn handle_node_error(
        &self,
        node_id: &str,
        message: &str,
        cause: &(dyn std::error::Error + Send + Sync),
    ) {
        error!(service_id = %node_id, cause = %cause, "{message}");
        self.store
            .publish(SystemEvent::node(
                EventLevel::Error,
                node_id,
                message,
                Some(cause.to_string()),
            ))
            .await;
    }

    pub async fn handle_system_error(
        &self,
        message: &str,
        cause: &(dyn std::error::Error + Send + Sync),
    ) {
        error!(cause = %cause, "{message}");
        self.store
            .publish(SystemEvent::system(
                EventLevel::Error,
                message,
                Some(cause.to_string()),
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AggregationError;

    #[tokio::test]
    async fn handler_publishes_in_order_and_delete_keeps_total() {
        let store = Arc::new(EventStore::new());
        let handler = ErrorHandler::new(Arc::clone(&store));
        handler.handle_node_warning("svc-a", "no instances").await;
        handler
            .handle_node_error(
                "svc-b",
                "call failed",
                &AggregationError::Transport {
                    url: "http://svc-b/health".into(),
                    message: "connection refused".into(),
                },
            )
            .await;

        let events = store.events().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, EventLevel::Warning);
        assert_eq!(events[0].node_id.as_deref(), Some("svc-a"));
        assert_eq!(events[1].level, EventLevel::Error);
        assert!(events[1]
            .cause
            .as_deref()
            .is_some_and(|c| c.contains("connection refused")));

        store.delete_events().await;
        assert!(store.events().await.is_empty());
        assert_eq!(store.published_total(), 2);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn handler_futures_can_cross_spawned_tasks() {
        let handler = ErrorHandler::new(Arc::new(EventStore::new()));
        let cause = AggregationError::Discovery("registry down".into());
        assert_send(&handler.handle_node_error("svc", "call failed", &cause));
        assert_send(&handler.handle_system_error("listing failed", &cause));
        assert_send(&handler.handle_node_warning("svc", "no instances"));
    }
}
