// SPDX-License-Identifier: Apache-2.0

use landscape_model::Node;
use std::collections::BTreeSet;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::AggregatorRuntime;
use crate::events::ErrorHandler;
use crate::AggregationError;

/// Lists service ids, lower-cased and without the gateway, retrying the
/// registry per the discovery policy. Every retried failure is published as
/// a system event; the final one is returned to the caller.
pub(crate) async fn discover_service_ids(
    runtime: &AggregatorRuntime,
    aggregator: &'static str,
) -> Result<Vec<String>, AggregationError> {
    let gateway = runtime.gateway_service_id.to_lowercase();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match runtime.discovery.list_service_ids().await {
            Ok(ids) => {
                let ids: BTreeSet<String> = ids
                    .into_iter()
                    .map(|id| id.to_lowercase())
                    .filter(|id| *id != gateway)
                    .collect();
                info!(aggregator, services = ids.len(), "discovered services");
                return Ok(ids.into_iter().collect());
            }
            Err(err) => {
                if runtime.discovery_retry.exhausted(attempt) {
                    return Err(match err {
                        AggregationError::Discovery(msg) => AggregationError::Discovery(msg),
                        other => AggregationError::Discovery(other.to_string()),
                    });
                }
                let delay = runtime.discovery_retry.delay_for_attempt(attempt);
                warn!(
                    aggregator,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying service discovery: {err}"
                );
                runtime
                    .errors
                    .handle_system_error(
                        &format!("{aggregator} service discovery failed (attempt {attempt})"),
                        &err,
                    )
                    .await;
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Runs one task per unit of work and concatenates whatever completes.
///
/// Results are collected in completion order. A task that panics is reported
/// as a system event and contributes nothing; its siblings keep running.
pub(crate) async fn join_isolated<I, F>(
    aggregator: &'static str,
    errors: &ErrorHandler,
    tasks: I,
) -> Vec<Node>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Vec<Node>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(task);
    }
    let mut nodes = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(batch) => nodes.extend(batch),
            Err(err) => {
                errors
                    .handle_system_error(&format!("{aggregator} task aborted"), &err)
                    .await;
            }
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventStore;
    use std::sync::Arc;

    async fn failing() -> Vec<Node> {
        panic!("converter bug")
    }

    #[tokio::test]
    async fn panicking_task_is_isolated() {
        let store = Arc::new(EventStore::new());
        let errors = ErrorHandler::new(Arc::clone(&store));
        let tasks: Vec<std::pin::Pin<Box<dyn Future<Output = Vec<Node>> + Send>>> = vec![
            Box::pin(async { vec![Node::new("a")] }),
            Box::pin(failing()),
            Box::pin(async { vec![Node::new("b"), Node::new("c")] }),
        ];
        let nodes = join_isolated("health", &errors, tasks).await;
        assert_eq!(nodes.len(), 3);
        let events = store.events().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("health"));
    }
}
