// SPDX-License-Identifier: Apache-2.0

use landscape_model::Graph;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Single memo slot for the assembled graph.
///
/// Computations are serialised by their own lock, so concurrent callers on a
/// cold slot wait for one computation instead of each starting their own.
/// The slot lock is only held for reads and writes. `evict` never waits on a
/// computation; it bumps the generation, and a result computed under an older
/// generation is returned to its caller but not stored.
#[derive(Default)]
pub struct GraphCache {
    slot: Mutex<Slot>,
    compute: Mutex<()>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    graph: Option<Arc<Graph>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Computed,
}

impl GraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_compute<F, Fut>(&self, compute: F) -> (Arc<Graph>, CacheOutcome)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Graph>,
    {
        if let Some(graph) = self.cached().await {
            return (graph, CacheOutcome::Hit);
        }
        let _computing = self.compute.lock().await;
        let generation = {
            let slot = self.slot.lock().await;
            if let Some(graph) = slot.graph.as_ref() {
                return (Arc::clone(graph), CacheOutcome::Hit);
            }
            slot.generation
        };
        let graph = Arc::new(compute().await);
        let mut slot = self.slot.lock().await;
        if slot.generation == generation {
            slot.graph = Some(Arc::clone(&graph));
        } else {
            debug!("graph evicted while computing; result not cached");
        }
        (graph, CacheOutcome::Computed)
    }

    pub async fn evict(&self) {
        let mut slot = self.slot.lock().await;
        slot.generation = slot.generation.wrapping_add(1);
        slot.graph = None;
    }

    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.graph.is_some()
    }

    async fn cached(&self) -> Option<Arc<Graph>> {
        self.slot.lock().await.graph.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landscape_model::Node;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn computes_once_until_evicted() {
        let cache = GraphCache::new();
        let computations = AtomicU64::new(0);
        let counter = &computations;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Graph::from_nodes(&[Node::new("svc")])
        };

        let (first, outcome) = cache.get_or_compute(compute).await;
        assert_eq!(outcome, CacheOutcome::Computed);
        let (second, outcome) = cache.get_or_compute(compute).await;
        assert_eq!(outcome, CacheOutcome::Hit);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(computations.load(Ordering::SeqCst), 1);

        cache.evict().await;
        assert!(!cache.is_cached().await);
        let (_, outcome) = cache.get_or_compute(compute).await;
        assert_eq!(outcome, CacheOutcome::Computed);
        assert_eq!(computations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_cold_callers_share_one_computation() {
        let cache = Arc::new(GraphCache::new());
        let computations = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let computations = Arc::clone(&computations);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(|| async move {
                        computations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Graph::default()
                    })
                    .await
                    .1
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }
        assert_eq!(computations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evict_does_not_wait_for_an_inflight_computation() {
        let cache = Arc::new(GraphCache::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let inflight = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(|| async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Graph::from_nodes(&[Node::new("stale")])
                    })
                    .await
            })
        };
        started_rx.await.expect("computation started");

        tokio::time::timeout(std::time::Duration::from_secs(2), cache.evict())
            .await
            .expect("evict returns while a computation is running");

        release_tx.send(()).expect("release computation");
        let (graph, outcome) = inflight.await.expect("join");
        assert_eq!(outcome, CacheOutcome::Computed);
        assert_eq!(graph.nodes[0].id, "stale");
        assert!(!cache.is_cached().await);

        let (fresh, outcome) = cache
            .get_or_compute(|| async { Graph::from_nodes(&[Node::new("fresh")]) })
            .await;
        assert_eq!(outcome, CacheOutcome::Computed);
        assert_eq!(fresh.nodes[0].id, "fresh");
        assert!(cache.is_cached().await);
    }
}
