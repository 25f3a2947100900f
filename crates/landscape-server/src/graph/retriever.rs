// SPDX-License-Identifier: Apache-2.0

use landscape_model::{Graph, Node, NodeMerger};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{info, Instrument};

use super::cache::{CacheOutcome, GraphCache};
use crate::aggregators::{AggregationContext, NodeAggregator};
use crate::config::GraphConfig;
use crate::events::ErrorHandler;
use crate::store::NodeStore;
use crate::telemetry::RetrieveMetrics;

const STORE_SOURCE: &str = "virtual";

type SourceResult = (
    &'static str,
    Result<Vec<Node>, Box<dyn std::error::Error + Send + Sync>>,
);

/// Runs every node source concurrently, folds the results and memoises the
/// assembled graph until evicted.
pub struct GraphRetriever {
    aggregators: Vec<Arc<dyn NodeAggregator>>,
    store: Arc<dyn NodeStore>,
    cache: GraphCache,
    legend: GraphConfig,
    errors: ErrorHandler,
    metrics: Arc<RetrieveMetrics>,
}

impl GraphRetriever {
    #[must_use]
    pub fn new(
        aggregators: Vec<Arc<dyn NodeAggregator>>,
        store: Arc<dyn NodeStore>,
        legend: GraphConfig,
        errors: ErrorHandler,
        metrics: Arc<RetrieveMetrics>,
    ) -> Self {
        Self {
            aggregators,
            store,
            cache: GraphCache::new(),
            legend,
            errors,
            metrics,
        }
    }

    #[must_use]
    pub fn aggregator_keys(&self) -> Vec<&'static str> {
        self.aggregators.iter().map(|a| a.key()).collect()
    }

    /// Cached graph, or a fresh one. The credential in `ctx` only shapes the
    /// computation that fills an empty slot; cached graphs are shared.
    pub async fn retrieve(&self, ctx: &AggregationContext) -> Arc<Graph> {
        let (graph, outcome) = self.cache.get_or_compute(|| self.compute(ctx)).await;
        let counter = match outcome {
            CacheOutcome::Hit => &self.metrics.cache_hits,
            CacheOutcome::Computed => &self.metrics.cache_misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        graph
    }

    pub async fn evict(&self) {
        self.metrics.cache_evictions.fetch_add(1, Ordering::Relaxed);
        self.cache.evict().await;
        info!("graph cache evicted");
    }

    /// Uncached assembly. Each source that fails outright is reported and
    /// contributes nothing; the graph is built from whatever the rest return.
    pub async fn compute(&self, ctx: &AggregationContext) -> Graph {
        let started = Instant::now();
        let span = tracing::info_span!("graph.retrieve", sources = self.aggregators.len() + 1);
        let merged = self.merge_sources(ctx).instrument(span).await;
        let graph = Graph::from_nodes(&merged)
            .with_legend(self.legend.lanes.clone(), self.legend.types.clone());
        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.last_compute_ms.store(elapsed_ms, Ordering::Relaxed);
        info!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            elapsed_ms,
            "graph assembled"
        );
        graph
    }

    async fn merge_sources(&self, ctx: &AggregationContext) -> Vec<Node> {
        let mut set: JoinSet<SourceResult> = JoinSet::new();
        for aggregator in &self.aggregators {
            let aggregator = Arc::clone(aggregator);
            let ctx = ctx.clone();
            let key = aggregator.key();
            let span = tracing::info_span!("aggregator", aggregator = key);
            set.spawn(
                async move {
                    let result = aggregator
                        .aggregate_nodes(&ctx)
                        .await
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
                    (key, result)
                }
                .instrument(span),
            );
        }
        let store = Arc::clone(&self.store);
        set.spawn(async move {
            let result = store
                .get_all_nodes()
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>);
            (STORE_SOURCE, result)
        });

        let mut merger = NodeMerger::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((source, Ok(nodes))) => {
                    self.metrics.observe_source(source, nodes.len()).await;
                    merger.extend(nodes);
                }
                Ok((source, Err(err))) => {
                    self.metrics.observe_source_failure(source).await;
                    self.errors
                        .handle_system_error(&format!("node source {source} failed"), err.as_ref())
                        .await;
                }
                Err(err) => {
                    self.errors
                        .handle_system_error("node source task aborted", &err)
                        .await;
                }
            }
        }
        merger.into_nodes()
    }
}
