// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct RetrieveMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_evictions: AtomicU64,
    pub last_compute_ms: AtomicU64,
    source_nodes: Mutex<BTreeMap<String, u64>>,
    source_failures: Mutex<BTreeMap<String, u64>>,
}

impl RetrieveMetrics {
    pub async fn observe_source(&self, source: &str, nodes: usize) {
        *self
            .source_nodes
            .lock()
            .await
            .entry(source.to_string())
            .or_default() += nodes as u64;
    }

    pub async fn observe_source_failure(&self, source: &str) {
        *self
            .source_failures
            .lock()
            .await
            .entry(source.to_string())
            .or_default() += 1;
    }

    pub async fn render_prometheus(&self, events_published: u64) -> String {
        let mut out = String::new();
        let counters = [
            ("landscape_graph_cache_hits_total", &self.cache_hits),
            ("landscape_graph_cache_misses_total", &self.cache_misses),
            ("landscape_graph_cache_evictions_total", &self.cache_evictions),
        ];
        for (name, value) in counters {
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {}", value.load(Ordering::Relaxed));
        }
        let _ = writeln!(out, "# TYPE landscape_graph_last_compute_ms gauge");
        let _ = writeln!(
            out,
            "landscape_graph_last_compute_ms {}",
            self.last_compute_ms.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "# TYPE landscape_events_published_total counter");
        let _ = writeln!(out, "landscape_events_published_total {events_published}");

        let _ = writeln!(out, "# TYPE landscape_source_nodes_total counter");
        for (source, total) in self.source_nodes.lock().await.iter() {
            let _ = writeln!(out, "landscape_source_nodes_total{{source=\"{source}\"}} {total}");
        }
        let _ = writeln!(out, "# TYPE landscape_source_failures_total counter");
        for (source, total) in self.source_failures.lock().await.iter() {
            let _ = writeln!(
                out,
                "landscape_source_failures_total{{source=\"{source}\"}} {total}"
            );
        }
        out
    }
}
