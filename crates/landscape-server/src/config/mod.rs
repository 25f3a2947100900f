// SPDX-License-Identifier: Apache-2.0

use landscape_model::{default_lanes, default_types, LaneLegend};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::security::KNOWN_STRATEGIES;

pub const HEALTH_KEY: &str = "health";
pub const INDEX_KEY: &str = "index";
pub const MAPPINGS_KEY: &str = "mappings";
pub const PACTS_KEY: &str = "pacts";

pub const DEFAULT_HEALTH_FILTER: [&str; 6] = [
    "hystrix",
    "turbine",
    "diskSpace",
    "configServer",
    "discovery",
    "zuul",
];
pub const DEFAULT_INDEX_FILTER: [&str; 5] =
    ["hystrix", "turbine", "configServer", "discovery", "zuul"];

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Backoff for discovery listing. `max_attempts == 0` retries forever.
#[derive(Debug, Clone, Serialize)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_backoff_ms: 250,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }

    /// `attempt` is 1-based: the wait after the first failure is one base step.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let step = self.base_backoff_ms.saturating_mul(attempt as u64);
        Duration::from_millis(step.min(self.max_backoff_ms))
    }

    #[must_use]
    pub fn exhausted(&self, attempt: usize) -> bool {
        !self.is_unbounded() && attempt >= self.max_attempts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatorConfig {
    pub enabled: bool,
    pub request_headers: BTreeMap<String, String>,
    pub filtered_services: BTreeSet<String>,
    pub security: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_headers: BTreeMap::new(),
            filtered_services: BTreeSet::new(),
            security: "none".to_string(),
        }
    }
}

impl AggregatorConfig {
    #[must_use]
    pub fn with_filter(items: &[&str]) -> Self {
        Self {
            filtered_services: string_set(items),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthConfig {
    pub aggregator: AggregatorConfig,
    /// Health indicator keys folded into the service node instead of
    /// becoming dependency nodes.
    pub infrastructure_keys: BTreeSet<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::with_filter(&DEFAULT_HEALTH_FILTER),
            infrastructure_keys: string_set(&DEFAULT_HEALTH_FILTER),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PactBrokerConfig {
    pub aggregator: AggregatorConfig,
    pub url: Option<String>,
    pub latest_path: String,
    /// JSON pointer applied to each entry of the broker's `pacts` array.
    pub self_href_pointer: String,
}

impl Default for PactBrokerConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig {
                enabled: false,
                ..AggregatorConfig::default()
            },
            url: None,
            latest_path: "/pacts/latest".to_string(),
            self_href_pointer: "/_links/self/0/href".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_concurrent_connections: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_concurrent_connections: 100,
            user_agent: format!("{}/{}", crate::CRATE_NAME, env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphConfig {
    pub lanes: Vec<LaneLegend>,
    pub types: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
            types: default_types(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
    pub shutdown_drain: Duration,
    pub evict_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: 64 * 1024,
            shutdown_drain: Duration::from_secs(2),
            evict_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub fetch: FetchConfig,
    pub discovery_retry: RetryPolicy,
    /// Service id of the edge gateway, which is never aggregated itself.
    pub gateway_service_id: String,
    pub health: HealthConfig,
    pub index: AggregatorConfig,
    pub mappings: AggregatorConfig,
    pub pacts: PactBrokerConfig,
    pub graph: GraphConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            fetch: FetchConfig::default(),
            discovery_retry: RetryPolicy::default(),
            gateway_service_id: "zuul".to_string(),
            health: HealthConfig::default(),
            index: AggregatorConfig::with_filter(&DEFAULT_INDEX_FILTER),
            mappings: AggregatorConfig::default(),
            pacts: PactBrokerConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Per-key settings the generic service aggregators run with.
    #[must_use]
    pub fn aggregator(&self, key: &str) -> Option<&AggregatorConfig> {
        match key {
            HEALTH_KEY => Some(&self.health.aggregator),
            INDEX_KEY => Some(&self.index),
            MAPPINGS_KEY => Some(&self.mappings),
            PACTS_KEY => Some(&self.pacts.aggregator),
            _ => None,
        }
    }

    /// Aggregator key to outbound credential strategy name.
    #[must_use]
    pub fn security_strategies(&self) -> BTreeMap<String, String> {
        [HEALTH_KEY, INDEX_KEY, MAPPINGS_KEY, PACTS_KEY]
            .iter()
            .filter_map(|key| {
                self.aggregator(key)
                    .map(|cfg| ((*key).to_string(), cfg.security.clone()))
            })
            .collect()
    }
}

pub fn validate_startup_config_contract(cfg: &DashboardConfig) -> Result<(), String> {
    if cfg.fetch.timeout.is_zero() {
        return Err("fetch timeout must be > 0".to_string());
    }
    if cfg.fetch.max_concurrent_connections == 0 {
        return Err("max concurrent connections must be > 0".to_string());
    }
    if cfg.server.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if cfg.discovery_retry.base_backoff_ms > cfg.discovery_retry.max_backoff_ms {
        return Err("discovery retry base backoff must not exceed max backoff".to_string());
    }
    if cfg.graph.lanes.iter().any(|l| l.label.trim().is_empty()) {
        return Err("lane labels must not be empty".to_string());
    }
    for (key, strategy) in cfg.security_strategies() {
        if !KNOWN_STRATEGIES.contains(&strategy.as_str()) {
            return Err(format!("unknown security strategy `{strategy}` for aggregator {key}"));
        }
    }
    if cfg.pacts.aggregator.enabled && cfg.pacts.url.as_deref().map_or(true, str::is_empty) {
        return Err("pacts aggregator enabled without a pact broker url".to_string());
    }
    Ok(())
}
