#![forbid(unsafe_code)]
//! Live dependency graph of a service landscape.
//!
//! Each discovered service is asked for its introspection payloads (health,
//! HAL index, request mappings) and consumer contracts are read from a pact
//! broker. The resulting nodes are merged by id and served as one graph.

pub mod aggregators;
mod caller;
pub mod config;
mod discovery;
mod error;
mod events;
mod fake;
mod graph;
mod http;
mod runtime;
pub mod security;
mod store;
mod telemetry;
mod uri;

pub use aggregators::{AggregationContext, AggregatorRuntime, NodeAggregator, PayloadConverter};
pub use caller::{HttpTransport, JsonFetcher, OutboundRequest, ServiceCaller};
pub use config::{validate_startup_config_contract, DashboardConfig, RetryPolicy};
pub use discovery::{DiscoveryClient, ServiceInstance, StaticDiscovery};
pub use error::{AggregationError, ConvertError, StoreError};
pub use events::{ErrorHandler, EventStore};
pub use fake::{FakeDiscovery, FakeFetcher, FakeResponse};
pub use graph::{CacheOutcome, GraphCache, GraphRetriever};
pub use runtime::{build_router, AppState, Collaborators};
pub use security::{InboundCredential, SecurityStrategyFactory};
pub use store::{InMemoryNodeStore, NodeStore};
pub use telemetry::RetrieveMetrics;
pub use uri::{DefaultUriResolver, MetadataUriResolver, UriResolver};

pub const CRATE_NAME: &str = "landscape-server";

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Arc;

    pub(crate) fn empty_state() -> AppState {
        AppState::build(
            DashboardConfig::default(),
            Collaborators {
                discovery: Arc::new(FakeDiscovery::default()),
                resolver: Arc::new(DefaultUriResolver),
                fetcher: Arc::new(FakeFetcher::default()),
                store: Arc::new(InMemoryNodeStore::new()),
            },
        )
        .expect("default state builds")
    }
}
