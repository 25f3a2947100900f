// SPDX-License-Identifier: Apache-2.0

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::aggregators::health::{HealthAggregator, HealthConverter};
use crate::aggregators::index::{IndexAggregator, IndexConverter};
use crate::aggregators::mappings::{MappingsAggregator, MappingsConverter};
use crate::aggregators::pact::PactsAggregator;
use crate::aggregators::{AggregatorRuntime, NodeAggregator};
use crate::caller::{JsonFetcher, ServiceCaller};
use crate::config::{validate_startup_config_contract, DashboardConfig};
use crate::discovery::DiscoveryClient;
use crate::events::{ErrorHandler, EventStore};
use crate::graph::GraphRetriever;
use crate::http::handlers;
use crate::http::request_tracing::request_tracing_middleware;
use crate::security::SecurityStrategyFactory;
use crate::store::NodeStore;
use crate::telemetry::RetrieveMetrics;
use crate::uri::UriResolver;

/// External systems the dashboard talks to.
pub struct Collaborators {
    pub discovery: Arc<dyn DiscoveryClient>,
    pub resolver: Arc<dyn UriResolver>,
    pub fetcher: Arc<dyn JsonFetcher>,
    pub store: Arc<dyn NodeStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<GraphRetriever>,
    pub store: Arc<dyn NodeStore>,
    pub events: Arc<EventStore>,
    pub metrics: Arc<RetrieveMetrics>,
    pub config: Arc<DashboardConfig>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
}

impl AppState {
    /// Validates `config` and wires every enabled aggregator.
    pub fn build(config: DashboardConfig, collaborators: Collaborators) -> Result<Self, String> {
        validate_startup_config_contract(&config)?;
        let events = Arc::new(EventStore::new());
        let errors = ErrorHandler::new(Arc::clone(&events));
        let metrics = Arc::new(RetrieveMetrics::default());
        let runtime = AggregatorRuntime {
            discovery: collaborators.discovery,
            resolver: collaborators.resolver,
            caller: ServiceCaller::new(collaborators.fetcher, errors.clone()),
            security: SecurityStrategyFactory::new(&config.security_strategies())?,
            errors: errors.clone(),
            discovery_retry: config.discovery_retry.clone(),
            gateway_service_id: config.gateway_service_id.clone(),
        };

        let mut aggregators: Vec<Arc<dyn NodeAggregator>> = Vec::new();
        if config.health.aggregator.enabled {
            aggregators.push(Arc::new(HealthAggregator::new(
                HealthConverter::new(config.health.infrastructure_keys.clone()),
                runtime.clone(),
                config.health.aggregator.clone(),
            )));
        }
        if config.index.enabled {
            aggregators.push(Arc::new(IndexAggregator::new(
                IndexConverter,
                runtime.clone(),
                config.index.clone(),
            )));
        }
        if config.mappings.enabled {
            aggregators.push(Arc::new(MappingsAggregator::new(
                MappingsConverter::new()?,
                runtime.clone(),
                config.mappings.clone(),
            )));
        }
        if config.pacts.aggregator.enabled {
            aggregators.push(Arc::new(PactsAggregator::new(
                runtime,
                config.pacts.clone(),
            )));
        }

        let retriever = GraphRetriever::new(
            aggregators,
            Arc::clone(&collaborators.store),
            config.graph.clone(),
            errors,
            Arc::clone(&metrics),
        );
        Ok(Self {
            retriever: Arc::new(retriever),
            store: collaborators.store,
            events,
            metrics,
            config: Arc::new(config),
            request_id_seed: Arc::new(AtomicU64::new(1)),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/graph", get(handlers::graph_handler))
        .route(
            "/node",
            post(handlers::save_node_handler)
                .get(handlers::list_nodes_handler)
                .delete(handlers::delete_all_nodes_handler),
        )
        .route("/node/:id", delete(handlers::delete_node_handler))
        .route("/flush", delete(handlers::flush_handler))
        .route("/evictCache", post(handlers::evict_cache_handler))
        .route(
            "/events",
            get(handlers::list_events_handler).delete(handlers::delete_events_handler),
        )
        .route("/healthz", get(handlers::healthz_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(from_fn_with_state(
            state.clone(),
            request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .with_state(state)
}
