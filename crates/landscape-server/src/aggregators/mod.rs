// SPDX-License-Identifier: Apache-2.0

//! Node sources.
//!
//! Every aggregator discovers its inputs, fetches them concurrently and
//! converts each payload into nodes. A failing service never fails the
//! aggregator; only a discovery failure after the retry budget does.

use async_trait::async_trait;
use landscape_model::Node;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::caller::{OutboundRequest, ServiceCaller};
use crate::config::{AggregatorConfig, RetryPolicy};
use crate::discovery::{DiscoveryClient, ServiceInstance};
use crate::events::ErrorHandler;
use crate::security::{InboundCredential, SecurityStrategyFactory};
use crate::uri::UriResolver;
use crate::{AggregationError, ConvertError};

mod fanout;
pub mod health;
pub mod index;
pub mod mappings;
pub mod pact;

pub(crate) use fanout::{discover_service_ids, join_isolated};

/// Per-call input threaded from the HTTP boundary into every aggregator.
#[derive(Debug, Clone, Default)]
pub struct AggregationContext {
    pub credential: Option<InboundCredential>,
}

impl AggregationContext {
    #[must_use]
    pub fn with_credential(credential: Option<InboundCredential>) -> Self {
        Self { credential }
    }
}

#[async_trait]
pub trait NodeAggregator: Send + Sync + 'static {
    fn key(&self) -> &'static str;

    async fn aggregate_nodes(&self, ctx: &AggregationContext) -> Result<Vec<Node>, AggregationError>;
}

/// Collaborators shared by all aggregators of one process.
#[derive(Clone)]
pub struct AggregatorRuntime {
    pub discovery: Arc<dyn DiscoveryClient>,
    pub resolver: Arc<dyn UriResolver>,
    pub caller: ServiceCaller,
    pub security: SecurityStrategyFactory,
    pub errors: ErrorHandler,
    pub discovery_retry: RetryPolicy,
    pub gateway_service_id: String,
}

/// One introspection endpoint per service and the rules to read it.
pub trait PayloadConverter: Send + Sync + 'static {
    fn key(&self) -> &'static str;

    fn resolve_url(&self, resolver: &dyn UriResolver, instance: &ServiceInstance) -> String;

    /// `home_page_url` is the service's own base URI, used to absolutise
    /// relative documentation links.
    fn convert(
        &self,
        service_id: &str,
        home_page_url: &str,
        payload: &Map<String, Value>,
    ) -> Result<Vec<Node>, ConvertError>;
}

/// Discovery-driven aggregator for any per-service payload.
pub struct ServiceAggregator<C> {
    converter: Arc<C>,
    runtime: AggregatorRuntime,
    settings: Arc<AggregatorConfig>,
}

impl<C: PayloadConverter> ServiceAggregator<C> {
    #[must_use]
    pub fn new(converter: C, runtime: AggregatorRuntime, settings: AggregatorConfig) -> Self {
        Self {
            converter: Arc::new(converter),
            runtime,
            settings: Arc::new(settings),
        }
    }

    async fn aggregate_service(
        converter: Arc<C>,
        runtime: AggregatorRuntime,
        settings: Arc<AggregatorConfig>,
        credential: Option<InboundCredential>,
        service_id: String,
    ) -> Vec<Node> {
        let instances = match runtime.discovery.get_instances(&service_id).await {
            Ok(instances) => instances,
            Err(err) => {
                runtime
                    .errors
                    .handle_node_error(&service_id, "instance lookup failed", &err)
                    .await;
                return Vec::new();
            }
        };
        let Some(instance) = instances.first() else {
            let err = AggregationError::NoInstances(service_id.clone());
            runtime
                .errors
                .handle_node_warning(&service_id, &err.to_string())
                .await;
            return Vec::new();
        };

        let mut request =
            OutboundRequest::new(converter.resolve_url(runtime.resolver.as_ref(), instance))
                .with_headers(&settings.request_headers);
        runtime
            .security
            .strategy_for(converter.key())
            .apply(&mut request, credential.as_ref());

        let Some(payload) = runtime.caller.fetch_json(&service_id, &request).await else {
            return Vec::new();
        };
        let home_page_url = runtime.resolver.resolve_home_page_url(instance);
        match converter.convert(&service_id, &home_page_url, &payload) {
            Ok(nodes) => nodes
                .into_iter()
                .filter(|node| !settings.filtered_services.contains(node.id()))
                .collect(),
            Err(err) => {
                runtime
                    .errors
                    .handle_node_error(&service_id, "payload conversion failed", &err)
                    .await;
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<C: PayloadConverter> NodeAggregator for ServiceAggregator<C> {
    fn key(&self) -> &'static str {
        self.converter.key()
    }

    async fn aggregate_nodes(&self, ctx: &AggregationContext) -> Result<Vec<Node>, AggregationError> {
        let key = self.key();
        let service_ids = discover_service_ids(&self.runtime, key).await?;
        let tasks = service_ids.into_iter().map(|service_id| {
            let span = tracing::info_span!("aggregator.service", aggregator = key, service_id = %service_id);
            Self::aggregate_service(
                Arc::clone(&self.converter),
                self.runtime.clone(),
                Arc::clone(&self.settings),
                ctx.credential.clone(),
                service_id,
            )
            .instrument(span)
        });
        Ok(join_isolated(key, &self.runtime.errors, tasks).await)
    }
}
