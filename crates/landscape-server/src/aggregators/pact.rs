// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use landscape_model::{node_type, Node, Status, LANE_UI_COMPONENTS, STATUS_KEY, TYPE_KEY, URL_KEY};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, Instrument};

use super::{join_isolated, AggregationContext, AggregatorRuntime, NodeAggregator};
use crate::caller::OutboundRequest;
use crate::config::{PactBrokerConfig, PACTS_KEY};
use crate::security::InboundCredential;
use crate::{AggregationError, ConvertError};

const REL_MARKER: &str = "rel://";
const BROKER_EVENT_ID: &str = "pact-broker";

/// Maps an interaction path to the node id it targets: `rel://x` and
/// `/rel://x` name the relation `x`, anything else is used verbatim.
#[must_use]
pub fn rel_for_path(path: &str) -> &str {
    path.strip_prefix(REL_MARKER)
        .or_else(|| path.strip_prefix('/').and_then(|p| p.strip_prefix(REL_MARKER)))
        .unwrap_or(path)
}

/// Turns a consumer contract into a UI component node pointing at every
/// relation its interactions call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PactConverter;

impl PactConverter {
    pub fn convert_node(&self, pact: &Value, pact_url: &str) -> Result<Node, ConvertError> {
        let name_at = |pointer: &str| {
            pact.pointer(pointer)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConvertError(format!("pact {pact_url} has no {pointer}")))
        };
        let provider = name_at("/provider/name")?;
        let consumer = name_at("/consumer/name")?;

        let mut node = Node::builder(consumer)
            .lane(LANE_UI_COMPONENTS)
            .detail(URL_KEY, pact_url)
            .detail(TYPE_KEY, node_type::UI_COMPONENT)
            .detail(STATUS_KEY, Status::Up)
            .build();
        let paths = pact
            .get("interactions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|i| i.pointer("/request/path").and_then(Value::as_str));
        for path in paths {
            node.link_to(rel_for_path(path));
        }
        info!(
            consumer,
            provider,
            rels = node.linked_to_node_ids().len(),
            "converted pact"
        );
        Ok(node)
    }
}

/// Reads consumer contracts from a pact broker instead of the registry.
pub struct PactsAggregator {
    runtime: AggregatorRuntime,
    settings: Arc<PactBrokerConfig>,
}

impl PactsAggregator {
    #[must_use]
    pub fn new(runtime: AggregatorRuntime, settings: PactBrokerConfig) -> Self {
        Self {
            runtime,
            settings: Arc::new(settings),
        }
    }

    fn request(
        &self,
        url: impl Into<String>,
        credential: Option<&InboundCredential>,
    ) -> OutboundRequest {
        let mut request =
            OutboundRequest::new(url).with_headers(&self.settings.aggregator.request_headers);
        self.runtime
            .security
            .strategy_for(PACTS_KEY)
            .apply(&mut request, credential);
        request
    }

    async fn pact_urls(&self, broker: &str, credential: Option<&InboundCredential>) -> Vec<String> {
        let listing_url = format!(
            "{}{}",
            broker.trim_end_matches('/'),
            self.settings.latest_path
        );
        let request = self.request(listing_url, credential);
        let Some(listing) = self.runtime.caller.fetch_value(BROKER_EVENT_ID, &request).await else {
            return Vec::new();
        };
        let urls: Vec<String> = listing
            .get("pacts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.pointer(&self.settings.self_href_pointer))
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect();
        info!(pacts = urls.len(), "discovered pact urls");
        urls
    }

    async fn aggregate_pact(
        runtime: AggregatorRuntime,
        settings: Arc<PactBrokerConfig>,
        request: OutboundRequest,
    ) -> Vec<Node> {
        let pact_url = request.url.clone();
        let Some(pact) = runtime.caller.fetch_value(&pact_url, &request).await else {
            return Vec::new();
        };
        match PactConverter.convert_node(&pact, &pact_url) {
            Ok(node) if settings.aggregator.filtered_services.contains(node.id()) => Vec::new(),
            Ok(node) => vec![node],
            Err(err) => {
                runtime
                    .errors
                    .handle_node_error(&pact_url, "pact conversion failed", &err)
                    .await;
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl NodeAggregator for PactsAggregator {
    fn key(&self) -> &'static str {
        PACTS_KEY
    }

    async fn aggregate_nodes(&self, ctx: &AggregationContext) -> Result<Vec<Node>, AggregationError> {
        let Some(broker) = self.settings.url.as_deref() else {
            return Ok(Vec::new());
        };
        let credential = ctx.credential.as_ref();
        let urls = self.pact_urls(broker, credential).await;
        let tasks = urls.into_iter().map(|url| {
            let span = tracing::info_span!("aggregator.pact", url = %url);
            Self::aggregate_pact(
                self.runtime.clone(),
                Arc::clone(&self.settings),
                self.request(url, credential),
            )
            .instrument(span)
        });
        Ok(join_isolated(PACTS_KEY, &self.runtime.errors, tasks).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rel_paths_are_normalised() {
        assert_eq!(rel_for_path("rel://svc:orders"), "svc:orders");
        assert_eq!(rel_for_path("/rel://svc:orders"), "svc:orders");
        assert_eq!(rel_for_path("/api/orders"), "/api/orders");
        assert_eq!(rel_for_path("//rel://x"), "//rel://x");
    }

    #[test]
    fn pact_becomes_ui_component() {
        let pact = json!({
            "provider": {"name": "orders"},
            "consumer": {"name": "shop-ui"},
            "interactions": [
                {"description": "list", "request": {"method": "GET", "path": "/rel://svc:orders"}},
                {"description": "raw", "request": {"method": "GET", "path": "/orders/1"}},
                {"description": "no path", "request": {"method": "GET"}}
            ]
        });
        let node = PactConverter
            .convert_node(&pact, "http://broker/pacts/provider/orders/consumer/shop-ui/latest")
            .expect("convert pact");
        assert_eq!(node.id(), "shop-ui");
        assert_eq!(node.lane(), Some(0));
        assert_eq!(node.detail_str("type"), Some("UI_COMPONENT"));
        assert_eq!(node.detail_str("status"), Some("UP"));
        assert_eq!(
            node.detail_str("url"),
            Some("http://broker/pacts/provider/orders/consumer/shop-ui/latest")
        );
        let targets: Vec<_> = node.linked_to_node_ids().iter().cloned().collect();
        assert_eq!(targets, vec!["/orders/1".to_string(), "svc:orders".to_string()]);
    }

    #[test]
    fn pact_without_consumer_fails() {
        let err = PactConverter
            .convert_node(&json!({"provider": {"name": "orders"}}), "http://broker/p")
            .expect_err("missing consumer");
        assert!(err.to_string().contains("/consumer/name"));
    }
}
