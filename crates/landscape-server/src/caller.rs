// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::config::FetchConfig;
use crate::events::ErrorHandler;
use crate::AggregationError;

/// A GET about to be sent to one service.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HeaderMap,
}

impl OutboundRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Adds configured static headers; entries that are not valid HTTP
    /// header names or values are skipped with a warning.
    #[must_use]
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    self.headers.insert(name, value);
                }
                _ => warn!(header = %name, "skipping invalid configured request header"),
            }
        }
        self
    }

    pub fn set_authorization(&mut self, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
                true
            }
            Err(_) => false,
        }
    }
}

/// Raw JSON transport. Implementations report every failure as an
/// [`AggregationError`]; deciding what to do with it is the caller's job.
#[async_trait]
pub trait JsonFetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &OutboundRequest) -> Result<Value, AggregationError>;
}

/// Shared reqwest client bounded by a connection semaphore and a per-call
/// deadline.
pub struct HttpTransport {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
}

impl HttpTransport {
    pub fn new(cfg: &FetchConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .pool_max_idle_per_host(cfg.max_concurrent_connections)
            .build()
            .map_err(|e| format!("http client build failed: {e}"))?;
        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(cfg.max_concurrent_connections)),
            call_timeout: cfg.timeout,
        })
    }

    async fn send(&self, request: &OutboundRequest) -> Result<Value, AggregationError> {
        let transport = |e: reqwest::Error| AggregationError::Transport {
            url: request.url.clone(),
            message: e.to_string(),
        };
        let response = self
            .client
            .get(&request.url)
            .headers(request.headers.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(AggregationError::HttpStatus {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AggregationError::MalformedPayload(format!("body of {} is not json: {e}", request.url))
        })
    }
}

#[async_trait]
impl JsonFetcher for HttpTransport {
    #[instrument(name = "http_fetch", skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &OutboundRequest) -> Result<Value, AggregationError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AggregationError::Transport {
                url: request.url.clone(),
                message: "connection pool closed".to_string(),
            })?;
        match timeout(self.call_timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(AggregationError::Timeout {
                url: request.url.clone(),
                after_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Fetch-with-isolation: every failure becomes a diagnostic event against
/// the service and the call yields nothing.
#[derive(Clone)]
pub struct ServiceCaller {
    fetcher: Arc<dyn JsonFetcher>,
    errors: ErrorHandler,
}

impl ServiceCaller {
    #[must_use]
    pub fn new(fetcher: Arc<dyn JsonFetcher>, errors: ErrorHandler) -> Self {
        Self { fetcher, errors }
    }

    pub async fn fetch_value(&self, service_id: &str, request: &OutboundRequest) -> Option<Value> {
        match self.fetcher.fetch(request).await {
            Ok(value) => {
                debug!(service_id = %service_id, url = %request.url, "fetched payload");
                Some(value)
            }
            Err(err) => {
                self.report(service_id, &err).await;
                None
            }
        }
    }

    pub async fn fetch_json(
        &self,
        service_id: &str,
        request: &OutboundRequest,
    ) -> Option<Map<String, Value>> {
        match self.fetch_value(service_id, request).await? {
            Value::Object(map) => Some(map),
            _ => {
                let err = AggregationError::MalformedPayload(format!(
                    "body of {} is not a json object",
                    request.url
                ));
                self.report(service_id, &err).await;
                None
            }
        }
    }

    pub(crate) async fn report(&self, service_id: &str, err: &AggregationError) {
        if err.is_warning() {
            self.errors
                .handle_node_warning(service_id, &err.to_string())
                .await;
        } else {
            self.errors
                .handle_node_error(service_id, "call failed", err)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventStore;
    use landscape_model::EventLevel;
    use serde_json::json;

    struct Scripted(Result<Value, AggregationError>);

    #[async_trait]
    impl JsonFetcher for Scripted {
        async fn fetch(&self, _request: &OutboundRequest) -> Result<Value, AggregationError> {
            self.0.clone()
        }
    }

    async fn call(result: Result<Value, AggregationError>) -> (Option<Map<String, Value>>, Arc<EventStore>) {
        let store = Arc::new(EventStore::new());
        let caller = ServiceCaller::new(
            Arc::new(Scripted(result)),
            ErrorHandler::new(Arc::clone(&store)),
        );
        let out = caller
            .fetch_json("svc", &OutboundRequest::new("http://svc/health"))
            .await;
        (out, store)
    }

    #[tokio::test]
    async fn status_error_is_a_warning_event() {
        let (out, store) = call(Err(AggregationError::HttpStatus {
            url: "http://svc/health".into(),
            status: 503,
        }))
        .await;
        assert!(out.is_none());
        let events = store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, EventLevel::Warning);
        assert!(events[0].message.contains("503"));
    }

    #[tokio::test]
    async fn transport_error_and_non_object_are_errors() {
        let (out, store) = call(Err(AggregationError::Transport {
            url: "http://svc/health".into(),
            message: "connection reset".into(),
        }))
        .await;
        assert!(out.is_none());
        assert_eq!(store.events().await[0].level, EventLevel::Error);

        let (out, store) = call(Ok(json!([1, 2]))).await;
        assert!(out.is_none());
        assert_eq!(store.events().await[0].level, EventLevel::Error);
    }

    #[tokio::test]
    async fn object_body_passes_through() {
        let (out, store) = call(Ok(json!({"status": "UP"}))).await;
        assert_eq!(out.and_then(|m| m.get("status").cloned()), Some(json!("UP")));
        assert!(store.events().await.is_empty());
    }

    #[test]
    fn invalid_configured_headers_are_skipped() {
        let mut headers = BTreeMap::new();
        headers.insert("x-tenant".to_string(), "blue".to_string());
        headers.insert("bad header".to_string(), "v".to_string());
        let request = OutboundRequest::new("http://svc").with_headers(&headers);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(
            request.headers.get("x-tenant").and_then(|v| v.to_str().ok()),
            Some("blue")
        );
    }
}
