// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

use crate::aggregators::AggregationContext;
use crate::security::InboundCredential;
use crate::{AppState, StoreError};

pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({"error": {"code": code, "message": message}})),
    )
        .into_response()
}

fn store_error_response(err: &StoreError) -> Response {
    let status = match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.code(), &err.to_string())
}

pub(crate) async fn graph_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let ctx = AggregationContext::with_credential(InboundCredential::from_headers(&headers));
    let graph = state.retriever.retrieve(&ctx).await;
    Json(graph)
}

pub(crate) async fn save_node_handler(State(state): State<AppState>, body: String) -> Response {
    match state.store.save_node(&body).await {
        Ok(node) => {
            state.retriever.evict().await;
            (StatusCode::OK, Json(node)).into_response()
        }
        Err(err) => store_error_response(&err),
    }
}

pub(crate) async fn list_nodes_handler(State(state): State<AppState>) -> Response {
    match state.store.get_all_nodes().await {
        Ok(nodes) => Json(nodes).into_response(),
        Err(err) => store_error_response(&err),
    }
}

pub(crate) async fn delete_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete_node(&id).await {
        Ok(()) => {
            state.retriever.evict().await;
            StatusCode::OK.into_response()
        }
        Err(err) => store_error_response(&err),
    }
}

pub(crate) async fn delete_all_nodes_handler(State(state): State<AppState>) -> Response {
    match state.store.delete_all_nodes().await {
        Ok(()) => {
            state.retriever.evict().await;
            StatusCode::OK.into_response()
        }
        Err(err) => store_error_response(&err),
    }
}

pub(crate) async fn flush_handler(State(state): State<AppState>) -> Response {
    match state.store.flush().await {
        Ok(()) => {
            state.retriever.evict().await;
            StatusCode::OK.into_response()
        }
        Err(err) => store_error_response(&err),
    }
}

pub(crate) async fn evict_cache_handler(State(state): State<AppState>) -> impl IntoResponse {
    let evicted = state.config.server.evict_enabled;
    if evicted {
        state.retriever.evict().await;
    } else {
        info!("cache eviction requested but disabled by configuration");
    }
    Json(json!({"evicted": evicted}))
}

pub(crate) async fn list_events_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.events.events().await)
}

pub(crate) async fn delete_events_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.events.delete_events().await;
    StatusCode::OK
}

pub(crate) async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state
        .metrics
        .render_prometheus(state.events.published_total())
        .await;
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
