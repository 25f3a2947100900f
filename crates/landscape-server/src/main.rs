#![forbid(unsafe_code)]

use landscape_server::config::{AggregatorConfig, DashboardConfig};
use landscape_server::{
    build_router, AppState, Collaborators, DefaultUriResolver, DiscoveryClient, HttpTransport,
    InMemoryNodeStore, MetadataUriResolver, RetryPolicy, StaticDiscovery, UriResolver,
};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(name, default_ms))
}

fn env_list(name: &str) -> Option<BTreeSet<String>> {
    let raw = env::var(name).ok()?;
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
    )
}

fn env_map(name: &str) -> BTreeMap<String, String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .filter_map(|item| {
            let (k, v) = item.split_once('=')?;
            let key = k.trim();
            let value = v.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Overlays `LANDSCAPE_<PREFIX>_*` variables onto one aggregator's settings.
fn apply_aggregator_env(prefix: &str, cfg: &mut AggregatorConfig) {
    cfg.enabled = env_bool(&format!("LANDSCAPE_{prefix}_ENABLED"), cfg.enabled);
    if let Some(filtered) = env_list(&format!("LANDSCAPE_{prefix}_FILTERED_SERVICES")) {
        cfg.filtered_services = filtered;
    }
    cfg.request_headers
        .extend(env_map(&format!("LANDSCAPE_{prefix}_REQUEST_HEADERS")));
    if let Ok(strategy) = env::var(format!("LANDSCAPE_{prefix}_SECURITY")) {
        cfg.security = strategy;
    }
}

fn config_from_env() -> DashboardConfig {
    let mut cfg = DashboardConfig::default();
    cfg.server.bind_addr = env::var("LANDSCAPE_BIND").unwrap_or(cfg.server.bind_addr);
    cfg.server.max_body_bytes = env_usize("LANDSCAPE_MAX_BODY_BYTES", cfg.server.max_body_bytes);
    cfg.server.shutdown_drain = env_duration_ms("LANDSCAPE_SHUTDOWN_DRAIN_MS", 2000);
    cfg.server.evict_enabled = env_bool("LANDSCAPE_EVICT_ENABLED", cfg.server.evict_enabled);

    cfg.fetch.timeout = env_duration_ms("LANDSCAPE_FETCH_TIMEOUT_MS", 5000);
    cfg.fetch.max_concurrent_connections = env_usize(
        "LANDSCAPE_MAX_CONCURRENT_CONNECTIONS",
        cfg.fetch.max_concurrent_connections,
    );
    let defaults = RetryPolicy::default();
    cfg.discovery_retry = RetryPolicy {
        max_attempts: env_usize("LANDSCAPE_DISCOVERY_MAX_ATTEMPTS", defaults.max_attempts),
        base_backoff_ms: env_u64("LANDSCAPE_DISCOVERY_BACKOFF_MS", defaults.base_backoff_ms),
        max_backoff_ms: env_u64("LANDSCAPE_DISCOVERY_MAX_BACKOFF_MS", defaults.max_backoff_ms),
    };
    if let Ok(gateway) = env::var("LANDSCAPE_GATEWAY_SERVICE_ID") {
        cfg.gateway_service_id = gateway.to_lowercase();
    }

    apply_aggregator_env("HEALTH", &mut cfg.health.aggregator);
    if let Some(keys) = env_list("LANDSCAPE_HEALTH_INFRASTRUCTURE_KEYS") {
        cfg.health.infrastructure_keys = keys;
    }
    apply_aggregator_env("INDEX", &mut cfg.index);
    apply_aggregator_env("MAPPINGS", &mut cfg.mappings);

    cfg.pacts.url = env::var("LANDSCAPE_PACT_BROKER_URL")
        .ok()
        .filter(|u| !u.trim().is_empty());
    cfg.pacts.aggregator.enabled = cfg.pacts.url.is_some();
    apply_aggregator_env("PACTS", &mut cfg.pacts.aggregator);
    if let Ok(path) = env::var("LANDSCAPE_PACT_LATEST_PATH") {
        cfg.pacts.latest_path = path;
    }
    cfg
}

fn discovery_from_env() -> Result<StaticDiscovery, String> {
    let discovery = match env::var("LANDSCAPE_SERVICES_FILE") {
        Ok(path) => StaticDiscovery::from_file(Path::new(&path))?,
        Err(_) => StaticDiscovery::parse(&env::var("LANDSCAPE_SERVICES").unwrap_or_default())?,
    };
    if discovery.is_empty() {
        warn!("no services configured; only stored nodes will be served");
    }
    Ok(discovery)
}

fn resolver_from_env() -> Result<Arc<dyn UriResolver>, String> {
    match env::var("LANDSCAPE_URI_RESOLVER").as_deref() {
        Err(_) | Ok("default") => Ok(Arc::new(DefaultUriResolver)),
        Ok("metadata") => Ok(Arc::new(MetadataUriResolver)),
        Ok(other) => Err(format!("unknown uri resolver `{other}`")),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("unix signal registration failed; falling back to ctrl_c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("LANDSCAPE_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let cfg = config_from_env();
    let discovery: Arc<dyn DiscoveryClient> = Arc::new(discovery_from_env()?);
    let transport = HttpTransport::new(&cfg.fetch)?;
    let collaborators = Collaborators {
        discovery,
        resolver: resolver_from_env()?,
        fetcher: Arc::new(transport),
        store: Arc::new(InMemoryNodeStore::new()),
    };

    let bind_addr = cfg.server.bind_addr.clone();
    let drain = cfg.server.shutdown_drain;
    let state = AppState::build(cfg, collaborators)?;
    info!(
        aggregators = ?state.retriever.aggregator_keys(),
        "aggregators enabled"
    );
    let app = build_router(state);

    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("invalid bind addr {bind_addr}: {e}"))?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4().map_err(|e| format!("socket v4 failed: {e}"))?
    } else {
        tokio::net::TcpSocket::new_v6().map_err(|e| format!("socket v6 failed: {e}"))?
    };
    socket
        .set_reuseaddr(true)
        .map_err(|e| format!("set_reuseaddr failed: {e}"))?;
    socket.bind(addr).map_err(|e| format!("bind failed: {e}"))?;
    let listener: TcpListener = socket
        .listen(1024)
        .map_err(|e| format!("listen failed: {e}"))?;
    info!("landscape-server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            info!(drain_ms = drain.as_millis() as u64, "shutdown requested");
            tokio::time::sleep(drain).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
