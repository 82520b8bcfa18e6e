//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the event driver runs)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Kind of watch event handed to the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

/// Destination for the operator's measurements.
pub trait MetricsSink: Send + Sync {
    /// Number of clusters per health bucket seen by the last sweep
    fn set_cluster_counts(&self, creating: i64, running: i64, failed: i64);

    /// Number of Redis nodes reporting the master role for one cluster
    fn set_master_count(&self, namespace: &str, name: &str, count: i64);

    /// A watch event was handled for one cluster
    fn record_event(&self, kind: EventKind, namespace: &str, name: &str);

    /// A Redis or Sentinel node was queried
    fn record_redis_operation(&self, kind: &str, operation: &str, success: bool);
}

/// Labels identifying one RedisFailover (namespace + name)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ClusterLabels {
    pub namespace: String,
    pub name: String,
}

impl EncodeLabelSet for ClusterLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for health-bucket metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct StateLabels {
    pub state: String,
}

impl EncodeLabelSet for StateLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("state", self.state.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for watch event counters
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct EventLabels {
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

impl EncodeLabelSet for EventLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for node query counters
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OperationLabels {
    pub kind: String,
    pub operation: String,
    pub status: String,
}

impl EncodeLabelSet for OperationLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("operation", self.operation.as_str()).encode(encoder.encode_label())?;
        ("status", self.status.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the operator
pub struct Metrics {
    /// Clusters per health bucket
    pub clusters: Family<StateLabels, Gauge>,
    /// Redis nodes reporting the master role, per cluster
    pub cluster_masters: Family<ClusterLabels, Gauge>,
    /// Handled watch events
    pub events_total: Family<EventLabels, Counter>,
    /// Redis and Sentinel queries
    pub redis_operations_total: Family<OperationLabels, Counter>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let clusters = Family::<StateLabels, Gauge>::default();
        registry.register(
            "redisoperator_clusters",
            "Number of RedisFailover clusters by state",
            clusters.clone(),
        );

        let cluster_masters = Family::<ClusterLabels, Gauge>::default();
        registry.register(
            "redisoperator_cluster_masters",
            "Number of Redis nodes known as master",
            cluster_masters.clone(),
        );

        let events_total = Family::<EventLabels, Counter>::default();
        registry.register(
            "redisoperator_events",
            "Total number of handled RedisFailover events",
            events_total.clone(),
        );

        let redis_operations_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "redisoperator_redis_operations",
            "Total number of Redis and Sentinel queries",
            redis_operations_total.clone(),
        );

        Self {
            clusters,
            cluster_masters,
            events_total,
            redis_operations_total,
            registry,
        }
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

impl MetricsSink for Metrics {
    fn set_cluster_counts(&self, creating: i64, running: i64, failed: i64) {
        for (state, count) in [
            ("creating", creating),
            ("running", running),
            ("failed", failed),
        ] {
            let labels = StateLabels {
                state: state.to_string(),
            };
            self.clusters.get_or_create(&labels).set(count);
        }
    }

    fn set_master_count(&self, namespace: &str, name: &str, count: i64) {
        let labels = ClusterLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.cluster_masters.get_or_create(&labels).set(count);
    }

    fn record_event(&self, kind: EventKind, namespace: &str, name: &str) {
        let labels = EventLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: kind.as_str().to_string(),
        };
        self.events_total.get_or_create(&labels).inc();
    }

    fn record_redis_operation(&self, kind: &str, operation: &str, success: bool) {
        let labels = OperationLabels {
            kind: kind.to_string(),
            operation: operation.to_string(),
            status: if success { "success" } else { "failure" }.to_string(),
        };
        self.redis_operations_total.get_or_create(&labels).inc();
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the operator is ready (event driver running)
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Mark the operator as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Returns 503 until the event driver has started.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server on `0.0.0.0:<port>`
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
