//! redis-failover-operator library crate
//!
//! Exports the RedisFailover CRD, the reconciliation engine and the
//! Kubernetes and Redis collaborators it is wired to.

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod provisioner;
pub mod resources;
pub mod transform;

pub use config::OperatorConfig;
pub use health::HealthState;

use std::future::Future;
use std::sync::Arc;

use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::info;

use client::FredRedisClient;
use controller::{Dispatcher, EventDriver, RedisFailoverChecker, RedisFailoverHandler};
use crd::RedisFailover;
use health::MetricsSink;
use provisioner::{KubeProvisioner, ResourceProvisioner};
use transform::ResourceTransformer;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Build the reconciliation handler with its production collaborators.
pub fn build_handler(
    client: Client,
    config: &OperatorConfig,
    metrics: Arc<dyn MetricsSink>,
) -> RedisFailoverHandler {
    let provisioner: Arc<dyn ResourceProvisioner> = Arc::new(KubeProvisioner::new(
        client,
        config.watch_namespace.clone(),
        config.ready_timeout(),
    ));
    let redis_client = Arc::new(
        FredRedisClient::new(Arc::clone(&metrics))
            .with_timeouts(config.redis_connect_timeout(), config.redis_command_timeout()),
    );
    let checker = Arc::new(
        RedisFailoverChecker::new(Arc::clone(&provisioner), redis_client, Arc::clone(&metrics))
            .with_reset_cooldown(config.sentinel_reset_cooldown()),
    );
    RedisFailoverHandler::new(
        provisioner,
        checker,
        Arc::new(ResourceTransformer),
        metrics,
    )
}

/// Run the operator until `shutdown` resolves.
///
/// Watches RedisFailovers in the configured scope and drives them through
/// the dispatcher; a health sweep runs every resync interval.
pub async fn run_operator<F>(
    client: Client,
    config: OperatorConfig,
    health_state: Arc<HealthState>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let scope = config.watch_namespace.as_deref().unwrap_or("cluster-wide");
    info!(
        scope = %scope,
        concurrency = config.concurrency,
        "Starting RedisFailover operator"
    );

    let metrics: Arc<dyn MetricsSink> = health_state.metrics.clone();
    let handler = Arc::new(build_handler(client.clone(), &config, metrics));
    let dispatcher = Dispatcher::new(handler, config.concurrency);

    let api: Api<RedisFailover> = scoped_api(client, config.watch_namespace.as_deref());
    let events = watcher(api, WatcherConfig::default().any_semantic()).default_backoff();

    health_state.set_ready(true).await;
    EventDriver::new(dispatcher, config.resync_interval())
        .run(events, shutdown)
        .await;
    health_state.set_ready(false).await;
}
