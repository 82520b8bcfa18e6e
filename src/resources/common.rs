//! Common resource generation utilities.
//!
//! Naming, labels, owner references and resource requirements shared by
//! every object generated for a RedisFailover.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::crd::{CpuAndMem, RedisFailover, ResourcesSpec};

/// Component label value for Redis pods
pub const REDIS_COMPONENT: &str = "redis";
/// Component label value for Sentinel pods
pub const SENTINEL_COMPONENT: &str = "sentinel";
/// Component label value for the bootstrap pod
pub const BOOTSTRAP_COMPONENT: &str = "bootstrap";

/// Name of the Redis container
pub const REDIS_CONTAINER: &str = "redis";
/// Name of the exporter sidecar
pub const EXPORTER_CONTAINER: &str = "redis-exporter";
/// Name of the Sentinel container
pub const SENTINEL_CONTAINER: &str = "sentinel";

/// Name of the Redis StatefulSet and Service
pub fn redis_name(resource: &RedisFailover) -> String {
    format!("rfr-{}", resource.name_any())
}

/// Name of the Sentinel Deployment and Service
pub fn sentinel_name(resource: &RedisFailover) -> String {
    format!("rfs-{}", resource.name_any())
}

/// Name of the bootstrap pod
pub fn bootstrap_name(resource: &RedisFailover) -> String {
    format!("rfb-{}", resource.name_any())
}

/// Labels selecting the pods of one component of a RedisFailover
pub fn selector_labels(resource: &RedisFailover, component: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/name".to_string(),
        "redis-failover".to_string(),
    );
    labels.insert("app.kubernetes.io/instance".to_string(), resource.name_any());
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        component.to_string(),
    );
    labels
}

/// Standard labels applied to all managed resources
pub fn standard_labels(resource: &RedisFailover, component: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(resource, component);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "redis-failover-operator".to_string(),
    );
    labels
}

/// `key=value,...` form of [`selector_labels`] for list calls
pub fn label_selector(resource: &RedisFailover, component: &str) -> String {
    selector_labels(resource, component)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Metadata for an object owned by the RedisFailover
pub fn object_meta(resource: &RedisFailover, name: String, component: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: resource.namespace(),
        labels: Some(standard_labels(resource, component)),
        owner_references: resource.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    }
}

/// Convert declared requests/limits into container resource requirements.
///
/// Empty quantities are omitted.
pub fn resource_requirements(resources: &ResourcesSpec) -> Option<ResourceRequirements> {
    let requests = quantities(&resources.requests);
    let limits = quantities(&resources.limits);
    if requests.is_none() && limits.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        requests,
        limits,
        ..Default::default()
    })
}

fn quantities(values: &CpuAndMem) -> Option<BTreeMap<String, Quantity>> {
    let mut map = BTreeMap::new();
    if !values.cpu.is_empty() {
        map.insert("cpu".to_string(), Quantity(values.cpu.clone()));
    }
    if !values.memory.is_empty() {
        map.insert("memory".to_string(), Quantity(values.memory.clone()));
    }
    if map.is_empty() { None } else { Some(map) }
}
