//! Service generation for RedisFailover clusters.
//!
//! Creates two services:
//! - Sentinel service: ClusterIP service clients use to discover the master
//! - Redis service: headless service exposing the exporter sidecars for scraping

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::RedisFailover;
use crate::resources::common::{
    REDIS_COMPONENT, SENTINEL_COMPONENT, object_meta, redis_name, selector_labels, sentinel_name,
};

/// Sentinel port
pub const SENTINEL_PORT: i32 = 26379;
/// Exporter metrics port
pub const EXPORTER_PORT: i32 = 9121;

/// Generate the Sentinel service.
pub fn generate_sentinel_service(resource: &RedisFailover) -> Service {
    Service {
        metadata: object_meta(resource, sentinel_name(resource), SENTINEL_COMPONENT),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(resource, SENTINEL_COMPONENT)),
            ports: Some(vec![ServicePort {
                name: Some("sentinel".to_string()),
                port: SENTINEL_PORT,
                target_port: Some(IntOrString::Int(SENTINEL_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the Redis exporter service.
///
/// Only created when the exporter is enabled; annotated for Prometheus
/// scraping.
pub fn generate_redis_service(resource: &RedisFailover) -> Service {
    let mut metadata = object_meta(resource, redis_name(resource), REDIS_COMPONENT);
    let mut annotations = BTreeMap::new();
    annotations.insert("prometheus.io/scrape".to_string(), "true".to_string());
    annotations.insert("prometheus.io/port".to_string(), EXPORTER_PORT.to_string());
    annotations.insert("prometheus.io/path".to_string(), "/metrics".to_string());
    metadata.annotations = Some(annotations);

    Service {
        metadata,
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(selector_labels(resource, REDIS_COMPONENT)),
            ports: Some(vec![ServicePort {
                name: Some("metrics".to_string()),
                port: EXPORTER_PORT,
                target_port: Some(IntOrString::Int(EXPORTER_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
