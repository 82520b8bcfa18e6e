//! Deployment generation for the Sentinel quorum.
//!
//! Sentinel rewrites its configuration file at runtime, so the container
//! writes a fresh one to an emptyDir on start and then runs from it.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, ExecAction, PodSpec, PodTemplateSpec,
    Probe, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::crd::RedisFailover;
use crate::resources::common::{
    SENTINEL_COMPONENT, SENTINEL_CONTAINER, object_meta, resource_requirements, selector_labels,
    sentinel_name, standard_labels,
};
use crate::resources::services::SENTINEL_PORT;

/// Name of the master set monitored by the Sentinels
pub const MASTER_GROUP: &str = "mymaster";

const CONFIG_DIR: &str = "/redis";

/// Generate the Sentinel Deployment.
///
/// Sentinels start monitoring `master_host`; without one they monitor the
/// loopback address until a master is recorded.
pub fn generate_sentinel_deployment(resource: &RedisFailover, master_host: Option<&str>) -> Deployment {
    let sentinel = &resource.spec.sentinel;
    let redis = &resource.spec.redis;

    let script = format!(
        "printf 'port {port}\\nsentinel monitor {group} %s 6379 {quorum}\\n\
         sentinel down-after-milliseconds {group} 5000\\n\
         sentinel failover-timeout {group} 10000\\n\
         sentinel parallel-syncs {group} 2\\n' \"${{REDIS_MASTER_HOST:-127.0.0.1}}\" > {dir}/sentinel.conf && \
         exec redis-server {dir}/sentinel.conf --sentinel",
        port = SENTINEL_PORT,
        group = MASTER_GROUP,
        quorum = resource.quorum(),
        dir = CONFIG_DIR,
    );

    Deployment {
        metadata: object_meta(resource, sentinel_name(resource), SENTINEL_COMPONENT),
        spec: Some(DeploymentSpec {
            replicas: Some(sentinel.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(resource, SENTINEL_COMPONENT)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(standard_labels(resource, SENTINEL_COMPONENT)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: SENTINEL_CONTAINER.to_string(),
                        image: Some(format!("{}:{}", redis.image, redis.version)),
                        command: Some(vec!["sh".to_string(), "-c".to_string(), script]),
                        env: master_host.map(|host| {
                            vec![EnvVar {
                                name: "REDIS_MASTER_HOST".to_string(),
                                value: Some(host.to_string()),
                                ..Default::default()
                            }]
                        }),
                        ports: Some(vec![ContainerPort {
                            container_port: SENTINEL_PORT,
                            name: Some("sentinel".to_string()),
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: "sentinel-config".to_string(),
                            mount_path: CONFIG_DIR.to_string(),
                            ..Default::default()
                        }]),
                        resources: resource_requirements(&sentinel.resources),
                        readiness_probe: Some(Probe {
                            exec: Some(ExecAction {
                                command: Some(vec![
                                    "redis-cli".to_string(),
                                    "-p".to_string(),
                                    SENTINEL_PORT.to_string(),
                                    "ping".to_string(),
                                ]),
                            }),
                            initial_delay_seconds: Some(5),
                            period_seconds: Some(10),
                            timeout_seconds: Some(5),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: "sentinel-config".to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
