//! StatefulSet generation for the Redis nodes.
//!
//! Every pod runs Redis as a replica of the given master host. Sentinel
//! takes over master election once the bootstrap master is gone. The
//! exporter sidecar is added when `redis.exporter` is set.

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, ExecAction, PodSpec, PodTemplateSpec, Probe,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::crd::RedisFailover;
use crate::resources::common::{
    EXPORTER_CONTAINER, REDIS_COMPONENT, REDIS_CONTAINER, object_meta, redis_name,
    resource_requirements, selector_labels, standard_labels,
};
use crate::resources::services::EXPORTER_PORT;

/// Redis client port
const REDIS_PORT: i32 = 6379;

/// Generate the Redis StatefulSet.
///
/// `master_host` is the address every node starts replicating from. With no
/// master known the nodes start standalone.
pub fn generate_redis_statefulset(resource: &RedisFailover, master_host: Option<&str>) -> StatefulSet {
    let name = redis_name(resource);

    let mut containers = vec![generate_redis_container(resource, master_host)];
    if resource.spec.redis.exporter {
        containers.push(generate_exporter_container(resource));
    }

    StatefulSet {
        metadata: object_meta(resource, name.clone(), REDIS_COMPONENT),
        spec: Some(StatefulSetSpec {
            replicas: Some(resource.spec.redis.replicas),
            service_name: Some(name),
            selector: LabelSelector {
                match_labels: Some(selector_labels(resource, REDIS_COMPONENT)),
                ..Default::default()
            },
            pod_management_policy: Some("Parallel".to_string()),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(standard_labels(resource, REDIS_COMPONENT)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn generate_redis_container(resource: &RedisFailover, master_host: Option<&str>) -> Container {
    let redis = &resource.spec.redis;
    let script = "if [ -n \"$REDIS_MASTER_HOST\" ]; then \
                  exec redis-server --port 6379 --slaveof \"$REDIS_MASTER_HOST\" 6379; \
                  else exec redis-server --port 6379; fi";

    Container {
        name: REDIS_CONTAINER.to_string(),
        image: Some(format!("{}:{}", redis.image, redis.version)),
        command: Some(vec!["sh".to_string(), "-c".to_string(), script.to_string()]),
        env: master_host.map(|host| {
            vec![EnvVar {
                name: "REDIS_MASTER_HOST".to_string(),
                value: Some(host.to_string()),
                ..Default::default()
            }]
        }),
        ports: Some(vec![ContainerPort {
            container_port: REDIS_PORT,
            name: Some("redis".to_string()),
            ..Default::default()
        }]),
        resources: resource_requirements(&redis.resources),
        readiness_probe: Some(ping_probe()),
        liveness_probe: Some(Probe {
            initial_delay_seconds: Some(30),
            ..ping_probe()
        }),
        ..Default::default()
    }
}

fn generate_exporter_container(resource: &RedisFailover) -> Container {
    let redis = &resource.spec.redis;
    Container {
        name: EXPORTER_CONTAINER.to_string(),
        image: Some(format!(
            "{}:{}",
            redis.exporter_image, redis.exporter_version
        )),
        ports: Some(vec![ContainerPort {
            container_port: EXPORTER_PORT,
            name: Some("metrics".to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn ping_probe() -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec!["redis-cli".to_string(), "ping".to_string()]),
        }),
        initial_delay_seconds: Some(5),
        period_seconds: Some(10),
        timeout_seconds: Some(5),
        failure_threshold: Some(3),
        ..Default::default()
    }
}
