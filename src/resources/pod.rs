//! Bootstrap pod generation.
//!
//! The bootstrap pod is a standalone Redis master that Sentinels and Redis
//! replicas attach to while the cluster is first created. Once the
//! StatefulSet is up the pod is deleted and Sentinel promotes one of the
//! replicas.

use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec};

use crate::crd::RedisFailover;
use crate::resources::common::{
    BOOTSTRAP_COMPONENT, REDIS_CONTAINER, bootstrap_name, object_meta, resource_requirements,
};

/// Generate the bootstrap pod for a RedisFailover.
pub fn generate_bootstrap_pod(resource: &RedisFailover) -> Pod {
    let redis = &resource.spec.redis;
    Pod {
        metadata: object_meta(resource, bootstrap_name(resource), BOOTSTRAP_COMPONENT),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: REDIS_CONTAINER.to_string(),
                image: Some(format!("{}:{}", redis.image, redis.version)),
                command: Some(vec![
                    "redis-server".to_string(),
                    "--port".to_string(),
                    "6379".to_string(),
                ]),
                ports: Some(vec![ContainerPort {
                    container_port: 6379,
                    name: Some("redis".to_string()),
                    ..Default::default()
                }]),
                resources: resource_requirements(&redis.resources),
                ..Default::default()
            }],
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
