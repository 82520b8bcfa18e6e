//! Translation of live platform objects back into declared settings.
//!
//! The controller uses this when it resumes a running cluster: the live
//! StatefulSet and Deployment are read back into `RedisSettings` and
//! `SentinelSettings` so they can be compared with the declared spec.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Container, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

use crate::controller::error::{Error, Result};
use crate::crd::{CpuAndMem, RedisSettings, ResourcesSpec, SentinelSettings};
use crate::resources::common::{EXPORTER_CONTAINER, REDIS_CONTAINER, SENTINEL_CONTAINER};

/// Reads declared settings back out of generated objects.
pub trait SpecTransformer: Send + Sync {
    fn redis_settings(&self, statefulset: &StatefulSet) -> Result<RedisSettings>;
    fn sentinel_settings(&self, deployment: &Deployment) -> Result<SentinelSettings>;
}

/// [`SpecTransformer`] for the objects built by [`crate::resources`].
#[derive(Clone, Debug, Default)]
pub struct ResourceTransformer;

impl SpecTransformer for ResourceTransformer {
    fn redis_settings(&self, statefulset: &StatefulSet) -> Result<RedisSettings> {
        let spec = statefulset
            .spec
            .as_ref()
            .ok_or_else(|| Error::Transform("statefulset has no spec".to_string()))?;
        let pod = pod_spec(spec.template.spec.as_ref())?;
        let redis = find_container(pod, REDIS_CONTAINER)?;
        let (image, version) = split_image(redis)?;

        let mut settings = RedisSettings {
            replicas: spec.replicas.unwrap_or(1),
            resources: resources_spec(redis.resources.as_ref()),
            image,
            version,
            ..Default::default()
        };

        if let Some(exporter) = pod.containers.iter().find(|c| c.name == EXPORTER_CONTAINER) {
            let (image, version) = split_image(exporter)?;
            settings.exporter = true;
            settings.exporter_image = image;
            settings.exporter_version = version;
        }

        Ok(settings)
    }

    fn sentinel_settings(&self, deployment: &Deployment) -> Result<SentinelSettings> {
        let spec = deployment
            .spec
            .as_ref()
            .ok_or_else(|| Error::Transform("deployment has no spec".to_string()))?;
        let pod = pod_spec(spec.template.spec.as_ref())?;
        let sentinel = find_container(pod, SENTINEL_CONTAINER)?;

        Ok(SentinelSettings {
            replicas: spec.replicas.unwrap_or(1),
            resources: resources_spec(sentinel.resources.as_ref()),
        })
    }
}

fn pod_spec(spec: Option<&PodSpec>) -> Result<&PodSpec> {
    spec.ok_or_else(|| Error::Transform("pod template has no spec".to_string()))
}

fn find_container<'a>(pod: &'a PodSpec, name: &str) -> Result<&'a Container> {
    pod.containers
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| Error::Transform(format!("container '{}' not found", name)))
}

/// Split `repository:tag` at the last colon, so registry ports stay in the repository.
fn split_image(container: &Container) -> Result<(String, String)> {
    let image = container
        .image
        .as_deref()
        .ok_or_else(|| Error::Transform(format!("container '{}' has no image", container.name)))?;
    match image.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => {
            Ok((repository.to_string(), tag.to_string()))
        }
        _ => Ok((image.to_string(), String::new())),
    }
}

fn resources_spec(requirements: Option<&ResourceRequirements>) -> ResourcesSpec {
    let Some(requirements) = requirements else {
        return ResourcesSpec::default();
    };
    ResourcesSpec {
        requests: cpu_and_mem(requirements.requests.as_ref()),
        limits: cpu_and_mem(requirements.limits.as_ref()),
    }
}

fn cpu_and_mem(values: Option<&BTreeMap<String, Quantity>>) -> CpuAndMem {
    let get = |key: &str| {
        values
            .and_then(|map| map.get(key))
            .map(|q| q.0.clone())
            .unwrap_or_default()
    };
    CpuAndMem {
        cpu: get("cpu"),
        memory: get("memory"),
    }
}
