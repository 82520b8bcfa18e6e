//! Validation and defaulting for RedisFailover specs.
//!
//! Validation mutates the resource in place: zero replica counts and empty
//! image fields are replaced with defaults before the limits are checked.

use kube::ResourceExt;

use crate::controller::error::{Error, Result};
use crate::crd::RedisFailover;

/// Replica count used when the resource leaves it at zero
pub const DEFAULT_REPLICAS: i32 = 3;

/// Minimum number of Redis and Sentinel replicas
pub const MIN_REPLICAS: i32 = 3;

/// Longest accepted resource name, leaving room for the `rfr-`/`rfs-` prefixes
pub const MAX_NAME_LENGTH: usize = 48;

pub const DEFAULT_REDIS_IMAGE: &str = "redis";
pub const DEFAULT_REDIS_VERSION: &str = "3.2-alpine";
pub const DEFAULT_EXPORTER_IMAGE: &str = "oliver006/redis_exporter";
pub const DEFAULT_EXPORTER_VERSION: &str = "v0.11.3";

/// Fill defaults and validate the resource spec
pub fn validate_and_default(resource: &mut RedisFailover) -> Result<()> {
    validate_name_length(resource)?;
    apply_defaults(resource);
    validate_replicas("redis", resource.spec.redis.replicas)?;
    validate_replicas("sentinel", resource.spec.sentinel.replicas)?;
    Ok(())
}

fn validate_name_length(resource: &RedisFailover) -> Result<()> {
    let name = resource.name_any();
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "name '{}' exceeds maximum length of {} characters",
            name, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn apply_defaults(resource: &mut RedisFailover) {
    let redis = &mut resource.spec.redis;
    if redis.replicas == 0 {
        redis.replicas = DEFAULT_REPLICAS;
    }
    if redis.image.is_empty() {
        redis.image = DEFAULT_REDIS_IMAGE.to_string();
    }
    if redis.version.is_empty() {
        redis.version = DEFAULT_REDIS_VERSION.to_string();
    }
    if redis.exporter_image.is_empty() {
        redis.exporter_image = DEFAULT_EXPORTER_IMAGE.to_string();
    }
    if redis.exporter_version.is_empty() {
        redis.exporter_version = DEFAULT_EXPORTER_VERSION.to_string();
    }

    let sentinel = &mut resource.spec.sentinel;
    if sentinel.replicas == 0 {
        sentinel.replicas = DEFAULT_REPLICAS;
    }
}

fn validate_replicas(component: &str, replicas: i32) -> Result<()> {
    if replicas < MIN_REPLICAS {
        return Err(Error::Validation(format!(
            "{} replica count {} is below minimum {}",
            component, replicas, MIN_REPLICAS
        )));
    }
    Ok(())
}

/// How a sub-spec changed between two versions of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    /// Replica count grew
    ScaleUp { from: i32, to: i32 },
    /// Replica count shrank
    ScaleDown { from: i32, to: i32 },
    /// Same replica count, other settings differ
    Resources,
}

impl SettingsChange {
    /// Classify a change given the old and new replica counts
    pub fn classify(from: i32, to: i32) -> Self {
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => SettingsChange::ScaleUp { from, to },
            std::cmp::Ordering::Less => SettingsChange::ScaleDown { from, to },
            std::cmp::Ordering::Equal => SettingsChange::Resources,
        }
    }
}
