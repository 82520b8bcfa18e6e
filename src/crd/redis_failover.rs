//! RedisFailover Custom Resource Definition.
//!
//! A RedisFailover declares a Redis primary/replica set (a StatefulSet) that
//! is monitored by a quorum of Sentinels (a Deployment). The operator creates
//! both and keeps checking that the live topology matches the declaration.

use std::sync::OnceLock;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// RedisFailover is a custom resource for Redis with Sentinel failover.
///
/// Example:
/// ```yaml
/// apiVersion: storage.spotahome.com/v1alpha2
/// kind: RedisFailover
/// metadata:
///   name: cache
/// spec:
///   redis:
///     replicas: 3
///     exporter: true
///     resources:
///       requests:
///         cpu: 100m
///         memory: 100Mi
///   sentinel:
///     replicas: 3
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "storage.spotahome.com",
    version = "v1alpha2",
    kind = "RedisFailover",
    plural = "redisfailovers",
    shortname = "rf",
    status = "RedisFailoverStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Redis", "type":"integer", "jsonPath":".spec.redis.replicas"}"#,
    printcolumn = r#"{"name":"Sentinels", "type":"integer", "jsonPath":".spec.sentinel.replicas"}"#,
    printcolumn = r#"{"name":"Master", "type":"string", "jsonPath":".status.master"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RedisFailoverSpec {
    /// Redis primary/replica settings.
    #[serde(default)]
    pub redis: RedisSettings,

    /// Sentinel quorum settings.
    #[serde(default)]
    pub sentinel: SentinelSettings,

    /// Sentinel quorum, computed on first use and pinned for this instance.
    #[serde(skip)]
    #[schemars(skip)]
    pub quorum: QuorumCache,
}

/// Settings of the Redis StatefulSet.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedisSettings {
    /// Number of Redis pods. Zero means "use the default of 3".
    #[serde(default)]
    pub replicas: i32,

    /// CPU and memory requests/limits for the Redis container.
    #[serde(default)]
    pub resources: ResourcesSpec,

    /// Run a Prometheus exporter sidecar next to every Redis container.
    #[serde(default)]
    pub exporter: bool,

    /// Exporter image repository.
    #[serde(default)]
    pub exporter_image: String,

    /// Exporter image tag.
    #[serde(default)]
    pub exporter_version: String,

    /// Redis image repository.
    #[serde(default)]
    pub image: String,

    /// Redis image tag.
    #[serde(default)]
    pub version: String,
}

/// Settings of the Sentinel Deployment.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SentinelSettings {
    /// Number of Sentinel pods. Zero means "use the default of 3".
    #[serde(default)]
    pub replicas: i32,

    /// CPU and memory requests/limits for the Sentinel container.
    #[serde(default)]
    pub resources: ResourcesSpec,
}

/// Resource requests and limits.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourcesSpec {
    #[serde(default)]
    pub requests: CpuAndMem,
    #[serde(default)]
    pub limits: CpuAndMem,
}

/// A CPU and memory quantity pair. Empty strings leave the quantity unset.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CpuAndMem {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
}

/// Write-once holder for the quorum value.
///
/// Never serialized and always equal to any other cache, so it does not take
/// part in spec comparisons.
#[derive(Clone, Debug, Default)]
pub struct QuorumCache(OnceLock<i32>);

impl QuorumCache {
    /// The pinned value, if it has been computed.
    pub fn get(&self) -> Option<i32> {
        self.0.get().copied()
    }
}

impl PartialEq for QuorumCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl RedisFailover {
    /// Number of Sentinels that must agree on a failover.
    ///
    /// `sentinel.replicas / 2 + 1`, computed the first time it is asked for
    /// and returned unchanged afterwards.
    pub fn quorum(&self) -> i32 {
        *self
            .spec
            .quorum
            .0
            .get_or_init(|| self.spec.sentinel.replicas / 2 + 1)
    }

    /// Lock key used to serialize work on this cluster: `<namespace>-<name>`.
    pub fn identity(&self) -> String {
        format!("{}-{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Current phase, `None` when no status has been written yet.
    pub fn phase(&self) -> Phase {
        self.status
            .as_ref()
            .map(|status| status.phase)
            .unwrap_or_default()
    }

    /// Mutable access to the status, creating an empty one if needed.
    pub fn status_mut(&mut self) -> &mut RedisFailoverStatus {
        self.status.get_or_insert_with(RedisFailoverStatus::default)
    }
}

/// Observed state of a RedisFailover.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedisFailoverStatus {
    /// Lifecycle phase.
    #[serde(default)]
    pub phase: Phase,

    /// Most recent conditions, oldest first. Holds at most ten entries.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Address of the Redis master last seen by the operator.
    #[serde(default)]
    pub master: String,
}

/// Lifecycle phase of a RedisFailover.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Phase {
    /// Not handled yet.
    #[default]
    None,
    /// Platform objects are being created.
    Creating,
    /// All objects were created and the cluster is being watched.
    Running,
    /// Creation failed and requires intervention.
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::None => write!(f, "None"),
            Phase::Creating => write!(f, "Creating"),
            Phase::Running => write!(f, "Running"),
            Phase::Failed => write!(f, "Failed"),
        }
    }
}

/// A single entry of the condition history.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: ConditionType,
    #[serde(default)]
    pub reason: String,
    /// RFC 3339 timestamp of when the condition was recorded.
    #[serde(default)]
    pub transition_time: String,
}

/// Kinds of conditions recorded on a RedisFailover.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    Ready,
    NotReady,
    Recovering,
    UpdatingRedis,
    UpdatingSentinel,
    ScalingRedisUp,
    ScalingRedisDown,
    ScalingSentinelUp,
    ScalingSentinelDown,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Ready => write!(f, "Ready"),
            ConditionType::NotReady => write!(f, "NotReady"),
            ConditionType::Recovering => write!(f, "Recovering"),
            ConditionType::UpdatingRedis => write!(f, "UpdatingRedis"),
            ConditionType::UpdatingSentinel => write!(f, "UpdatingSentinel"),
            ConditionType::ScalingRedisUp => write!(f, "ScalingRedisUp"),
            ConditionType::ScalingRedisDown => write!(f, "ScalingRedisDown"),
            ConditionType::ScalingSentinelUp => write!(f, "ScalingSentinelUp"),
            ConditionType::ScalingSentinelDown => write!(f, "ScalingSentinelDown"),
        }
    }
}
