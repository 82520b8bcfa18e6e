//! Test fixtures and builder patterns for RedisFailover.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use redis_failover_operator::crd::{
    ConditionType, CpuAndMem, Phase, RedisFailover, RedisFailoverSpec, RedisFailoverStatus,
    RedisSettings, ResourcesSpec, SentinelSettings,
};

/// Builder for creating RedisFailover test fixtures.
///
/// # Example
/// ```ignore
/// let rf = RedisFailoverBuilder::new("cache")
///     .namespace("prod")
///     .redis_replicas(5)
///     .phase(Phase::Running)
///     .ready()
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct RedisFailoverBuilder {
    name: String,
    namespace: String,
    redis_replicas: i32,
    sentinel_replicas: i32,
    exporter: bool,
    redis_cpu_limit: String,
    phase: Option<Phase>,
    conditions: Vec<ConditionType>,
    master: String,
    uid: Option<String>,
}

impl RedisFailoverBuilder {
    /// Create a new builder with the given resource name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            redis_replicas: 3,
            sentinel_replicas: 3,
            exporter: false,
            redis_cpu_limit: String::new(),
            phase: None,
            conditions: Vec::new(),
            master: String::new(),
            uid: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn redis_replicas(mut self, replicas: i32) -> Self {
        self.redis_replicas = replicas;
        self
    }

    pub fn sentinel_replicas(mut self, replicas: i32) -> Self {
        self.sentinel_replicas = replicas;
        self
    }

    pub fn exporter(mut self, exporter: bool) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn redis_cpu_limit(mut self, cpu: impl Into<String>) -> Self {
        self.redis_cpu_limit = cpu.into();
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn condition(mut self, condition_type: ConditionType) -> Self {
        self.conditions.push(condition_type);
        self
    }

    /// Shortcut for a trailing Ready condition.
    pub fn ready(self) -> Self {
        self.condition(ConditionType::Ready)
    }

    pub fn master(mut self, master: impl Into<String>) -> Self {
        self.master = master.into();
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Build the RedisFailover.
    pub fn build(self) -> RedisFailover {
        let has_status =
            self.phase.is_some() || !self.conditions.is_empty() || !self.master.is_empty();
        let status = has_status.then(|| {
            let mut status = RedisFailoverStatus {
                phase: self.phase.unwrap_or_default(),
                master: self.master.clone(),
                ..Default::default()
            };
            for condition in &self.conditions {
                match condition {
                    ConditionType::Ready => status.set_ready_condition(),
                    ConditionType::NotReady => status.set_not_ready_condition(),
                    ConditionType::UpdatingRedis => status.append_updating_redis_condition(""),
                    ConditionType::UpdatingSentinel => {
                        status.append_updating_sentinel_condition("")
                    }
                    ConditionType::ScalingRedisUp => status.append_scaling_redis_up_condition(0, 0),
                    ConditionType::ScalingRedisDown => {
                        status.append_scaling_redis_down_condition(0, 0)
                    }
                    ConditionType::ScalingSentinelUp => {
                        status.append_scaling_sentinel_up_condition(0, 0)
                    }
                    ConditionType::ScalingSentinelDown => {
                        status.append_scaling_sentinel_down_condition(0, 0)
                    }
                    ConditionType::Recovering => {}
                }
            }
            status
        });

        RedisFailover {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                uid: self.uid,
                ..Default::default()
            },
            spec: RedisFailoverSpec {
                redis: RedisSettings {
                    replicas: self.redis_replicas,
                    exporter: self.exporter,
                    resources: ResourcesSpec {
                        limits: CpuAndMem {
                            cpu: self.redis_cpu_limit,
                            memory: String::new(),
                        },
                        ..Default::default()
                    },
                    ..Default::default()
                },
                sentinel: SentinelSettings {
                    replicas: self.sentinel_replicas,
                    ..Default::default()
                },
                ..Default::default()
            },
            status,
        }
    }
}

/// A RedisFailover that has been created and reported Ready.
pub fn running_failover(name: &str) -> RedisFailover {
    RedisFailoverBuilder::new(name)
        .phase(Phase::Running)
        .condition(ConditionType::NotReady)
        .ready()
        .master("10.0.0.1")
        .build()
}
