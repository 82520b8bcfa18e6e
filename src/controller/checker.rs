//! Live topology checks.
//!
//! Compares what is actually running against the declared RedisFailover:
//! provisioned replica counts, a single Redis master that every replica
//! follows, and Sentinels that agree on the size of their quorum. A
//! Sentinel that disagrees is reset, which is the only repair done here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use crate::client::RedisNodeClient;
use crate::controller::error::{Error, Result};
use crate::crd::RedisFailover;
use crate::health::MetricsSink;
use crate::provisioner::ResourceProvisioner;

/// Time given to a Sentinel to rediscover its peers after a reset
pub const DEFAULT_SENTINEL_RESET_COOLDOWN: Duration = Duration::from_secs(30);

/// Verifies the live topology of a RedisFailover.
#[async_trait]
pub trait TopologyChecker: Send + Sync {
    /// Fail with a description of the first mismatch found.
    async fn check(&self, rf: &RedisFailover) -> Result<()>;

    /// Address of the only Redis node in the master role.
    async fn get_master(&self, rf: &RedisFailover) -> Result<String>;
}

/// [`TopologyChecker`] querying nodes through a [`RedisNodeClient`].
///
/// All node queries run one after the other.
pub struct RedisFailoverChecker {
    provisioner: Arc<dyn ResourceProvisioner>,
    redis_client: Arc<dyn RedisNodeClient>,
    metrics: Arc<dyn MetricsSink>,
    reset_cooldown: Duration,
}

impl RedisFailoverChecker {
    pub fn new(
        provisioner: Arc<dyn ResourceProvisioner>,
        redis_client: Arc<dyn RedisNodeClient>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            provisioner,
            redis_client,
            metrics,
            reset_cooldown: DEFAULT_SENTINEL_RESET_COOLDOWN,
        }
    }

    pub fn with_reset_cooldown(mut self, cooldown: Duration) -> Self {
        self.reset_cooldown = cooldown;
        self
    }

    async fn check_replica_counts(&self, rf: &RedisFailover) -> Result<()> {
        if self.provisioner.get_redis_replicas(rf).await? != rf.spec.redis.replicas {
            return Err(Error::Topology("redis number mismatch".to_string()));
        }
        if self.provisioner.get_sentinel_replicas(rf).await? != rf.spec.sentinel.replicas {
            return Err(Error::Topology("sentinel number mismatch".to_string()));
        }
        Ok(())
    }

    async fn check_replicas_follow(&self, rf: &RedisFailover, master: &str) -> Result<()> {
        for ip in self.provisioner.get_redis_ips(rf).await? {
            let slave_of = self.redis_client.get_slave_of(&ip).await?;
            if !slave_of.is_empty() && slave_of != master {
                return Err(Error::Topology(format!(
                    "slave {} don't have the master {}, has {}",
                    ip, master, slave_of
                )));
            }
        }
        Ok(())
    }

    /// Reset every Sentinel whose peer count differs from the declared size.
    async fn check_sentinels(&self, rf: &RedisFailover) -> Result<()> {
        let expected = rf.spec.sentinel.replicas;
        for ip in self.provisioner.get_sentinel_ips(rf).await? {
            let known = match self.redis_client.get_number_sentinels_in_memory(&ip).await {
                Ok(known) => known,
                Err(e) => {
                    debug!(sentinel = %ip, error = %e, "Skipping sentinel that could not be queried");
                    continue;
                }
            };
            if known == expected {
                continue;
            }

            info!(
                name = %rf.name_any(),
                sentinel = %ip,
                known,
                expected,
                "Sentinel knows a different number of sentinels, resetting"
            );
            self.redis_client.reset_sentinel(&ip).await?;
            tokio::time::sleep(self.reset_cooldown).await;
        }
        Ok(())
    }
}

#[async_trait]
impl TopologyChecker for RedisFailoverChecker {
    async fn check(&self, rf: &RedisFailover) -> Result<()> {
        self.check_replica_counts(rf).await?;
        let master = self.get_master(rf).await?;
        self.check_replicas_follow(rf, &master).await?;
        self.check_sentinels(rf).await
    }

    async fn get_master(&self, rf: &RedisFailover) -> Result<String> {
        let mut masters = Vec::new();
        for ip in self.provisioner.get_redis_ips(rf).await? {
            if self.redis_client.is_master(&ip).await? {
                masters.push(ip);
            }
        }

        self.metrics.set_master_count(
            &rf.namespace().unwrap_or_default(),
            &rf.name_any(),
            masters.len() as i64,
        );

        match <[String; 1]>::try_from(masters) {
            Ok([master]) => Ok(master),
            Err(masters) => {
                warn!(
                    name = %rf.name_any(),
                    masters = ?masters,
                    "Unexpected number of redis masters"
                );
                Err(Error::Topology(
                    "number of redis nodes known as master is different than 1".to_string(),
                ))
            }
        }
    }
}
