//! In-memory collaborators for exercising the controller without a cluster.
//!
//! Each mock keeps its state behind a `Mutex` so tests can seed it before a
//! call and inspect it afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, Service};
use redis_failover_operator::client::{RedisError, RedisNodeClient};
use redis_failover_operator::controller::TopologyChecker;
use redis_failover_operator::controller::error::{Error, Result};
use redis_failover_operator::controller::validation::validate_and_default;
use redis_failover_operator::crd::{RedisFailover, RedisFailoverStatus};
use redis_failover_operator::health::{EventKind, MetricsSink};
use redis_failover_operator::provisioner::ResourceProvisioner;
use redis_failover_operator::resources::deployment::generate_sentinel_deployment;
use redis_failover_operator::resources::statefulset::generate_redis_statefulset;

/// State behind [`MockProvisioner`].
#[derive(Default)]
pub struct ProvisionerState {
    pub bootstrap_pod: bool,
    pub sentinel_service: bool,
    pub sentinel_deployment: Option<Deployment>,
    pub redis_service: bool,
    pub redis_statefulset: Option<StatefulSet>,
    pub redis_ips: Vec<String>,
    pub sentinel_ips: Vec<String>,
    /// Clusters returned by `get_all_clusters`; status writes replace entries.
    pub clusters: Vec<RedisFailover>,
    /// Every persisted status, in order.
    pub status_updates: Vec<RedisFailoverStatus>,
    /// Names of mutating calls, in order.
    pub calls: Vec<String>,
    /// Calls that fail when invoked.
    pub fail_on: HashSet<String>,
}

/// [`ResourceProvisioner`] keeping objects in memory.
#[derive(Default)]
pub struct MockProvisioner {
    pub state: Mutex<ProvisionerState>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisioner already holding the objects generated for `rf`.
    pub fn provisioned(rf: &RedisFailover) -> Self {
        let mut rf = rf.clone();
        validate_and_default(&mut rf).unwrap();
        let rf = &rf;
        let mock = Self::new();
        {
            let mut state = mock.state.lock().unwrap();
            state.sentinel_service = true;
            state.sentinel_deployment = Some(generate_sentinel_deployment(rf, None));
            state.redis_statefulset = Some(generate_redis_statefulset(rf, None));
        }
        mock
    }

    pub fn fail_on(&self, call: &str) {
        self.state.lock().unwrap().fail_on.insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn status_updates(&self) -> Vec<RedisFailoverStatus> {
        self.state.lock().unwrap().status_updates.clone()
    }

    pub fn set_redis_ips(&self, ips: &[&str]) {
        self.state.lock().unwrap().redis_ips = ips.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_sentinel_ips(&self, ips: &[&str]) {
        self.state.lock().unwrap().sentinel_ips = ips.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_redis_replicas(&self, replicas: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.redis_statefulset.as_mut().and_then(|s| s.spec.as_mut()) {
            spec.replicas = Some(replicas);
        }
    }

    pub fn set_sentinel_replicas(&self, replicas: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.sentinel_deployment.as_mut().and_then(|d| d.spec.as_mut()) {
            spec.replicas = Some(replicas);
        }
    }

    /// Record a mutating call, failing it if requested.
    fn record(&self, call: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        if state.fail_on.contains(call) {
            return Err(Error::Provisioning(format!("{} failed", call)));
        }
        Ok(())
    }

    fn check_read(&self, call: &str) -> Result<()> {
        if self.state.lock().unwrap().fail_on.contains(call) {
            return Err(Error::Provisioning(format!("{} failed", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceProvisioner for MockProvisioner {
    async fn get_bootstrap_pod(&self, _rf: &RedisFailover) -> Result<Option<Pod>> {
        let exists = self.state.lock().unwrap().bootstrap_pod;
        Ok(exists.then(Pod::default))
    }

    async fn create_bootstrap_pod(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("create_bootstrap_pod")?;
        self.state.lock().unwrap().bootstrap_pod = true;
        Ok(())
    }

    async fn delete_bootstrap_pod(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("delete_bootstrap_pod")?;
        self.state.lock().unwrap().bootstrap_pod = false;
        Ok(())
    }

    async fn get_sentinel_service(&self, _rf: &RedisFailover) -> Result<Option<Service>> {
        let exists = self.state.lock().unwrap().sentinel_service;
        Ok(exists.then(Service::default))
    }

    async fn create_sentinel_service(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("create_sentinel_service")?;
        self.state.lock().unwrap().sentinel_service = true;
        Ok(())
    }

    async fn delete_sentinel_service(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("delete_sentinel_service")?;
        self.state.lock().unwrap().sentinel_service = false;
        Ok(())
    }

    async fn get_sentinel_deployment(&self, _rf: &RedisFailover) -> Result<Option<Deployment>> {
        self.check_read("get_sentinel_deployment")?;
        Ok(self.state.lock().unwrap().sentinel_deployment.clone())
    }

    async fn create_sentinel_deployment(&self, rf: &RedisFailover) -> Result<()> {
        self.record("create_sentinel_deployment")?;
        self.state.lock().unwrap().sentinel_deployment =
            Some(generate_sentinel_deployment(rf, None));
        Ok(())
    }

    async fn update_sentinel(&self, rf: &RedisFailover) -> Result<()> {
        self.record("update_sentinel")?;
        self.state.lock().unwrap().sentinel_deployment =
            Some(generate_sentinel_deployment(rf, None));
        Ok(())
    }

    async fn delete_sentinel_deployment(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("delete_sentinel_deployment")?;
        self.state.lock().unwrap().sentinel_deployment = None;
        Ok(())
    }

    async fn get_redis_service(&self, _rf: &RedisFailover) -> Result<Option<Service>> {
        let exists = self.state.lock().unwrap().redis_service;
        Ok(exists.then(Service::default))
    }

    async fn create_redis_service(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("create_redis_service")?;
        self.state.lock().unwrap().redis_service = true;
        Ok(())
    }

    async fn delete_redis_service(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("delete_redis_service")?;
        self.state.lock().unwrap().redis_service = false;
        Ok(())
    }

    async fn get_redis_statefulset(&self, _rf: &RedisFailover) -> Result<Option<StatefulSet>> {
        self.check_read("get_redis_statefulset")?;
        Ok(self.state.lock().unwrap().redis_statefulset.clone())
    }

    async fn create_redis_statefulset(&self, rf: &RedisFailover) -> Result<()> {
        self.record("create_redis_statefulset")?;
        self.state.lock().unwrap().redis_statefulset = Some(generate_redis_statefulset(rf, None));
        Ok(())
    }

    async fn update_redis(&self, rf: &RedisFailover) -> Result<()> {
        self.record("update_redis")?;
        self.state.lock().unwrap().redis_statefulset = Some(generate_redis_statefulset(rf, None));
        Ok(())
    }

    async fn delete_redis_statefulset(&self, _rf: &RedisFailover) -> Result<()> {
        self.record("delete_redis_statefulset")?;
        self.state.lock().unwrap().redis_statefulset = None;
        Ok(())
    }

    async fn get_redis_replicas(&self, _rf: &RedisFailover) -> Result<i32> {
        self.state
            .lock()
            .unwrap()
            .redis_statefulset
            .as_ref()
            .and_then(|s| s.spec.as_ref())
            .and_then(|s| s.replicas)
            .ok_or_else(|| Error::Provisioning("statefulset not found".to_string()))
    }

    async fn get_sentinel_replicas(&self, _rf: &RedisFailover) -> Result<i32> {
        self.state
            .lock()
            .unwrap()
            .sentinel_deployment
            .as_ref()
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.replicas)
            .ok_or_else(|| Error::Provisioning("deployment not found".to_string()))
    }

    async fn update_status(&self, rf: &RedisFailover) -> Result<RedisFailover> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on.contains("update_status") {
            return Err(Error::Provisioning("update_status failed".to_string()));
        }
        state
            .status_updates
            .push(rf.status.clone().unwrap_or_default());
        let identity = rf.identity();
        if let Some(stored) = state.clusters.iter_mut().find(|c| c.identity() == identity) {
            stored.status = rf.status.clone();
        }
        Ok(rf.clone())
    }

    async fn get_all_clusters(&self) -> Result<Vec<RedisFailover>> {
        self.check_read("get_all_clusters")?;
        Ok(self.state.lock().unwrap().clusters.clone())
    }

    async fn get_redis_ips(&self, _rf: &RedisFailover) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().redis_ips.clone())
    }

    async fn get_sentinel_ips(&self, _rf: &RedisFailover) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().sentinel_ips.clone())
    }
}

/// State behind [`MockRedisClient`].
#[derive(Default)]
pub struct RedisState {
    pub masters: HashSet<String>,
    pub slave_of: HashMap<String, String>,
    pub sentinel_counts: HashMap<String, i32>,
    /// Nodes whose every query fails.
    pub unreachable: HashSet<String>,
    /// Sentinels whose reset fails.
    pub reset_fails: HashSet<String>,
    /// Count a Sentinel reports after a successful reset.
    pub count_after_reset: Option<i32>,
    pub resets: Vec<String>,
    pub queries: Vec<String>,
}

/// [`RedisNodeClient`] answering from a fixed topology.
#[derive(Default)]
pub struct MockRedisClient {
    pub state: Mutex<RedisState>,
}

impl MockRedisClient {
    /// A healthy topology: the first IP is master, the rest follow it.
    pub fn healthy(redis_ips: &[&str], sentinel_ips: &[&str], sentinels: i32) -> Self {
        let mock = Self::default();
        {
            let mut state = mock.state.lock().unwrap();
            if let Some((master, replicas)) = redis_ips.split_first() {
                state.masters.insert(master.to_string());
                for replica in replicas {
                    state
                        .slave_of
                        .insert(replica.to_string(), master.to_string());
                }
            }
            for ip in sentinel_ips {
                state.sentinel_counts.insert(ip.to_string(), sentinels);
            }
        }
        mock
    }

    pub fn resets(&self) -> Vec<String> {
        self.state.lock().unwrap().resets.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    fn query(&self, operation: &str, ip: &str) -> std::result::Result<(), RedisError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(format!("{}:{}", operation, ip));
        if state.unreachable.contains(ip) {
            return Err(unreachable_error(ip));
        }
        Ok(())
    }
}

fn unreachable_error(ip: &str) -> RedisError {
    RedisError::Redis(fred::error::Error::new(
        fred::error::ErrorKind::IO,
        format!("connection to {} refused", ip),
    ))
}

#[async_trait]
impl RedisNodeClient for MockRedisClient {
    async fn is_master(&self, ip: &str) -> std::result::Result<bool, RedisError> {
        self.query("is_master", ip)?;
        Ok(self.state.lock().unwrap().masters.contains(ip))
    }

    async fn get_slave_of(&self, ip: &str) -> std::result::Result<String, RedisError> {
        self.query("get_slave_of", ip)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .slave_of
            .get(ip)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_number_sentinels_in_memory(
        &self,
        ip: &str,
    ) -> std::result::Result<i32, RedisError> {
        self.query("get_number_sentinels_in_memory", ip)?;
        self.state
            .lock()
            .unwrap()
            .sentinel_counts
            .get(ip)
            .copied()
            .ok_or_else(|| RedisError::SentinelNotReady(ip.to_string()))
    }

    async fn reset_sentinel(&self, ip: &str) -> std::result::Result<(), RedisError> {
        self.query("reset_sentinel", ip)?;
        let mut state = self.state.lock().unwrap();
        state.resets.push(ip.to_string());
        if state.reset_fails.contains(ip) {
            return Err(unreachable_error(ip));
        }
        if let Some(count) = state.count_after_reset {
            state.sentinel_counts.insert(ip.to_string(), count);
        }
        Ok(())
    }
}

/// State behind [`MockChecker`].
pub struct CheckerState {
    pub check: std::result::Result<(), String>,
    pub master: std::result::Result<String, String>,
    pub check_calls: usize,
}

/// [`TopologyChecker`] with canned answers.
pub struct MockChecker {
    pub state: Mutex<CheckerState>,
}

impl MockChecker {
    pub fn healthy(master: &str) -> Self {
        Self {
            state: Mutex::new(CheckerState {
                check: Ok(()),
                master: Ok(master.to_string()),
                check_calls: 0,
            }),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            state: Mutex::new(CheckerState {
                check: Err(message.to_string()),
                master: Err(message.to_string()),
                check_calls: 0,
            }),
        }
    }

    pub fn check_calls(&self) -> usize {
        self.state.lock().unwrap().check_calls
    }
}

#[async_trait]
impl TopologyChecker for MockChecker {
    async fn check(&self, _rf: &RedisFailover) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check_calls += 1;
        state.check.clone().map_err(Error::Topology)
    }

    async fn get_master(&self, _rf: &RedisFailover) -> Result<String> {
        self.state.lock().unwrap().master.clone().map_err(Error::Topology)
    }
}

/// Everything reported to [`RecordingMetrics`].
#[derive(Default, Clone)]
pub struct MetricsRecord {
    pub cluster_counts: Option<(i64, i64, i64)>,
    pub master_counts: HashMap<(String, String), i64>,
    pub events: Vec<EventKind>,
    /// `(namespace, name)` of each recorded event, in order.
    pub event_clusters: Vec<(String, String)>,
    pub operations: Vec<(String, String, bool)>,
}

/// [`MetricsSink`] that remembers what it was told.
#[derive(Default)]
pub struct RecordingMetrics {
    pub record: Mutex<MetricsRecord>,
}

impl RecordingMetrics {
    pub fn snapshot(&self) -> MetricsRecord {
        self.record.lock().unwrap().clone()
    }

    pub fn master_count(&self, namespace: &str, name: &str) -> Option<i64> {
        self.record
            .lock()
            .unwrap()
            .master_counts
            .get(&(namespace.to_string(), name.to_string()))
            .copied()
    }
}

impl MetricsSink for RecordingMetrics {
    fn set_cluster_counts(&self, creating: i64, running: i64, failed: i64) {
        self.record.lock().unwrap().cluster_counts = Some((creating, running, failed));
    }

    fn set_master_count(&self, namespace: &str, name: &str, count: i64) {
        self.record
            .lock()
            .unwrap()
            .master_counts
            .insert((namespace.to_string(), name.to_string()), count);
    }

    fn record_event(&self, kind: EventKind, namespace: &str, name: &str) {
        let mut record = self.record.lock().unwrap();
        record.events.push(kind);
        record
            .event_clusters
            .push((namespace.to_string(), name.to_string()));
    }

    fn record_redis_operation(&self, kind: &str, operation: &str, success: bool) {
        self.record.lock().unwrap().operations.push((
            kind.to_string(),
            operation.to_string(),
            success,
        ));
    }
}
