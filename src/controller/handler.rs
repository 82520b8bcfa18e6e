//! Reconciliation of RedisFailover events.
//!
//! [`RedisFailoverHandler`] turns add, update and delete events into
//! provisioning calls and status updates, and runs the periodic health
//! sweep. Entry points never return errors: every failure is logged and,
//! where it matters, recorded in the resource status.

use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, error, info, warn};

use crate::controller::checker::TopologyChecker;
use crate::controller::error::{Error, Result};
use crate::controller::status::RESOURCES_CHANGED_REASON;
use crate::controller::validation::{SettingsChange, validate_and_default};
use crate::crd::{Phase, RedisFailover, RedisFailoverSpec};
use crate::health::{EventKind, MetricsSink};
use crate::provisioner::ResourceProvisioner;
use crate::transform::SpecTransformer;

/// Health bucket a cluster falls into during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterHealth {
    /// Not yet Running with a trailing Ready condition
    Creating,
    /// Checked and healthy
    Running,
    /// Checked and found wrong
    Failed,
}

/// Per-bucket totals of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub creating: i64,
    pub running: i64,
    pub failed: i64,
}

impl SweepCounts {
    pub fn record(&mut self, health: ClusterHealth) {
        match health {
            ClusterHealth::Creating => self.creating += 1,
            ClusterHealth::Running => self.running += 1,
            ClusterHealth::Failed => self.failed += 1,
        }
    }
}

/// Reconciliation entry points, as driven by the dispatcher.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    async fn on_add(&self, rf: RedisFailover);
    async fn on_update(&self, old: RedisFailover, new: RedisFailover);
    async fn on_delete(&self, rf: RedisFailover);
    async fn list_clusters(&self) -> Result<Vec<RedisFailover>>;
    async fn check_cluster(&self, rf: RedisFailover) -> ClusterHealth;
    fn report_cluster_counts(&self, counts: SweepCounts);
}

/// Controller for RedisFailover resources.
pub struct RedisFailoverHandler {
    provisioner: Arc<dyn ResourceProvisioner>,
    checker: Arc<dyn TopologyChecker>,
    transformer: Arc<dyn SpecTransformer>,
    metrics: Arc<dyn MetricsSink>,
}

impl RedisFailoverHandler {
    pub fn new(
        provisioner: Arc<dyn ResourceProvisioner>,
        checker: Arc<dyn TopologyChecker>,
        transformer: Arc<dyn SpecTransformer>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            provisioner,
            checker,
            transformer,
            metrics,
        }
    }

    /// Run a full sweep sequentially: check every cluster, then report.
    pub async fn on_status(&self) {
        let clusters = match self.list_clusters().await {
            Ok(clusters) => clusters,
            Err(e) => {
                error!(error = %e, "Failed to list RedisFailovers");
                return;
            }
        };
        let mut counts = SweepCounts::default();
        for rf in clusters {
            counts.record(self.check_cluster(rf).await);
        }
        self.report_cluster_counts(counts);
    }

    async fn persist_status(&self, rf: &RedisFailover) -> Result<()> {
        self.provisioner.update_status(rf).await.map(|_| ())
    }

    /// Persist the status, logging instead of failing.
    async fn persist_status_logged(&self, rf: &RedisFailover) {
        if let Err(e) = self.persist_status(rf).await {
            error!(
                name = %rf.name_any(),
                namespace = %rf.namespace().unwrap_or_default(),
                error = %e,
                "Failed to update status"
            );
        }
    }

    async fn create(&self, mut rf: RedisFailover) {
        let name = rf.name_any();
        let namespace = rf.namespace().unwrap_or_default();

        rf.status_mut().set_phase(Phase::Creating);
        rf.status_mut().set_not_ready_condition();
        if let Err(e) = self.persist_status(&rf).await {
            error!(name = %name, namespace = %namespace, error = %e, "Failed to update status, aborting creation");
            return;
        }

        if let Err(e) = self.ensure_resources(&rf).await {
            error!(name = %name, namespace = %namespace, error = %e, "Failed to create RedisFailover");
            rf.status_mut().set_phase(Phase::Failed);
            self.persist_status_logged(&rf).await;
            return;
        }

        rf.status_mut().set_phase(Phase::Running);
        rf.status_mut().set_ready_condition();
        self.persist_status_logged(&rf).await;
        info!(name = %name, namespace = %namespace, "RedisFailover created");
    }

    /// Create every missing object, then drop the bootstrap pod.
    async fn ensure_resources(&self, rf: &RedisFailover) -> Result<()> {
        let p = &self.provisioner;

        let sentinel_exists = p.get_sentinel_deployment(rf).await?.is_some();
        let redis_exists = p.get_redis_statefulset(rf).await?.is_some();
        if !sentinel_exists && !redis_exists && p.get_bootstrap_pod(rf).await?.is_none() {
            p.create_bootstrap_pod(rf).await?;
        }

        if p.get_sentinel_service(rf).await?.is_none() {
            p.create_sentinel_service(rf).await?;
        }
        if !sentinel_exists {
            p.create_sentinel_deployment(rf).await?;
        }
        if rf.spec.redis.exporter && p.get_redis_service(rf).await?.is_none() {
            p.create_redis_service(rf).await?;
        }
        if !redis_exists {
            p.create_redis_statefulset(rf).await?;
        }

        if p.get_bootstrap_pod(rf).await?.is_some() {
            p.delete_bootstrap_pod(rf).await?;
        }
        Ok(())
    }

    /// Rebuild the previously applied spec from the live objects and
    /// reconcile against it.
    async fn resume(&self, rf: RedisFailover) {
        match self.live_snapshot(&rf).await {
            Ok(previous) => self.update(previous, rf).await,
            Err(e) => debug!(
                name = %rf.name_any(),
                namespace = %rf.namespace().unwrap_or_default(),
                error = %e,
                "Could not read live objects, skipping resume"
            ),
        }
    }

    async fn live_snapshot(&self, rf: &RedisFailover) -> Result<RedisFailover> {
        let statefulset = self
            .provisioner
            .get_redis_statefulset(rf)
            .await?
            .ok_or_else(|| Error::Transform("redis statefulset not found".to_string()))?;
        let deployment = self
            .provisioner
            .get_sentinel_deployment(rf)
            .await?
            .ok_or_else(|| Error::Transform("sentinel deployment not found".to_string()))?;

        Ok(RedisFailover {
            metadata: rf.metadata.clone(),
            spec: RedisFailoverSpec {
                redis: self.transformer.redis_settings(&statefulset)?,
                sentinel: self.transformer.sentinel_settings(&deployment)?,
                ..Default::default()
            },
            status: rf.status.clone(),
        })
    }

    async fn update(&self, mut old: RedisFailover, mut new: RedisFailover) {
        let name = new.name_any();
        let namespace = new.namespace().unwrap_or_default();

        if let Err(e) = validate_and_default(&mut old) {
            warn!(name = %name, namespace = %namespace, error = %e, "Invalid previous RedisFailover spec");
            return;
        }
        if let Err(e) = validate_and_default(&mut new) {
            warn!(name = %name, namespace = %namespace, error = %e, "Invalid RedisFailover spec");
            return;
        }
        old.quorum();
        new.quorum();

        if old.spec == new.spec {
            return;
        }

        if old.spec.sentinel != new.spec.sentinel {
            let change =
                SettingsChange::classify(old.spec.sentinel.replicas, new.spec.sentinel.replicas);
            let status = new.status_mut();
            match change {
                SettingsChange::ScaleUp { from, to } => {
                    status.append_scaling_sentinel_up_condition(from, to)
                }
                SettingsChange::ScaleDown { from, to } => {
                    status.append_scaling_sentinel_down_condition(from, to)
                }
                SettingsChange::Resources => {
                    status.append_updating_sentinel_condition(RESOURCES_CHANGED_REASON)
                }
            }
            self.persist_status_logged(&new).await;
            match self.provisioner.update_sentinel(&new).await {
                Ok(()) => info!(name = %name, namespace = %namespace, change = ?change, "Sentinel updated"),
                Err(e) => error!(name = %name, namespace = %namespace, error = %e, "Failed to update sentinel"),
            }
        }

        if old.spec.redis != new.spec.redis {
            let change = SettingsChange::classify(old.spec.redis.replicas, new.spec.redis.replicas);
            let status = new.status_mut();
            match change {
                SettingsChange::ScaleUp { from, to } => {
                    status.append_scaling_redis_up_condition(from, to)
                }
                SettingsChange::ScaleDown { from, to } => {
                    status.append_scaling_redis_down_condition(from, to)
                }
                SettingsChange::Resources => {
                    status.append_updating_redis_condition(RESOURCES_CHANGED_REASON)
                }
            }
            self.persist_status_logged(&new).await;
            match self.provisioner.update_redis(&new).await {
                Ok(()) => info!(name = %name, namespace = %namespace, change = ?change, "Redis updated"),
                Err(e) => error!(name = %name, namespace = %namespace, error = %e, "Failed to update redis"),
            }
        }

        new.status_mut().set_ready_condition();
        self.persist_status_logged(&new).await;
    }
}

#[async_trait]
impl Reconciler for RedisFailoverHandler {
    async fn on_add(&self, mut rf: RedisFailover) {
        let name = rf.name_any();
        let namespace = rf.namespace().unwrap_or_default();
        self.metrics.record_event(EventKind::Add, &namespace, &name);

        if let Err(e) = validate_and_default(&mut rf) {
            warn!(name = %name, namespace = %namespace, error = %e, "Invalid RedisFailover spec, ignoring");
            return;
        }

        match rf.phase() {
            Phase::None => self.create(rf).await,
            Phase::Running => self.resume(rf).await,
            phase => debug!(name = %name, namespace = %namespace, phase = %phase, "Nothing to do on add"),
        }
    }

    async fn on_update(&self, old: RedisFailover, new: RedisFailover) {
        self.metrics.record_event(
            EventKind::Update,
            &new.namespace().unwrap_or_default(),
            &new.name_any(),
        );
        self.update(old, new).await;
    }

    async fn on_delete(&self, rf: RedisFailover) {
        let name = rf.name_any();
        let namespace = rf.namespace().unwrap_or_default();
        self.metrics.record_event(EventKind::Delete, &namespace, &name);
        let p = &self.provisioner;

        if let Err(e) = p.delete_redis_service(&rf).await {
            warn!(name = %name, namespace = %namespace, error = %e, "Failed to delete redis service");
        }
        if let Err(e) = p.delete_redis_statefulset(&rf).await {
            warn!(name = %name, namespace = %namespace, error = %e, "Failed to delete redis statefulset");
        }
        if let Err(e) = p.delete_sentinel_service(&rf).await {
            warn!(name = %name, namespace = %namespace, error = %e, "Failed to delete sentinel service");
        }
        if let Err(e) = p.delete_sentinel_deployment(&rf).await {
            warn!(name = %name, namespace = %namespace, error = %e, "Failed to delete sentinel deployment");
        }
        info!(name = %name, namespace = %namespace, "RedisFailover deleted");
    }

    async fn list_clusters(&self) -> Result<Vec<RedisFailover>> {
        self.provisioner.get_all_clusters().await
    }

    async fn check_cluster(&self, mut rf: RedisFailover) -> ClusterHealth {
        let name = rf.name_any();
        let namespace = rf.namespace().unwrap_or_default();

        // Listed objects carry the stored spec, without defaults.
        if let Err(e) = validate_and_default(&mut rf) {
            warn!(name = %name, namespace = %namespace, error = %e, "Invalid RedisFailover spec, not checking");
            return ClusterHealth::Creating;
        }

        let ready = rf.phase() == Phase::Running
            && rf.status.as_ref().is_some_and(|s| s.is_last_condition_ready());
        if !ready {
            return ClusterHealth::Creating;
        }

        if let Err(e) = self.checker.check(&rf).await {
            warn!(name = %name, namespace = %namespace, error = %e, "RedisFailover check failed");
            return ClusterHealth::Failed;
        }

        match self.checker.get_master(&rf).await {
            Ok(master) => {
                if rf.status.as_ref().is_some_and(|s| s.master != master) {
                    info!(name = %name, namespace = %namespace, master = %master, "Master changed");
                    rf.status_mut().set_master(master);
                    self.persist_status_logged(&rf).await;
                }
            }
            Err(e) => warn!(name = %name, namespace = %namespace, error = %e, "Failed to read master"),
        }
        ClusterHealth::Running
    }

    fn report_cluster_counts(&self, counts: SweepCounts) {
        self.metrics
            .set_cluster_counts(counts.creating, counts.running, counts.failed);
    }
}
