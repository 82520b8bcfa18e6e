//! [`ResourceProvisioner`] backed by the Kubernetes API.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use super::ResourceProvisioner;
use crate::controller::error::{Error, Result};
use crate::crd::RedisFailover;
use crate::resources::common::{
    REDIS_COMPONENT, SENTINEL_COMPONENT, bootstrap_name, label_selector, redis_name, sentinel_name,
};
use crate::resources::{deployment, pod, services, statefulset};
use crate::scoped_api;

/// Field manager name for server-side apply
pub const FIELD_MANAGER: &str = "redis-failover-operator";

/// Interval between readiness polls
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Provisions RedisFailover objects through `kube::Api`.
#[derive(Clone)]
pub struct KubeProvisioner {
    client: Client,
    watch_namespace: Option<String>,
    ready_timeout: Duration,
}

impl KubeProvisioner {
    /// `watch_namespace` limits [`ResourceProvisioner::get_all_clusters`] to one namespace.
    pub fn new(client: Client, watch_namespace: Option<String>, ready_timeout: Duration) -> Self {
        Self {
            client,
            watch_namespace,
            ready_timeout,
        }
    }

    fn api<K>(&self, rf: &RedisFailover) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &rf.namespace().unwrap_or_default())
    }

    async fn get_opt<K>(&self, rf: &RedisFailover, name: &str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(rf).get_opt(name).await?)
    }

    /// Create `obj`; an object that already exists counts as created.
    async fn create<K>(&self, rf: &RedisFailover, obj: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let kind = K::kind(&Default::default()).to_string();
        let name = obj.name_any();
        match self.api::<K>(rf).create(&PostParams::default(), obj).await {
            Ok(_) => {
                info!(kind = %kind, name = %name, "Created object");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 409 => {
                debug!(kind = %kind, name = %name, "Object already exists");
                Ok(())
            }
            Err(e) => Err(Error::Provisioning(format!(
                "failed to create {} {}: {}",
                kind, name, e
            ))),
        }
    }

    async fn apply<K>(&self, rf: &RedisFailover, obj: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let kind = K::kind(&Default::default()).to_string();
        let name = obj.name_any();
        self.api::<K>(rf)
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(obj),
            )
            .await
            .map_err(|e| Error::Provisioning(format!("failed to update {} {}: {}", kind, name, e)))?;
        info!(kind = %kind, name = %name, "Updated object");
        Ok(())
    }

    /// Delete an object; a missing object counts as deleted.
    async fn delete<K>(&self, rf: &RedisFailover, name: &str) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        match self.api::<K>(rf).delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(kind = %K::kind(&Default::default()), name = %name, "Deleted object");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until `ready` holds for the named object or the timeout elapses.
    ///
    /// Timeouts are logged and otherwise ignored.
    async fn wait_until<K, F>(&self, rf: &RedisFailover, name: &str, ready: F)
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
        F: Fn(&K) -> bool + Send,
    {
        let api = self.api::<K>(rf);
        let poll = async {
            loop {
                match api.get_opt(name).await {
                    Ok(Some(obj)) if ready(&obj) => return,
                    Ok(_) => {}
                    Err(e) => debug!(name = %name, error = %e, "Readiness poll failed"),
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        if tokio::time::timeout(self.ready_timeout, poll).await.is_err() {
            warn!(
                name = %name,
                timeout_secs = self.ready_timeout.as_secs(),
                "Timed out waiting for object to become ready"
            );
        }
    }

    /// Address new Redis and Sentinel pods should follow.
    ///
    /// The bootstrap pod while it exists, otherwise the recorded master.
    async fn master_host(&self, rf: &RedisFailover) -> Option<String> {
        let bootstrap_ip = match self.get_bootstrap_pod(rf).await {
            Ok(pod) => pod.and_then(|p| p.status).and_then(|s| s.pod_ip),
            Err(e) => {
                debug!(error = %e, "Failed to read bootstrap pod");
                None
            }
        };
        bootstrap_ip.or_else(|| {
            rf.status
                .as_ref()
                .map(|s| s.master.clone())
                .filter(|m| !m.is_empty())
        })
    }

    async fn running_pod_ips(&self, rf: &RedisFailover, component: &str) -> Result<Vec<String>> {
        let params = ListParams::default().labels(&label_selector(rf, component));
        let mut pods = self.api::<Pod>(rf).list(&params).await?.items;
        pods.sort_by_key(|p| p.name_any());
        Ok(pods
            .into_iter()
            .filter_map(|p| p.status)
            .filter(|s| s.phase.as_deref() == Some("Running"))
            .filter_map(|s| s.pod_ip)
            .collect())
    }
}

fn statefulset_ready(ss: &StatefulSet) -> bool {
    let desired = ss.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = ss.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
    ready >= desired
}

fn deployment_ready(deploy: &Deployment) -> bool {
    let desired = deploy.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = deploy
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready >= desired
}

fn pod_running(pod: &Pod) -> bool {
    pod.status.as_ref().is_some_and(|s| {
        s.phase.as_deref() == Some("Running") && s.pod_ip.is_some()
    })
}

#[async_trait]
impl ResourceProvisioner for KubeProvisioner {
    async fn get_bootstrap_pod(&self, rf: &RedisFailover) -> Result<Option<Pod>> {
        self.get_opt(rf, &bootstrap_name(rf)).await
    }

    async fn create_bootstrap_pod(&self, rf: &RedisFailover) -> Result<()> {
        self.create(rf, &pod::generate_bootstrap_pod(rf)).await?;
        self.wait_until::<Pod, _>(rf, &bootstrap_name(rf), pod_running)
            .await;
        Ok(())
    }

    async fn delete_bootstrap_pod(&self, rf: &RedisFailover) -> Result<()> {
        self.delete::<Pod>(rf, &bootstrap_name(rf)).await
    }

    async fn get_sentinel_service(&self, rf: &RedisFailover) -> Result<Option<Service>> {
        self.get_opt(rf, &sentinel_name(rf)).await
    }

    async fn create_sentinel_service(&self, rf: &RedisFailover) -> Result<()> {
        self.create(rf, &services::generate_sentinel_service(rf))
            .await
    }

    async fn delete_sentinel_service(&self, rf: &RedisFailover) -> Result<()> {
        self.delete::<Service>(rf, &sentinel_name(rf)).await
    }

    async fn get_sentinel_deployment(&self, rf: &RedisFailover) -> Result<Option<Deployment>> {
        self.get_opt(rf, &sentinel_name(rf)).await
    }

    async fn create_sentinel_deployment(&self, rf: &RedisFailover) -> Result<()> {
        let master = self.master_host(rf).await;
        let deploy = deployment::generate_sentinel_deployment(rf, master.as_deref());
        self.create(rf, &deploy).await?;
        self.wait_until::<Deployment, _>(rf, &sentinel_name(rf), deployment_ready)
            .await;
        Ok(())
    }

    async fn update_sentinel(&self, rf: &RedisFailover) -> Result<()> {
        let master = self.master_host(rf).await;
        let deploy = deployment::generate_sentinel_deployment(rf, master.as_deref());
        self.apply(rf, &deploy).await?;
        self.wait_until::<Deployment, _>(rf, &sentinel_name(rf), deployment_ready)
            .await;
        Ok(())
    }

    async fn delete_sentinel_deployment(&self, rf: &RedisFailover) -> Result<()> {
        self.delete::<Deployment>(rf, &sentinel_name(rf)).await
    }

    async fn get_redis_service(&self, rf: &RedisFailover) -> Result<Option<Service>> {
        self.get_opt(rf, &redis_name(rf)).await
    }

    async fn create_redis_service(&self, rf: &RedisFailover) -> Result<()> {
        self.create(rf, &services::generate_redis_service(rf)).await
    }

    async fn delete_redis_service(&self, rf: &RedisFailover) -> Result<()> {
        self.delete::<Service>(rf, &redis_name(rf)).await
    }

    async fn get_redis_statefulset(&self, rf: &RedisFailover) -> Result<Option<StatefulSet>> {
        self.get_opt(rf, &redis_name(rf)).await
    }

    async fn create_redis_statefulset(&self, rf: &RedisFailover) -> Result<()> {
        let master = self.master_host(rf).await;
        let ss = statefulset::generate_redis_statefulset(rf, master.as_deref());
        self.create(rf, &ss).await?;
        self.wait_until::<StatefulSet, _>(rf, &redis_name(rf), statefulset_ready)
            .await;
        Ok(())
    }

    async fn update_redis(&self, rf: &RedisFailover) -> Result<()> {
        let master = self.master_host(rf).await;
        let ss = statefulset::generate_redis_statefulset(rf, master.as_deref());
        self.apply(rf, &ss).await?;
        self.wait_until::<StatefulSet, _>(rf, &redis_name(rf), statefulset_ready)
            .await;
        Ok(())
    }

    async fn delete_redis_statefulset(&self, rf: &RedisFailover) -> Result<()> {
        self.delete::<StatefulSet>(rf, &redis_name(rf)).await
    }

    async fn get_redis_replicas(&self, rf: &RedisFailover) -> Result<i32> {
        let ss = self
            .get_redis_statefulset(rf)
            .await?
            .ok_or_else(|| Error::Provisioning(format!("statefulset {} not found", redis_name(rf))))?;
        Ok(ss.spec.and_then(|s| s.replicas).unwrap_or(1))
    }

    async fn get_sentinel_replicas(&self, rf: &RedisFailover) -> Result<i32> {
        let deploy = self
            .get_sentinel_deployment(rf)
            .await?
            .ok_or_else(|| {
                Error::Provisioning(format!("deployment {} not found", sentinel_name(rf)))
            })?;
        Ok(deploy.spec.and_then(|s| s.replicas).unwrap_or(1))
    }

    async fn update_status(&self, rf: &RedisFailover) -> Result<RedisFailover> {
        let api: Api<RedisFailover> = self.api(rf);
        let patch = json!({ "status": rf.status });
        let updated = api
            .patch_status(&rf.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(updated)
    }

    async fn get_all_clusters(&self) -> Result<Vec<RedisFailover>> {
        let api: Api<RedisFailover> =
            scoped_api(self.client.clone(), self.watch_namespace.as_deref());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_redis_ips(&self, rf: &RedisFailover) -> Result<Vec<String>> {
        self.running_pod_ips(rf, REDIS_COMPONENT).await
    }

    async fn get_sentinel_ips(&self, rf: &RedisFailover) -> Result<Vec<String>> {
        self.running_pod_ips(rf, SENTINEL_COMPONENT).await
    }
}
