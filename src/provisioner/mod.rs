//! Platform object provisioning.
//!
//! The [`ResourceProvisioner`] trait is everything the controller and the
//! topology checker need from Kubernetes. [`KubeProvisioner`] implements it
//! with `kube::Api` calls.

mod kubernetes;

pub use kubernetes::KubeProvisioner;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, Service};

use crate::controller::error::Result;
use crate::crd::RedisFailover;

/// Reads, creates, updates and deletes the objects backing a RedisFailover.
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    async fn get_bootstrap_pod(&self, rf: &RedisFailover) -> Result<Option<Pod>>;
    async fn create_bootstrap_pod(&self, rf: &RedisFailover) -> Result<()>;
    async fn delete_bootstrap_pod(&self, rf: &RedisFailover) -> Result<()>;

    async fn get_sentinel_service(&self, rf: &RedisFailover) -> Result<Option<Service>>;
    async fn create_sentinel_service(&self, rf: &RedisFailover) -> Result<()>;
    async fn delete_sentinel_service(&self, rf: &RedisFailover) -> Result<()>;

    async fn get_sentinel_deployment(&self, rf: &RedisFailover) -> Result<Option<Deployment>>;
    async fn create_sentinel_deployment(&self, rf: &RedisFailover) -> Result<()>;
    async fn update_sentinel(&self, rf: &RedisFailover) -> Result<()>;
    async fn delete_sentinel_deployment(&self, rf: &RedisFailover) -> Result<()>;

    async fn get_redis_service(&self, rf: &RedisFailover) -> Result<Option<Service>>;
    async fn create_redis_service(&self, rf: &RedisFailover) -> Result<()>;
    async fn delete_redis_service(&self, rf: &RedisFailover) -> Result<()>;

    async fn get_redis_statefulset(&self, rf: &RedisFailover) -> Result<Option<StatefulSet>>;
    async fn create_redis_statefulset(&self, rf: &RedisFailover) -> Result<()>;
    async fn update_redis(&self, rf: &RedisFailover) -> Result<()>;
    async fn delete_redis_statefulset(&self, rf: &RedisFailover) -> Result<()>;

    /// Replica count of the provisioned Redis StatefulSet.
    async fn get_redis_replicas(&self, rf: &RedisFailover) -> Result<i32>;

    /// Replica count of the provisioned Sentinel Deployment.
    async fn get_sentinel_replicas(&self, rf: &RedisFailover) -> Result<i32>;

    /// Persist the status of `rf` and return the stored object.
    async fn update_status(&self, rf: &RedisFailover) -> Result<RedisFailover>;

    /// Every RedisFailover in the watched scope.
    async fn get_all_clusters(&self) -> Result<Vec<RedisFailover>>;

    /// IPs of the running Redis pods.
    async fn get_redis_ips(&self, rf: &RedisFailover) -> Result<Vec<String>>;

    /// IPs of the running Sentinel pods.
    async fn get_sentinel_ips(&self, rf: &RedisFailover) -> Result<Vec<String>>;
}
