//! Custom Resource Definitions for redis-failover-operator.
//!
//! - `RedisFailover`: a Redis primary/replica set guarded by a Sentinel quorum

mod redis_failover;

pub use redis_failover::*;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::PostParams;
use kube::{Api, Client, CustomResourceExt};
use tracing::info;

/// Register the RedisFailover CRD with the API server.
///
/// An already existing definition counts as success.
pub async fn ensure_crd_registered(client: Client) -> Result<(), kube::Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client);
    let crd = RedisFailover::crd();
    match crds.create(&PostParams::default(), &crd).await {
        Ok(_) => {
            info!(crd = %RedisFailover::crd_name(), "Registered CRD");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 409 => {
            info!(crd = %RedisFailover::crd_name(), "CRD already registered");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
