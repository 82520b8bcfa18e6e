//! Error types for the controller.
//!
//! Every failure a reconciliation step can hit is classified here so the
//! handler can decide between logging, marking the cluster failed, or
//! carrying on.

use thiserror::Error;

use crate::client::RedisError;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error in resource spec
    #[error("Validation error: {0}")]
    Validation(String),

    /// A platform object could not be provisioned
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// A Redis or Sentinel node could not be queried
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// The live topology does not match the declared one
    #[error("{0}")]
    Topology(String),

    /// A live object could not be translated back into settings
    #[error("Transform error: {0}")]
    Transform(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
