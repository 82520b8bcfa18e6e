//! Resource generators for Kubernetes objects.
//!
//! This module contains functions to generate the objects owned by a
//! RedisFailover:
//! - Bootstrap pod (`pod`)
//! - Sentinel and Redis services (`services`)
//! - Redis StatefulSet (`statefulset`)
//! - Sentinel Deployment (`deployment`)

pub mod common;
pub mod deployment;
pub mod pod;
pub mod services;
pub mod statefulset;
