//! Controller module for redis-failover-operator.
//!
//! Contains the reconciliation handler, topology checker, dispatcher, event
//! driver, status state machine, validation and error handling.

pub mod checker;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod handler;
pub mod status;
pub mod validation;

pub use checker::{RedisFailoverChecker, TopologyChecker};
pub use dispatcher::Dispatcher;
pub use driver::EventDriver;
pub use handler::{ClusterHealth, RedisFailoverHandler, Reconciler, SweepCounts};
