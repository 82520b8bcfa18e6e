//! Redis client module for node-level queries.
//!
//! ## Architecture
//!
//! - `redis_client`: the [`RedisNodeClient`] trait and its fred-backed implementation
//! - `parsing`: pure parsers for `INFO replication` and `INFO sentinel` output

pub mod parsing;
pub mod redis_client;

pub use parsing::ParseError;
pub use redis_client::{FredRedisClient, REDIS_PORT, RedisError, RedisNodeClient, SENTINEL_PORT};
