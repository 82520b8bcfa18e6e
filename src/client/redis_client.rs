//! Redis and Sentinel node client using the fred crate.
//!
//! Every call opens a dedicated connection to the node, runs a single
//! command and closes the connection again. Nodes are addressed by IP; the
//! port depends on whether the target is a Redis or a Sentinel process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::InfoKind;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::client::parsing::{self, ParseError};
use crate::health::MetricsSink;

/// Port Redis listens on.
pub const REDIS_PORT: u16 = 6379;

/// Port Sentinel listens on.
pub const SENTINEL_PORT: u16 = 26379;

/// Errors that can occur while talking to a node.
#[derive(Error, Debug)]
pub enum RedisError {
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Sentinel not ready: {0}")]
    SentinelNotReady(String),
}

/// Queries against individual Redis and Sentinel nodes.
#[async_trait]
pub trait RedisNodeClient: Send + Sync {
    /// Whether the Redis node at `ip` reports the master role.
    async fn is_master(&self, ip: &str) -> Result<bool, RedisError>;

    /// Master the Redis node at `ip` replicates from, empty for a master.
    async fn get_slave_of(&self, ip: &str) -> Result<String, RedisError>;

    /// Number of Sentinels the Sentinel at `ip` currently knows about.
    async fn get_number_sentinels_in_memory(&self, ip: &str) -> Result<i32, RedisError>;

    /// Make the Sentinel at `ip` forget its view and rediscover peers.
    async fn reset_sentinel(&self, ip: &str) -> Result<(), RedisError>;
}

/// [`RedisNodeClient`] backed by short-lived fred connections.
pub struct FredRedisClient {
    connection_timeout: Duration,
    command_timeout: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl FredRedisClient {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            metrics,
        }
    }

    /// Override the connection and command timeouts.
    pub fn with_timeouts(mut self, connection: Duration, command: Duration) -> Self {
        self.connection_timeout = connection;
        self.command_timeout = command;
        self
    }

    async fn connect(&self, host: &str, port: u16) -> Result<Client, RedisError> {
        let config = Config {
            server: ServerConfig::Centralized {
                server: Server::new(host, port),
            },
            ..Default::default()
        };

        let command_timeout = self.command_timeout;
        let connection_timeout = self.connection_timeout;
        let client = Builder::from_config(config)
            .with_performance_config(|perf| {
                perf.default_command_timeout = command_timeout;
            })
            .with_connection_config(|conn| {
                conn.connection_timeout = connection_timeout;
            })
            .build()?;

        client.init().await?;
        Ok(client)
    }

    async fn redis_info(&self, ip: &str) -> Result<String, RedisError> {
        let client = self.connect(ip, REDIS_PORT).await?;
        let result: Result<String, _> = client.info(Some(InfoKind::Replication)).await;
        close(&client).await;
        Ok(result?)
    }

    async fn sentinel_info(&self, ip: &str) -> Result<String, RedisError> {
        let client = self.connect(ip, SENTINEL_PORT).await?;
        let result: Result<String, _> = client.custom(fred::cmd!("INFO"), vec!["sentinel"]).await;
        close(&client).await;
        Ok(result?)
    }

    fn record<T>(&self, kind: &str, operation: &str, result: &Result<T, RedisError>) {
        self.metrics
            .record_redis_operation(kind, operation, result.is_ok());
    }
}

async fn close(client: &Client) {
    if let Err(e) = client.quit().await {
        debug!(error = %e, "Failed to close connection");
    }
}

#[async_trait]
impl RedisNodeClient for FredRedisClient {
    #[instrument(skip(self))]
    async fn is_master(&self, ip: &str) -> Result<bool, RedisError> {
        let result = self
            .redis_info(ip)
            .await
            .map(|info| parsing::is_master_role(&info));
        self.record("redis", "is_master", &result);
        result
    }

    #[instrument(skip(self))]
    async fn get_slave_of(&self, ip: &str) -> Result<String, RedisError> {
        let result = match self.redis_info(ip).await {
            Ok(info) => parsing::parse_master_host(&info).map_err(RedisError::from),
            Err(e) => Err(e),
        };
        self.record("redis", "get_slave_of", &result);
        result
    }

    #[instrument(skip(self))]
    async fn get_number_sentinels_in_memory(&self, ip: &str) -> Result<i32, RedisError> {
        let result = match self.sentinel_info(ip).await {
            Ok(info) => parsing::parse_sentinel_count(&info).map_err(|e| match e {
                ParseError::SentinelNotReady(status) => RedisError::SentinelNotReady(status),
                other => RedisError::Parse(other),
            }),
            Err(e) => Err(e),
        };
        self.record("sentinel", "get_number_sentinels_in_memory", &result);
        result
    }

    #[instrument(skip(self))]
    async fn reset_sentinel(&self, ip: &str) -> Result<(), RedisError> {
        let result: Result<(), RedisError> = async {
            let client = self.connect(ip, SENTINEL_PORT).await?;
            let reset: Result<i64, _> = client
                .custom(fred::cmd!("SENTINEL"), vec!["reset", "*"])
                .await;
            close(&client).await;
            let reset_masters = reset?;
            debug!(reset_masters, "Sentinel reset");
            Ok(())
        }
        .await;
        self.record("sentinel", "reset_sentinel", &result);
        result
    }
}
