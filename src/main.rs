//! redis-failover-operator - A Kubernetes operator for Redis with Sentinel failover.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration and creates the Kubernetes client
//! - Registers the RedisFailover CRD
//! - Starts the health server and the event driver

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use redis_failover_operator::crd::ensure_crd_registered;
use redis_failover_operator::health::{HealthState, run_health_server};
use redis_failover_operator::{OperatorConfig, run_operator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("redis_failover_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting redis-failover-operator");

    let config = OperatorConfig::load()?;
    info!(?config, "Loaded configuration");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    ensure_crd_registered(client.clone()).await?;

    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    tokio::select! {
        _ = run_operator(client, config, health_state, shutdown_signal()) => {
            info!("Event driver stopped");
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Failing to install a signal handler is fatal.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
