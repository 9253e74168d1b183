//! temporal-webhook - Admission webhook for TemporalCluster resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Keeps the capability snapshot fresh
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::{Client, CustomResourceExt};
use tokio::signal;
use tracing::{error, info};

use temporal_webhook::capabilities::discovery::{run_discovery_loop, snapshot_channel};
use temporal_webhook::crd::TemporalCluster;
use temporal_webhook::health::{HealthState, run_health_server};
use temporal_webhook::{Config, WebhookState, run_webhook_server};

/// Grace period for in-flight admission requests during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    if config.crd {
        print!("{}", serde_yaml::to_string(&TemporalCluster::crd())?);
        return Ok(());
    }

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("temporal_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err("failed to install the rustls crypto provider".into());
    }

    let policy = config.version_policy();
    info!(
        supported = %policy.supported,
        legacy_elasticsearch_cutoff = %policy.legacy_elasticsearch_cutoff,
        "Starting temporal-webhook"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // Capability discovery publishes into the snapshot channel
    let (snapshot_tx, snapshot_rx) = snapshot_channel();
    let discovery_handle = {
        let health_state = health_state.clone();
        let interval = config.discovery_interval();
        tokio::spawn(run_discovery_loop(
            client,
            interval,
            snapshot_tx,
            Some(health_state),
        ))
    };

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(
            policy,
            snapshot_rx,
            Some(health_state.clone()),
        ));
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(
                state,
                config.webhook_port,
                &config.tls_cert,
                &config.tls_key,
            )
            .await
            {
                error!("Webhook server error: {}", e);
            }
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = discovery_handle => {
            if let Err(e) = result {
                error!("Capability discovery task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Fail readiness so the API server stops routing requests here
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
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
