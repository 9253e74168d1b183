//! Periodic discovery of the integrations installed in the cluster.
//!
//! Results are published on a `tokio::sync::watch` channel. Admission
//! handlers read the latest value with `borrow()`, which never waits on
//! discovery.

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Capability, CapabilitySnapshot};
use crate::health::HealthState;

/// Query the API server for the groups it serves and derive a snapshot.
pub async fn discover(client: &Client) -> Result<CapabilitySnapshot, kube::Error> {
    let groups = client.list_api_groups().await?;
    Ok(CapabilitySnapshot::from_api_groups(
        groups.groups.iter().map(|g| g.name.as_str()),
    ))
}

/// Create the channel the snapshot is published on.
///
/// Until discovery first succeeds every integration is reported missing.
pub fn snapshot_channel() -> (
    watch::Sender<CapabilitySnapshot>,
    watch::Receiver<CapabilitySnapshot>,
) {
    watch::channel(CapabilitySnapshot::default())
}

/// Refresh the snapshot every `interval` until all receivers are dropped.
///
/// A failed discovery keeps the previous snapshot.
pub async fn run_discovery_loop(
    client: Client,
    interval: Duration,
    sender: watch::Sender<CapabilitySnapshot>,
    health_state: Option<Arc<HealthState>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let snapshot = match discover(&client).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Capability discovery failed, keeping previous snapshot");
                continue;
            }
        };

        if let Some(ref state) = health_state {
            for capability in Capability::ALL {
                state
                    .metrics
                    .set_capability(capability, snapshot.is_available(capability));
            }
            state.set_ready(true).await;
        }

        let changed = sender.send_if_modified(|current| {
            let changed = !same_capabilities(current, &snapshot);
            *current = snapshot;
            changed
        });

        if changed {
            info!(
                cert_manager = snapshot.cert_manager,
                istio = snapshot.istio,
                prometheus_operator = snapshot.prometheus_operator,
                "Capability snapshot updated"
            );
        } else {
            debug!("Capability snapshot unchanged");
        }

        if sender.is_closed() {
            debug!("No snapshot receivers left, stopping discovery");
            return;
        }
    }
}

fn same_capabilities(a: &CapabilitySnapshot, b: &CapabilitySnapshot) -> bool {
    Capability::ALL
        .iter()
        .all(|c| a.is_available(*c) == b.is_available(*c))
}
