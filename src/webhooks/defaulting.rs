//! Defaulting for TemporalCluster admission requests.
//!
//! Runs before validation on CREATE and UPDATE:
//! - Migrates the deprecated `spec.metrics.prometheus.listenAddress` into
//!   `listenPort`
//! - Fills every other omitted optional field with its default
//!
//! The cluster is only modified once all parsing has succeeded, so a failed
//! defaulting leaves it untouched. Defaulting an already defaulted cluster
//! changes nothing.

use tracing::debug;

use crate::crd::TemporalCluster;
use crate::webhooks::error::{AdmissionError, Result};

/// Default the cluster in place.
pub fn default_cluster(cluster: &mut TemporalCluster) -> Result<()> {
    migrate_prometheus_listen_address(cluster)?;

    // Finish by setting default values
    cluster.apply_defaults();

    Ok(())
}

/// Move a legacy `host:port` listen address into the split `listenPort` field.
fn migrate_prometheus_listen_address(cluster: &mut TemporalCluster) -> Result<()> {
    if !cluster.metrics_enabled() {
        return Ok(());
    }

    let Some(prometheus) = cluster
        .spec
        .metrics
        .as_mut()
        .and_then(|m| m.prometheus.as_mut())
    else {
        return Ok(());
    };

    if prometheus.listen_address.is_empty() || prometheus.listen_port.is_some() {
        return Ok(());
    }

    let (_, port) = split_host_port(&prometheus.listen_address).map_err(|reason| {
        AdmissionError::MalformedAddress {
            address: prometheus.listen_address.clone(),
            reason: reason.to_string(),
        }
    })?;

    let port: i32 = port.parse().map_err(|e: std::num::ParseIntError| {
        AdmissionError::MalformedAddress {
            address: prometheus.listen_address.clone(),
            reason: format!("invalid port '{port}': {e}"),
        }
    })?;

    debug!(
        listen_address = %prometheus.listen_address,
        listen_port = port,
        "Migrating deprecated prometheus listenAddress to listenPort"
    );

    prometheus.listen_address.clear();
    prometheus.listen_port = Some(port);

    Ok(())
}

/// Split `host:port`, `[ipv6]:port` or `:port` into host and port.
///
/// The port is returned unparsed and may be empty.
pub fn split_host_port(address: &str) -> std::result::Result<(&str, &str), &'static str> {
    if let Some(rest) = address.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err("missing ']' in address");
        };
        if host.contains('[') {
            return Err("unexpected '[' in address");
        }
        return match after.strip_prefix(':') {
            Some(port) if port.contains(['[', ']']) => Err("unexpected ']' in address"),
            Some(port) if port.contains(':') => Err("too many colons in address"),
            Some(port) => Ok((host, port)),
            None if after.is_empty() => Err("missing port in address"),
            None => Err("unexpected ']' in address"),
        };
    }

    let Some((host, port)) = address.rsplit_once(':') else {
        return Err("missing port in address");
    };

    if host.contains(':') {
        return Err("too many colons in address");
    }
    if host.contains('[') {
        return Err("unexpected '[' in address");
    }
    if host.contains(']') {
        return Err("unexpected ']' in address");
    }

    Ok((host, port))
}
