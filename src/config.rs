//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::health::HEALTH_PORT;
use crate::version::{SupportedRange, Version, VersionPolicy};
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Admission webhook for TemporalCluster resources
#[derive(Parser, Debug, Clone)]
#[command(name = "temporal-webhook", version, about, long_about = None)]
pub struct Config {
    /// Generate the TemporalCluster CRD manifest and exit
    #[arg(long)]
    pub crd: bool,

    /// Oldest supported Temporal minor line (any patch)
    #[arg(
        long,
        env = "TEMPORAL_WEBHOOK_MIN_SUPPORTED_VERSION",
        default_value = "1.17",
        value_parser = parse_version
    )]
    pub min_supported_version: semver::Version,

    /// Newest supported Temporal minor line (any patch)
    #[arg(
        long,
        env = "TEMPORAL_WEBHOOK_MAX_SUPPORTED_VERSION",
        default_value = "1.23",
        value_parser = parse_version
    )]
    pub max_supported_version: semver::Version,

    /// First Temporal version that refuses Elasticsearch v6
    #[arg(
        long,
        env = "TEMPORAL_WEBHOOK_LEGACY_ELASTICSEARCH_CUTOFF",
        default_value = "1.18.0",
        value_parser = parse_version
    )]
    pub legacy_elasticsearch_cutoff: semver::Version,

    /// Port of the TLS admission endpoints
    #[arg(long, env = "TEMPORAL_WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub webhook_port: u16,

    /// Port of the health and metrics endpoints
    #[arg(long, env = "TEMPORAL_WEBHOOK_HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,

    /// PEM certificate served by the admission endpoints
    #[arg(long, env = "TEMPORAL_WEBHOOK_TLS_CERT", default_value = WEBHOOK_CERT_PATH)]
    pub tls_cert: PathBuf,

    /// PEM private key matching `--tls-cert`
    #[arg(long, env = "TEMPORAL_WEBHOOK_TLS_KEY", default_value = WEBHOOK_KEY_PATH)]
    pub tls_key: PathBuf,

    /// Seconds between two capability discoveries
    #[arg(
        long,
        env = "TEMPORAL_WEBHOOK_DISCOVERY_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub discovery_interval_secs: u64,
}

impl Config {
    /// Version rules handed to every admission request
    pub fn version_policy(&self) -> VersionPolicy {
        VersionPolicy {
            supported: SupportedRange::new(
                self.min_supported_version.clone(),
                self.max_supported_version.clone(),
            ),
            legacy_elasticsearch_cutoff: self.legacy_elasticsearch_cutoff.clone(),
        }
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }
}

/// Accepts the same lenient forms as `spec.version` (`1.17`, `v1.17.3`)
fn parse_version(raw: &str) -> Result<semver::Version, String> {
    Version::new(raw).parse().map_err(|e| e.to_string())
}
