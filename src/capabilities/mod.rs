//! Optional platform integrations available in the hosting cluster.
//!
//! The snapshot is produced by [`discovery`] and only read by the webhook.
//! Validation never performs discovery itself.

pub mod discovery;

use std::fmt;

use jiff::Timestamp;

use crate::crd::MTLSProvider;

/// An optional integration the webhook may depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// cert-manager (certificate issuance).
    CertManager,
    /// Istio service mesh.
    Istio,
    /// Prometheus operator (ServiceMonitor resources).
    PrometheusOperator,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::CertManager,
        Capability::Istio,
        Capability::PrometheusOperator,
    ];

    /// API group whose presence signals the integration is installed.
    pub fn api_group(&self) -> &'static str {
        match self {
            Capability::CertManager => "cert-manager.io",
            Capability::Istio => "security.istio.io",
            Capability::PrometheusOperator => "monitoring.coreos.com",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::CertManager => write!(f, "cert-manager"),
            Capability::Istio => write!(f, "istio"),
            Capability::PrometheusOperator => write!(f, "prometheus-operator"),
        }
    }
}

/// Point-in-time record of which integrations are installed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CapabilitySnapshot {
    pub cert_manager: bool,
    pub istio: bool,
    pub prometheus_operator: bool,
    /// When discovery produced this snapshot. `None` until the first run.
    pub discovered_at: Option<Timestamp>,
}

impl CapabilitySnapshot {
    /// Snapshot with every integration available.
    pub fn all() -> Self {
        Self {
            cert_manager: true,
            istio: true,
            prometheus_operator: true,
            discovered_at: None,
        }
    }

    pub fn is_available(&self, capability: Capability) -> bool {
        match capability {
            Capability::CertManager => self.cert_manager,
            Capability::Istio => self.istio,
            Capability::PrometheusOperator => self.prometheus_operator,
        }
    }

    /// Build a snapshot from the names of the API groups served by the cluster.
    pub fn from_api_groups<'a>(groups: impl IntoIterator<Item = &'a str>) -> Self {
        let mut snapshot = Self {
            discovered_at: Some(Timestamp::now()),
            ..Default::default()
        };
        for group in groups {
            for capability in Capability::ALL {
                if capability.api_group() == group {
                    snapshot.set(capability, true);
                }
            }
        }
        snapshot
    }

    fn set(&mut self, capability: Capability, available: bool) {
        match capability {
            Capability::CertManager => self.cert_manager = available,
            Capability::Istio => self.istio = available,
            Capability::PrometheusOperator => self.prometheus_operator = available,
        }
    }
}

/// Integration an mTLS provider needs from the cluster, if any.
const MTLS_PROVIDER_REQUIREMENTS: [(MTLSProvider, Option<Capability>); 3] = [
    (MTLSProvider::CertManager, Some(Capability::CertManager)),
    (MTLSProvider::Linkerd, None),
    (MTLSProvider::Istio, None),
];

/// Look up the capability required by an mTLS provider.
pub fn required_capability(provider: MTLSProvider) -> Option<Capability> {
    MTLS_PROVIDER_REQUIREMENTS
        .iter()
        .find(|(p, _)| *p == provider)
        .and_then(|(_, capability)| *capability)
}
