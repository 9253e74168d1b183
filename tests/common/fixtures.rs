//! Test fixtures and builder patterns for TemporalCluster.

#![allow(dead_code)]

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};
use temporal_webhook::crd::{
    DatastoreSpec, ElasticsearchSpec, ElasticsearchVersion, MTLSProvider, MTLSSpec, MetricsSpec,
    PrometheusSpec, TemporalCluster, TemporalClusterSpec, ToggleSpec,
};
use temporal_webhook::version::Version;

/// Builder for creating TemporalCluster test fixtures.
///
/// # Example
/// ```
/// let cluster = TemporalClusterBuilder::new("prod")
///     .version("1.20.0")
///     .mtls(MTLSProvider::CertManager)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct TemporalClusterBuilder {
    name: String,
    namespace: Option<String>,
    version: String,
    metrics_enabled: bool,
    listen_address: Option<String>,
    listen_port: Option<i32>,
    mtls: Option<MTLSProvider>,
    elasticsearch: Option<ElasticsearchVersion>,
}

impl TemporalClusterBuilder {
    /// Create a new builder with the given cluster name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            version: "1.20.0".to_string(),
            metrics_enabled: false,
            listen_address: None,
            listen_port: None,
            mtls: None,
            elasticsearch: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set `spec.version`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Enable metrics with the deprecated combined listen address.
    pub fn prometheus_listen_address(mut self, address: impl Into<String>) -> Self {
        self.metrics_enabled = true;
        self.listen_address = Some(address.into());
        self
    }

    /// Set the split prometheus listen port.
    pub fn prometheus_listen_port(mut self, port: i32) -> Self {
        self.metrics_enabled = true;
        self.listen_port = Some(port);
        self
    }

    /// Turn metrics off while keeping the prometheus block.
    pub fn metrics_disabled(mut self) -> Self {
        self.metrics_enabled = false;
        self
    }

    /// Request internode mTLS from the given provider.
    pub fn mtls(mut self, provider: MTLSProvider) -> Self {
        self.mtls = Some(provider);
        self
    }

    /// Use Elasticsearch as advanced visibility store.
    pub fn elasticsearch(mut self, version: ElasticsearchVersion) -> Self {
        self.elasticsearch = Some(version);
        self
    }

    pub fn build(self) -> TemporalCluster {
        let metrics = (self.listen_address.is_some() || self.listen_port.is_some()).then(|| {
            MetricsSpec {
                enabled: self.metrics_enabled,
                prometheus: Some(PrometheusSpec {
                    listen_address: self.listen_address.unwrap_or_default(),
                    listen_port: self.listen_port,
                    ..Default::default()
                }),
            }
        });

        let mut spec = TemporalClusterSpec {
            version: Version::new(self.version),
            num_history_shards: 1,
            metrics,
            mtls: self.mtls.map(|provider| MTLSSpec {
                provider,
                internode: Some(ToggleSpec { enabled: true }),
                ..Default::default()
            }),
            ..Default::default()
        };
        spec.persistence.advanced_visibility_store = self.elasticsearch.map(|version| DatastoreSpec {
            elasticsearch: Some(ElasticsearchSpec {
                version,
                url: "http://elasticsearch:9200".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });

        TemporalCluster {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: self.namespace,
                ..Default::default()
            },
            spec,
        }
    }
}

impl Default for TemporalClusterBuilder {
    fn default() -> Self {
        Self::new("test-cluster")
    }
}

/// Create a cluster at the given version with nothing else set.
pub fn cluster_at(version: &str) -> TemporalCluster {
    TemporalClusterBuilder::default().version(version).build()
}

/// Wrap objects into an `admission.k8s.io/v1` AdmissionReview body.
pub fn admission_review(
    operation: &str,
    object: Option<&TemporalCluster>,
    old_object: Option<&TemporalCluster>,
) -> Value {
    let name = object
        .or(old_object)
        .and_then(|c| c.metadata.name.clone())
        .unwrap_or_default();

    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": format!("uid-{name}"),
            "kind": {"group": "temporal.io", "version": "v1beta1", "kind": "TemporalCluster"},
            "resource": {"group": "temporal.io", "version": "v1beta1", "resource": "temporalclusters"},
            "name": name,
            "namespace": "default",
            "operation": operation,
            "userInfo": {"username": "system:admin"},
            "object": object.map(|c| serde_json::to_value(c).unwrap()),
            "oldObject": old_object.map(|c| serde_json::to_value(c).unwrap()),
            "dryRun": false
        }
    })
}
