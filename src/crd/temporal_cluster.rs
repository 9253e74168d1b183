//! TemporalCluster Custom Resource Definition.
//!
//! Only the parts of the schema the admission webhook reads or defaults are
//! modelled here. Unknown fields are preserved by the API server and never
//! touched by the webhook, since mutations are sent back as a JSON patch.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::version::Version;

/// TemporalCluster describes a Temporal server deployment.
///
/// Example:
/// ```yaml
/// apiVersion: temporal.io/v1beta1
/// kind: TemporalCluster
/// metadata:
///   name: prod
/// spec:
///   version: 1.20.0
///   numHistoryShards: 512
///   persistence:
///     defaultStore:
///       sql:
///         pluginName: postgres
///     visibilityStore:
///       sql:
///         pluginName: postgres
///   mTLS:
///     provider: cert-manager
///     internode:
///       enabled: true
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "temporal.io",
    version = "v1beta1",
    kind = "TemporalCluster",
    plural = "temporalclusters",
    shortname = "tc",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TemporalClusterSpec {
    /// Temporal server version.
    pub version: Version,

    /// Number of history shards. Immutable once the cluster is created.
    #[serde(default)]
    pub num_history_shards: i32,

    /// Temporal server image (default: temporalio/server).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Replicas applied to every service that does not override them (default: 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_replicas: Option<i32>,

    /// TTL for setup jobs once they complete (default: 300).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_ttl_seconds_after_finished: Option<i32>,

    /// Server log configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogSpec>,

    /// Per-service configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<ServicesSpec>,

    /// Datastores used by the cluster.
    #[serde(default)]
    pub persistence: PersistenceSpec,

    /// Mutual TLS between services and towards clients.
    #[serde(rename = "mTLS", skip_serializing_if = "Option::is_none")]
    pub mtls: Option<MTLSSpec>,

    /// Metrics exposition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSpec>,

    /// Temporal web UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UISpec>,

    /// Admin tools deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admintools: Option<AdminToolsSpec>,
}

/// Server log configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogSpec {
    #[serde(default)]
    pub stdout: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub level: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
}

/// Configuration of each Temporal service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicesSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<ServiceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_frontend: Option<InternalFrontendServiceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<ServiceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching: Option<ServiceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<ServiceSpec>,
}

/// Network and scale settings of a single service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<i32>,
}

/// The internal frontend is opt-in.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalFrontendServiceSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub service: ServiceSpec,
}

/// Datastores used by the cluster.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_store: Option<DatastoreSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_store: Option<DatastoreSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_visibility_store: Option<DatastoreSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_visibility_store: Option<DatastoreSpec>,
}

/// A single datastore. Exactly one backend is expected to be set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreSpec {
    /// Datastore name, set by defaulting.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<ElasticsearchSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cassandra: Option<CassandraSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_secret_ref: Option<SecretKeyReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlSpec {
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub connect_addr: String,
    #[serde(default)]
    pub database_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CassandraSpec {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub keyspace: String,
    #[serde(default)]
    pub datacenter: String,
}

/// Elasticsearch backend for advanced visibility.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchSpec {
    /// Major version of the Elasticsearch cluster (v6, v7 or v8).
    #[serde(default)]
    pub version: ElasticsearchVersion,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default)]
    pub indices: ElasticsearchIndices,
}

/// Supported Elasticsearch major versions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ElasticsearchVersion {
    #[serde(rename = "v6")]
    V6,
    #[default]
    #[serde(rename = "v7")]
    V7,
    #[serde(rename = "v8")]
    V8,
}

impl std::fmt::Display for ElasticsearchVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElasticsearchVersion::V6 => write!(f, "v6"),
            ElasticsearchVersion::V7 => write!(f, "v7"),
            ElasticsearchVersion::V8 => write!(f, "v8"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchIndices {
    #[serde(default)]
    pub visibility: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secondary_visibility: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyReference {
    pub name: String,
    #[serde(default)]
    pub key: String,
}

/// Mutual TLS configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MTLSSpec {
    /// Component issuing the certificates.
    #[serde(default)]
    pub provider: MTLSProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internode: Option<ToggleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<ToggleSpec>,
    /// How often certificates are reloaded by the servers (default: 1h).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
    /// Validity of the generated certificates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates_duration: Option<CertificatesDurationSpec>,
}

impl MTLSSpec {
    /// True when at least one of internode or frontend encryption is turned on.
    pub fn is_requested(&self) -> bool {
        self.internode.as_ref().is_some_and(|t| t.enabled)
            || self.frontend.as_ref().is_some_and(|t| t.enabled)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleSpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Who provides mTLS certificates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum MTLSProvider {
    #[default]
    #[serde(rename = "cert-manager")]
    CertManager,
    #[serde(rename = "linkerd")]
    Linkerd,
    #[serde(rename = "istio")]
    Istio,
}

impl std::fmt::Display for MTLSProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MTLSProvider::CertManager => write!(f, "cert-manager"),
            MTLSProvider::Linkerd => write!(f, "linkerd"),
            MTLSProvider::Istio => write!(f, "istio"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificatesDurationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_ca_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediate_ca_certificates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internode_certificate: Option<String>,
}

/// Metrics exposition.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<PrometheusSpec>,
}

/// Prometheus endpoint exposed by every Temporal service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    /// Deprecated: use `listenPort`. Combined `host:port` listen address.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub listen_address: String,
    /// Port the metrics endpoint listens on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_config: Option<PrometheusScrapeConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusScrapeConfig {
    /// Add prometheus.io scrape annotations to the pods.
    #[serde(default)]
    pub annotations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_monitor: Option<ToggleSpec>,
}

/// Temporal web UI.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UISpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// Admin tools deployment.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminToolsSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// Default Temporal server image.
pub const DEFAULT_TEMPORAL_IMAGE: &str = "temporalio/server";
/// Default Temporal UI image.
pub const DEFAULT_UI_IMAGE: &str = "temporalio/ui";
/// Default Temporal UI version.
pub const DEFAULT_UI_VERSION: &str = "2.16.2";
/// Default admin tools image.
pub const DEFAULT_ADMINTOOLS_IMAGE: &str = "temporalio/admin-tools";
/// Default replicas per service.
pub const DEFAULT_REPLICAS: i32 = 1;
/// Default TTL for setup jobs.
pub const DEFAULT_JOB_TTL_SECONDS: i32 = 300;
/// Default mTLS certificate refresh interval.
pub const DEFAULT_MTLS_REFRESH_INTERVAL: &str = "1h";
/// Default validity of CA certificates (one year).
pub const DEFAULT_CA_CERTIFICATE_DURATION: &str = "8760h";
/// Default validity of leaf certificates (90 days).
pub const DEFAULT_LEAF_CERTIFICATE_DURATION: &str = "2160h";

/// Datastore names assigned by defaulting.
pub const DEFAULT_STORE_NAME: &str = "default";
pub const VISIBILITY_STORE_NAME: &str = "visibility";
pub const ADVANCED_VISIBILITY_STORE_NAME: &str = "advancedVisibility";
pub const SECONDARY_VISIBILITY_STORE_NAME: &str = "secondaryVisibility";

/// (grpc port, membership port, http port) per service.
const FRONTEND_PORTS: (i32, i32, Option<i32>) = (7233, 6933, Some(7243));
const INTERNAL_FRONTEND_PORTS: (i32, i32, Option<i32>) = (7236, 6936, None);
const HISTORY_PORTS: (i32, i32, Option<i32>) = (7234, 6934, None);
const MATCHING_PORTS: (i32, i32, Option<i32>) = (7235, 6935, None);
const WORKER_PORTS: (i32, i32, Option<i32>) = (7239, 6939, None);

impl TemporalCluster {
    /// True when metrics are turned on.
    pub fn metrics_enabled(&self) -> bool {
        self.spec.metrics.as_ref().is_some_and(|m| m.enabled)
    }

    /// True when mTLS is requested through cert-manager.
    pub fn mtls_with_cert_manager_enabled(&self) -> bool {
        self.spec
            .mtls
            .as_ref()
            .is_some_and(|m| m.provider == MTLSProvider::CertManager && m.is_requested())
    }

    /// Elasticsearch settings of the advanced visibility store, if any.
    pub fn advanced_visibility_elasticsearch(&self) -> Option<&ElasticsearchSpec> {
        self.spec
            .persistence
            .advanced_visibility_store
            .as_ref()
            .and_then(|store| store.elasticsearch.as_ref())
    }

    /// Fill every omitted optional field with its default value.
    ///
    /// Only unset values are written, so calling this on an already
    /// defaulted cluster is a no-op.
    pub fn apply_defaults(&mut self) {
        let cert_manager_mtls = self.mtls_with_cert_manager_enabled();
        let spec = &mut self.spec;

        if spec.image.is_empty() {
            spec.image = DEFAULT_TEMPORAL_IMAGE.to_string();
        }
        let replicas = *spec.number_of_replicas.get_or_insert(DEFAULT_REPLICAS);
        spec.job_ttl_seconds_after_finished
            .get_or_insert(DEFAULT_JOB_TTL_SECONDS);

        let log = spec.log.get_or_insert_with(|| LogSpec {
            stdout: true,
            ..Default::default()
        });
        if log.level.is_empty() {
            log.level = "info".to_string();
        }
        if log.format.is_empty() {
            log.format = "json".to_string();
        }

        let services = spec.services.get_or_insert_with(ServicesSpec::default);
        default_service(
            services.frontend.get_or_insert_with(ServiceSpec::default),
            replicas,
            FRONTEND_PORTS,
        );
        default_service(
            services.history.get_or_insert_with(ServiceSpec::default),
            replicas,
            HISTORY_PORTS,
        );
        default_service(
            services.matching.get_or_insert_with(ServiceSpec::default),
            replicas,
            MATCHING_PORTS,
        );
        default_service(
            services.worker.get_or_insert_with(ServiceSpec::default),
            replicas,
            WORKER_PORTS,
        );
        if let Some(internal) = services.internal_frontend.as_mut().filter(|s| s.enabled) {
            default_service(&mut internal.service, replicas, INTERNAL_FRONTEND_PORTS);
        }

        let persistence = &mut spec.persistence;
        for (store, name) in [
            (&mut persistence.default_store, DEFAULT_STORE_NAME),
            (&mut persistence.visibility_store, VISIBILITY_STORE_NAME),
            (
                &mut persistence.advanced_visibility_store,
                ADVANCED_VISIBILITY_STORE_NAME,
            ),
            (
                &mut persistence.secondary_visibility_store,
                SECONDARY_VISIBILITY_STORE_NAME,
            ),
        ] {
            if let Some(store) = store.as_mut() {
                if store.name.is_empty() {
                    store.name = name.to_string();
                }
            }
        }

        if let Some(ui) = spec.ui.as_mut().filter(|ui| ui.enabled) {
            if ui.image.is_empty() {
                ui.image = DEFAULT_UI_IMAGE.to_string();
            }
            if ui.version.is_empty() {
                ui.version = DEFAULT_UI_VERSION.to_string();
            }
            ui.replicas.get_or_insert(DEFAULT_REPLICAS);
        }

        if let Some(admintools) = spec.admintools.as_mut().filter(|a| a.enabled) {
            if admintools.image.is_empty() {
                admintools.image = DEFAULT_ADMINTOOLS_IMAGE.to_string();
            }
            if admintools.version.is_empty() {
                admintools.version = spec.version.to_string();
            }
        }

        if cert_manager_mtls {
            if let Some(mtls) = spec.mtls.as_mut() {
                mtls.refresh_interval
                    .get_or_insert_with(|| DEFAULT_MTLS_REFRESH_INTERVAL.to_string());
                let durations = mtls
                    .certificates_duration
                    .get_or_insert_with(CertificatesDurationSpec::default);
                for (slot, value) in [
                    (
                        &mut durations.root_ca_certificate,
                        DEFAULT_CA_CERTIFICATE_DURATION,
                    ),
                    (
                        &mut durations.intermediate_ca_certificates,
                        DEFAULT_CA_CERTIFICATE_DURATION,
                    ),
                    (
                        &mut durations.client_certificates,
                        DEFAULT_LEAF_CERTIFICATE_DURATION,
                    ),
                    (
                        &mut durations.frontend_certificate,
                        DEFAULT_LEAF_CERTIFICATE_DURATION,
                    ),
                    (
                        &mut durations.internode_certificate,
                        DEFAULT_LEAF_CERTIFICATE_DURATION,
                    ),
                ] {
                    slot.get_or_insert_with(|| value.to_string());
                }
            }
        }
    }
}

fn default_service(service: &mut ServiceSpec, replicas: i32, ports: (i32, i32, Option<i32>)) {
    let (port, membership_port, http_port) = ports;
    service.replicas.get_or_insert(replicas);
    service.port.get_or_insert(port);
    service.membership_port.get_or_insert(membership_port);
    if let Some(http_port) = http_port {
        service.http_port.get_or_insert(http_port);
    }
}
