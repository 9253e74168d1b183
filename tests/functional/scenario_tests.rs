//! End-to-end admission scenarios.

use temporal_webhook::capabilities::CapabilitySnapshot;
use temporal_webhook::crd::{ElasticsearchVersion, MTLSProvider, TemporalCluster};
use temporal_webhook::version::VersionPolicy;
use temporal_webhook::webhooks::{
    Admission, AdmissionDecision, AdmissionError, AdmissionPhase, Operation, Rejection,
};

use crate::common::fixtures::{TemporalClusterBuilder, cluster_at};

fn create(snapshot: CapabilitySnapshot, cluster: TemporalCluster) -> AdmissionDecision {
    let policy = VersionPolicy::default();
    Admission::new(&policy, snapshot)
        .run(&Operation::Create, None, Some(cluster))
        .unwrap()
}

fn update(old: TemporalCluster, new: TemporalCluster) -> AdmissionDecision {
    let policy = VersionPolicy::default();
    Admission::new(&policy, CapabilitySnapshot::all())
        .run(&Operation::Update, Some(old), Some(new))
        .unwrap()
}

fn rejection(decision: AdmissionDecision) -> Rejection {
    match decision {
        AdmissionDecision::Rejected(rejection) => rejection,
        other => panic!("Expected rejection, got {other:?}"),
    }
}

#[test]
fn test_create_unsupported_version_is_rejected() {
    let rejection = rejection(create(CapabilitySnapshot::all(), cluster_at("1.30.0")));
    assert!(rejection.causes.has("spec.version", true));
    assert_eq!(rejection.name, "test-cluster");
    assert!(
        rejection
            .to_string()
            .contains("Unsupported temporal version (supported: >= 1.17.0, < 1.24.0)")
    );
}

#[test]
fn test_sequential_upgrade_is_admitted() {
    let decision = update(cluster_at("1.17.5"), cluster_at("1.18.0"));
    assert_eq!(decision.phase(), AdmissionPhase::Admitted);
}

#[test]
fn test_skipping_a_minor_is_rejected() {
    let rejection = rejection(update(cluster_at("1.17.5"), cluster_at("1.19.0")));
    assert_eq!(rejection.causes.len(), 1);
    assert!(rejection.to_string().contains(
        "Only sequential version upgrades are allowed (from v1.n.x to v1.n+1.x)"
    ));
}

#[test]
fn test_resaving_same_version_is_rejected() {
    // An UPDATE that keeps the version has no upgrade step to match
    let rejection = rejection(update(cluster_at("1.20.0"), cluster_at("1.20.0")));
    assert!(rejection.causes.has("spec.version", true));
}

#[test]
fn test_corrupted_stored_version_is_hard_error() {
    let policy = VersionPolicy::default();
    let err = Admission::new(&policy, CapabilitySnapshot::all())
        .run(
            &Operation::Update,
            Some(cluster_at("one.seventeen")),
            Some(cluster_at("1.18.0")),
        )
        .unwrap_err();
    assert!(matches!(err, AdmissionError::MalformedVersion(_)));
}

#[test]
fn test_every_problem_reported_at_once() {
    let cluster = TemporalClusterBuilder::new("broken")
        .version("1.30.0")
        .mtls(MTLSProvider::CertManager)
        .elasticsearch(ElasticsearchVersion::V6)
        .build();

    let rejection = rejection(create(CapabilitySnapshot::default(), cluster));
    let paths: Vec<_> = rejection.causes.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "spec.mTLS.provider",
            "spec.version",
            "spec.persistence.advancedVisibilityStore.elasticsearch.version",
        ]
    );
}

#[test]
fn test_cert_manager_installed_later() {
    let cluster = TemporalClusterBuilder::new("secure")
        .mtls(MTLSProvider::CertManager)
        .build();

    let before = create(CapabilitySnapshot::default(), cluster.clone());
    assert_eq!(before.phase(), AdmissionPhase::Rejected);

    let after = create(
        CapabilitySnapshot::from_api_groups(["cert-manager.io"]),
        cluster,
    );
    assert_eq!(after.phase(), AdmissionPhase::Admitted);
}

#[test]
fn test_elasticsearch_v6_cutoff() {
    let old = TemporalClusterBuilder::new("search")
        .version("1.17.9")
        .elasticsearch(ElasticsearchVersion::V6)
        .build();
    assert!(create(CapabilitySnapshot::all(), old).is_admitted());

    let new = TemporalClusterBuilder::new("search")
        .version("1.18.0")
        .elasticsearch(ElasticsearchVersion::V6)
        .build();
    let rejection = rejection(create(CapabilitySnapshot::all(), new));
    assert!(rejection.causes.has(
        "spec.persistence.advancedVisibilityStore.elasticsearch.version",
        true
    ));
}

#[test]
fn test_admitted_object_is_defaulted() {
    let cluster = TemporalClusterBuilder::new("metrics")
        .prometheus_listen_address("0.0.0.0:9090")
        .build();

    match create(CapabilitySnapshot::all(), cluster) {
        AdmissionDecision::Admitted {
            object: Some(cluster),
        } => {
            let prometheus = cluster.spec.metrics.unwrap().prometheus.unwrap();
            assert_eq!(prometheus.listen_address, "");
            assert_eq!(prometheus.listen_port, Some(9090));
        }
        other => panic!("Expected admitted object, got {other:?}"),
    }
}

#[test]
fn test_malformed_address_is_hard_error() {
    let cluster = TemporalClusterBuilder::new("metrics")
        .prometheus_listen_address("not-an-address")
        .build();

    let policy = VersionPolicy::default();
    let err = Admission::new(&policy, CapabilitySnapshot::all())
        .run(&Operation::Create, None, Some(cluster))
        .unwrap_err();
    assert!(matches!(err, AdmissionError::MalformedAddress { .. }));
}

#[test]
fn test_delete_of_anything_is_admitted() {
    let policy = VersionPolicy::default();
    let decision = Admission::new(&policy, CapabilitySnapshot::default())
        .run(&Operation::Delete, Some(cluster_at("0.0.1")), None)
        .unwrap();
    assert!(decision.is_admitted());
}
