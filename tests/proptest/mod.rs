// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for temporal-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use proptest::prelude::*;

use temporal_webhook::capabilities::CapabilitySnapshot;
use temporal_webhook::crd::{ElasticsearchVersion, MTLSProvider, TemporalCluster};
use temporal_webhook::version::{Version, VersionPolicy};
use temporal_webhook::webhooks::defaulting::default_cluster;
use temporal_webhook::webhooks::policies::{validate_create, validate_delete};
use temporal_webhook::webhooks::{Admission, AdmissionDecision, Operation};

use common::fixtures::TemporalClusterBuilder;

/// Strategy for release versions in the 1.x line.
fn release() -> impl Strategy<Value = (u64, u64, u64)> {
    (1..=1u64, 0..=40u64, 0..=20u64)
}

/// Strategy for hosts accepted in a `host:port` address.
fn host() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("0.0.0.0".to_string()),
        Just("[::1]".to_string()),
        "[a-z][a-z0-9-]{0,20}",
        (0..=255u8, 0..=255u8, 0..=255u8, 0..=255u8)
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}")),
    ]
}

fn any_provider() -> impl Strategy<Value = Option<MTLSProvider>> {
    prop_oneof![
        Just(None),
        Just(Some(MTLSProvider::CertManager)),
        Just(Some(MTLSProvider::Linkerd)),
        Just(Some(MTLSProvider::Istio)),
    ]
}

fn any_elasticsearch() -> impl Strategy<Value = Option<ElasticsearchVersion>> {
    prop_oneof![
        Just(None),
        Just(Some(ElasticsearchVersion::V6)),
        Just(Some(ElasticsearchVersion::V7)),
        Just(Some(ElasticsearchVersion::V8)),
    ]
}

/// Strategy for clusters that default successfully.
fn any_cluster() -> impl Strategy<Value = TemporalCluster> {
    (
        release(),
        prop::option::of((host(), 1..=65535i32)),
        any::<bool>(),
        any_provider(),
        any_elasticsearch(),
    )
        .prop_map(|((major, minor, patch), address, metrics_on, mtls, es)| {
            let mut builder =
                TemporalClusterBuilder::new("prop").version(format!("{major}.{minor}.{patch}"));
            if let Some((host, port)) = address {
                builder = builder.prometheus_listen_address(format!("{host}:{port}"));
                if !metrics_on {
                    builder = builder.metrics_disabled();
                }
            }
            if let Some(provider) = mtls {
                builder = builder.mtls(provider);
            }
            if let Some(es) = es {
                builder = builder.elasticsearch(es);
            }
            builder.build()
        })
}

proptest! {
    /// Property: defaulting twice is the same as defaulting once.
    #[test]
    fn test_defaulting_is_idempotent(cluster in any_cluster()) {
        let mut once = cluster;
        default_cluster(&mut once).unwrap();
        let mut twice = once.clone();
        default_cluster(&mut twice).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: a valid legacy address always becomes an empty address and
    /// the numeric port.
    #[test]
    fn test_listen_address_migrates_to_port(host in host(), port in 0..=65535i32) {
        let mut cluster = TemporalClusterBuilder::new("prop")
            .prometheus_listen_address(format!("{host}:{port}"))
            .build();
        default_cluster(&mut cluster).unwrap();

        let prometheus = cluster.spec.metrics.unwrap().prometheus.unwrap();
        prop_assert_eq!(prometheus.listen_address, "");
        prop_assert_eq!(prometheus.listen_port, Some(port));
    }

    /// Property: an address without a colon fails and leaves the cluster as is.
    #[test]
    fn test_address_without_port_is_rejected(address in "[a-z0-9.]{1,30}") {
        let mut cluster = TemporalClusterBuilder::new("prop")
            .prometheus_listen_address(address)
            .build();
        let before = cluster.clone();
        prop_assert!(default_cluster(&mut cluster).is_err());
        prop_assert_eq!(cluster, before);
    }

    /// Property: the upgrade constraint of M.m.p matches exactly M.(m+1).*
    #[test]
    fn test_upgrade_constraint_law(from in release(), to in release()) {
        let constraint = Version::new(format!("{}.{}.{}", from.0, from.1, from.2))
            .upgrade_constraint()
            .unwrap();
        let candidate = Version::new(format!("{}.{}.{}", to.0, to.1, to.2));
        let expected = to.0 == from.0 && to.1 == from.1 + 1;
        prop_assert_eq!(constraint.check(&candidate), expected);
    }

    /// Property: any two versions are comparable.
    #[test]
    fn test_version_order_is_total(a in release(), b in release()) {
        let va = Version::new(format!("{}.{}.{}", a.0, a.1, a.2));
        let vb = Version::new(format!("{}.{}.{}", b.0, b.1, b.2));
        let sa = va.parse().unwrap();
        let sb = vb.parse().unwrap();
        prop_assert!(va.greater_or_equal(&sb) || vb.greater_or_equal(&sa));
        if va.greater_or_equal(&sb) && vb.greater_or_equal(&sa) {
            prop_assert_eq!(sa, sb);
        }
    }

    /// Property: out-of-range versions are always forbidden on create.
    #[test]
    fn test_out_of_range_version_always_forbidden(minor in 24..=99u64, patch in 0..=20u64) {
        let cluster = TemporalClusterBuilder::new("prop")
            .version(format!("1.{minor}.{patch}"))
            .build();
        let errors = validate_create(&VersionPolicy::default(), CapabilitySnapshot::all(), &cluster);
        prop_assert!(errors.has("spec.version", true));
    }

    /// Property: the cert-manager gate follows the snapshot.
    #[test]
    fn test_cert_manager_gate_follows_snapshot(cluster in any_cluster(), available in any::<bool>()) {
        let snapshot = CapabilitySnapshot { cert_manager: available, ..Default::default() };
        let errors = validate_create(&VersionPolicy::default(), snapshot, &cluster);
        let expected = !available && cluster.mtls_with_cert_manager_enabled();
        prop_assert_eq!(errors.has("spec.mTLS.provider", true), expected);
    }

    /// Property: deletes are always admitted.
    #[test]
    fn test_delete_always_admitted(cluster in any_cluster()) {
        prop_assert!(validate_delete(&cluster).is_empty());

        let policy = VersionPolicy::default();
        let admission = Admission::new(&policy, CapabilitySnapshot::default());
        let decision = admission.run(&Operation::Delete, Some(cluster), None).unwrap();
        prop_assert_eq!(decision, AdmissionDecision::Admitted { object: None });
    }
}
