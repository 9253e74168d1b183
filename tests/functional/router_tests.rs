//! AdmissionReview round trips through the webhook router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::watch;
use tower::ServiceExt;

use temporal_webhook::capabilities::CapabilitySnapshot;
use temporal_webhook::crd::MTLSProvider;
use temporal_webhook::health::HealthState;
use temporal_webhook::version::VersionPolicy;
use temporal_webhook::webhooks::{MUTATE_PATH, VALIDATE_PATH, WebhookState, create_webhook_router};

use crate::common::fixtures::{TemporalClusterBuilder, admission_review, cluster_at};

struct Harness {
    app: Router,
    health: Arc<HealthState>,
    snapshot: watch::Sender<CapabilitySnapshot>,
}

impl Harness {
    fn new(snapshot: CapabilitySnapshot) -> Self {
        let (tx, rx) = watch::channel(snapshot);
        let health = Arc::new(HealthState::new());
        let state = Arc::new(WebhookState::new(
            VersionPolicy::default(),
            rx,
            Some(health.clone()),
        ));
        Self {
            app: create_webhook_router(state),
            health,
            snapshot: tx,
        }
    }

    async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::post(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}

#[tokio::test]
async fn test_create_out_of_range_denied() {
    let harness = Harness::new(CapabilitySnapshot::all());
    let cluster = cluster_at("1.30.0");

    let (status, review) = harness
        .post(VALIDATE_PATH, &admission_review("CREATE", Some(&cluster), None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["uid"], "uid-test-cluster");
    assert_eq!(review["response"]["allowed"], false);
    let status = &review["response"]["status"];
    assert_eq!(status["code"], 422);
    assert_eq!(status["reason"], "Invalid");
    let message = status["message"].as_str().unwrap();
    assert!(message.contains("TemporalCluster.temporal.io \"test-cluster\" is invalid"));
    assert!(message.contains("spec.version: Forbidden"));

    let details = &status["details"];
    assert_eq!(details["name"], "test-cluster");
    assert_eq!(details["causes"][0]["field"], "spec.version");
    assert_eq!(details["causes"][0]["reason"], "FieldValueForbidden");
}

#[tokio::test]
async fn test_update_sequence() {
    let harness = Harness::new(CapabilitySnapshot::all());
    let old = cluster_at("1.17.5");

    let allowed = cluster_at("1.18.0");
    let (_, review) = harness
        .post(
            VALIDATE_PATH,
            &admission_review("UPDATE", Some(&allowed), Some(&old)),
        )
        .await;
    assert_eq!(review["response"]["allowed"], true);

    let skipped = cluster_at("1.19.0");
    let (_, review) = harness
        .post(
            VALIDATE_PATH,
            &admission_review("UPDATE", Some(&skipped), Some(&old)),
        )
        .await;
    assert_eq!(review["response"]["allowed"], false);
}

#[tokio::test]
async fn test_capability_change_is_picked_up() {
    let harness = Harness::new(CapabilitySnapshot::default());
    let cluster = TemporalClusterBuilder::new("secure")
        .mtls(MTLSProvider::CertManager)
        .build();
    let body = admission_review("CREATE", Some(&cluster), None);

    let (_, review) = harness.post(VALIDATE_PATH, &body).await;
    assert_eq!(review["response"]["allowed"], false);

    harness
        .snapshot
        .send(CapabilitySnapshot::from_api_groups(["cert-manager.io"]))
        .unwrap();
    let (_, review) = harness.post(VALIDATE_PATH, &body).await;
    assert_eq!(review["response"]["allowed"], true);
}

#[tokio::test]
async fn test_mutate_patches_legacy_address() {
    let harness = Harness::new(CapabilitySnapshot::all());
    let cluster = TemporalClusterBuilder::new("metrics")
        .prometheus_listen_address("127.0.0.1:9090")
        .build();

    let (status, review) = harness
        .post(MUTATE_PATH, &admission_review("CREATE", Some(&cluster), None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], true);
    assert_eq!(review["response"]["patchType"], "JSONPatch");
}

#[tokio::test]
async fn test_mutate_delete_has_no_patch() {
    let harness = Harness::new(CapabilitySnapshot::all());
    let cluster = cluster_at("1.20.0");

    let (_, review) = harness
        .post(MUTATE_PATH, &admission_review("DELETE", None, Some(&cluster)))
        .await;

    assert_eq!(review["response"]["allowed"], true);
    assert!(review["response"].get("patch").is_none_or(Value::is_null));
}

#[tokio::test]
async fn test_wrong_kind_is_bad_request() {
    let harness = Harness::new(CapabilitySnapshot::all());
    let mut body = admission_review("CREATE", Some(&cluster_at("1.20.0")), None);
    // A ConfigMap has no spec.version
    body["request"]["object"] = serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "cm"},
        "data": {"a": "b"}
    });

    let (status, review) = harness.post(VALIDATE_PATH, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(review["response"]["allowed"], false);
}

#[tokio::test]
async fn test_requests_are_counted() {
    let harness = Harness::new(CapabilitySnapshot::all());
    let cluster = cluster_at("1.30.0");
    harness
        .post(VALIDATE_PATH, &admission_review("CREATE", Some(&cluster), None))
        .await;

    let metrics = harness.health.metrics.encode();
    assert!(metrics.contains("temporal_webhook_admission_requests_total"));
    assert!(metrics.contains("outcome=\"denied\""));
    assert!(metrics.contains("operation=\"CREATE\""));
}
