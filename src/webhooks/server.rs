//! Admission webhook server.
//!
//! Provides HTTP endpoints for Kubernetes admission webhooks:
//! - `/mutate-temporal-io-v1beta1-temporalcluster`: defaulting, answered
//!   with a JSON patch
//! - `/validate-temporal-io-v1beta1-temporalcluster`: validation
//!
//! To enable webhooks:
//! 1. Deploy cert-manager (or any issuer) for the serving certificate
//! 2. Create the MutatingWebhookConfiguration and ValidatingWebhookConfiguration
//! 3. Mount the TLS certificate secret at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use kube::core::DynamicObject;
use kube::core::Status;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::response::{StatusCause, StatusDetails};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::capabilities::CapabilitySnapshot;
use crate::crd::TemporalCluster;
use crate::health::HealthState;
use crate::version::VersionPolicy;
use crate::webhooks::admission::{Admission, AdmissionDecision};
use crate::webhooks::error::{AdmissionError, WebhookError};
use crate::webhooks::field::Rejection;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Path of the defaulting endpoint
pub const MUTATE_PATH: &str = "/mutate-temporal-io-v1beta1-temporalcluster";
/// Path of the validation endpoint
pub const VALIDATE_PATH: &str = "/validate-temporal-io-v1beta1-temporalcluster";

type ReviewResponse = (StatusCode, Json<AdmissionReview<DynamicObject>>);

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Supported versions and milestones
    pub policy: VersionPolicy,
    /// Latest capability snapshot published by discovery
    pub capabilities: watch::Receiver<CapabilitySnapshot>,
    /// Metrics sink, if the health server runs
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(
        policy: VersionPolicy,
        capabilities: watch::Receiver<CapabilitySnapshot>,
        health: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            policy,
            capabilities,
            health,
        }
    }

    fn admission(&self) -> Admission<'_> {
        // Copy out so the watch lock is released right away
        let snapshot = *self.capabilities.borrow();
        Admission::new(&self.policy, snapshot)
    }

    fn record(&self, operation: &Operation, endpoint: &str, outcome: &str, started: Instant) {
        if let Some(ref health) = self.health {
            health.metrics.record_admission(
                operation_label(operation),
                endpoint,
                outcome,
                started.elapsed().as_secs_f64(),
            );
        }
    }
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason(
    request: &AdmissionRequest<TemporalCluster>,
    message: &str,
    reason: &str,
) -> AdmissionReview<DynamicObject> {
    let full_message = format!("[{}] {}", reason, message);
    AdmissionResponse::from(request)
        .deny(full_message)
        .into_review()
}

/// Create a denial carrying the full `Invalid` status, one cause per field error
fn deny_rejection(
    request: &AdmissionRequest<TemporalCluster>,
    rejection: &Rejection,
) -> AdmissionReview<DynamicObject> {
    let message = rejection.to_string();
    let causes = rejection
        .causes
        .iter()
        .map(|error| StatusCause {
            reason: error.kind.reason().to_string(),
            message: error.detail.clone(),
            field: error.path.to_string(),
        })
        .collect();

    let mut response = AdmissionResponse::from(request).deny(&message);
    response.result = Status::failure(&message, Rejection::REASON)
        .with_code(Rejection::CODE)
        .with_details(StatusDetails {
            name: rejection.name.clone(),
            group: rejection.group_kind.group.clone(),
            kind: rejection.group_kind.kind.clone(),
            uid: String::new(),
            causes,
            retry_after_seconds: 0,
        });
    response.into_review()
}

/// Turn the raw body into a typed request, or the 400 response to send back
fn decode_request(
    body: Result<Json<AdmissionReview<TemporalCluster>>, JsonRejection>,
) -> Result<AdmissionRequest<TemporalCluster>, ReviewResponse> {
    let bad_request = |message: String| {
        error!(error = %message, "Failed to extract admission request");
        (
            StatusCode::BAD_REQUEST,
            Json(AdmissionResponse::invalid(message).into_review()),
        )
    };

    let Json(review) = body.map_err(|e| bad_request(format!("Invalid AdmissionReview: {e}")))?;
    review
        .try_into()
        .map_err(|e| bad_request(format!("Invalid AdmissionReview: {e}")))
}

/// Build an allowing response carrying the patch from `original` to `defaulted`
fn patch_response(
    request: &AdmissionRequest<TemporalCluster>,
    original: &TemporalCluster,
    defaulted: &TemporalCluster,
) -> Result<AdmissionResponse, AdmissionError> {
    let before =
        serde_json::to_value(original).map_err(|e| AdmissionError::Patch(e.to_string()))?;
    let after =
        serde_json::to_value(defaulted).map_err(|e| AdmissionError::Patch(e.to_string()))?;
    let patch = json_patch::diff(&before, &after);

    if patch.0.is_empty() {
        return Ok(AdmissionResponse::from(request));
    }

    debug!(operations = patch.0.len(), "Sending defaulting patch");
    AdmissionResponse::from(request)
        .with_patch(patch)
        .map_err(|e| AdmissionError::Patch(e.to_string()))
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_temporal_cluster))
        .route(VALIDATE_PATH, post(validate_temporal_cluster))
        .with_state(state)
}

/// Defaulting admission webhook handler
async fn mutate_temporal_cluster(
    State(state): State<Arc<WebhookState>>,
    body: Result<Json<AdmissionReview<TemporalCluster>>, JsonRejection>,
) -> ReviewResponse {
    let started = Instant::now();
    let request = match decode_request(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing defaulting request"
    );

    let admission = state.admission();
    let result = admission
        .mutate(&request.operation, request.object.clone())
        .and_then(|defaulted| match (&request.object, defaulted) {
            (Some(original), Some(defaulted)) => patch_response(&request, original, &defaulted),
            _ => Ok(AdmissionResponse::from(&request)),
        });

    match result {
        Ok(response) => {
            info!(uid = %uid, "Defaulting request allowed");
            state.record(&request.operation, "mutate", "allowed", started);
            (StatusCode::OK, Json(response.into_review()))
        }
        Err(e) => {
            warn!(uid = %uid, reason = e.reason(), error = %e, "Defaulting request failed");
            state.record(&request.operation, "mutate", "error", started);
            (
                StatusCode::OK,
                Json(deny_with_reason(&request, &e.to_string(), e.reason())),
            )
        }
    }
}

/// Validating admission webhook handler
async fn validate_temporal_cluster(
    State(state): State<Arc<WebhookState>>,
    body: Result<Json<AdmissionReview<TemporalCluster>>, JsonRejection>,
) -> ReviewResponse {
    let started = Instant::now();
    let request = match decode_request(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    let admission = state.admission();
    let result = admission.run(
        &request.operation,
        request.old_object.clone(),
        request.object.clone(),
    );

    match result {
        Ok(AdmissionDecision::Admitted { .. }) => {
            info!(uid = %uid, "Admission request allowed");
            state.record(&request.operation, "validate", "allowed", started);
            (
                StatusCode::OK,
                Json(AdmissionResponse::from(&request).into_review()),
            )
        }
        Ok(AdmissionDecision::Rejected(rejection)) => {
            warn!(uid = %uid, causes = rejection.causes.len(), message = %rejection, "Admission request denied");
            state.record(&request.operation, "validate", "denied", started);
            (StatusCode::OK, Json(deny_rejection(&request, &rejection)))
        }
        Err(e) => {
            error!(uid = %uid, reason = e.reason(), error = %e, "Admission request could not be interpreted");
            state.record(&request.operation, "validate", "error", started);
            (
                StatusCode::OK,
                Json(deny_with_reason(&request, &e.to_string(), e.reason())),
            )
        }
    }
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:port` and serves both admission endpoints.
/// TLS certificates are loaded from the given PEM files.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    port: u16,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
