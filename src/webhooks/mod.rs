//! Admission webhooks for TemporalCluster resources.
//!
//! A mutating endpoint defaults requests and a validating endpoint checks
//! them with tiered policies:
//! - Tier 1 (Shared): CREATE and UPDATE (mTLS capability, supported version,
//!   legacy Elasticsearch)
//! - Tier 2 (Update): UPDATE only (sequential upgrades)

pub mod admission;
pub mod defaulting;
pub mod error;
pub mod field;
pub mod policies;
mod server;

pub use admission::{Admission, AdmissionDecision, AdmissionPhase};
pub use error::{AdmissionError, WebhookError};
pub use field::{ErrorList, FieldError, FieldPath, Rejection};
pub use policies::ValidationContext;
pub use server::{
    MUTATE_PATH, VALIDATE_PATH, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookState,
    create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
