//! Error types for the admission webhook.
//!
//! These are hard failures: the request could not be interpreted at all.
//! Policy violations are not errors; they are collected in an
//! [`ErrorList`](super::field::ErrorList) and returned as a
//! [`Rejection`](super::field::Rejection).

use thiserror::Error;

use crate::version::VersionError;
use crate::webhooks::admission::{AdmissionEvent, AdmissionPhase};

/// Failure while defaulting or validating an admission request
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The deprecated Prometheus listen address is not a `host:port` pair
    #[error("can't parse prometheus spec.metrics.prometheus.listenAddress '{address}': {reason}")]
    MalformedAddress { address: String, reason: String },

    /// A stored version could not be parsed
    #[error("can't compute version upgrade constraint: {0}")]
    MalformedVersion(#[source] VersionError),

    /// The admission request carries no object
    #[error("missing object in admission request")]
    MissingObject,

    /// The defaulted object could not be turned into a patch
    #[error("can't build defaulting patch: {0}")]
    Patch(String),

    /// The admission state machine was driven along an edge it does not have
    #[error("invalid admission transition from {from} on {event}")]
    InvalidTransition {
        from: AdmissionPhase,
        event: AdmissionEvent,
    },
}

impl AdmissionError {
    /// Short machine-readable reason, used in denial messages and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::MalformedAddress { .. } => "MalformedAddress",
            AdmissionError::MalformedVersion(_) => "MalformedVersion",
            AdmissionError::MissingObject => "InvalidRequest",
            AdmissionError::Patch(_) => "PatchError",
            AdmissionError::InvalidTransition { .. } => "InternalError",
        }
    }
}

/// Result type alias for admission operations
pub type Result<T> = std::result::Result<T, AdmissionError>;

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}
