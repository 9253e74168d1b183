//! temporal-webhook library crate
//!
//! Admission control for `TemporalCluster` resources: defaulting, tiered
//! validation, capability discovery and the HTTP transport that serves them.

pub mod capabilities;
pub mod config;
pub mod crd;
pub mod health;
pub mod version;
pub mod webhooks;

pub use config::Config;
pub use health::HealthState;
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    run_webhook_server,
};
