// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for TemporalCluster admission.
//!
//! These tests drive whole admission requests WITHOUT a live Kubernetes
//! cluster: either through [`Admission`](temporal_webhook::webhooks::Admission)
//! directly or through the axum router with `tower::ServiceExt::oneshot`.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_skipping_a_minor_is_rejected
//! ```
//!
//! ## Test Categories
//!
//! - **Scenario tests**: create/update/delete sequences against the default
//!   supported range (1.17 to 1.23)
//! - **Router tests**: AdmissionReview bodies posted to both endpoints

#[path = "../common/mod.rs"]
mod common;

mod router_tests;
mod scenario_tests;
