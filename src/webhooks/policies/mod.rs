//! Validation policies for TemporalCluster admission webhooks.
//!
//! Policies are organized into tiers:
//! - Tier 1 (Shared): Enforced on CREATE and UPDATE (mTLS capability,
//!   supported version, legacy Elasticsearch)
//! - Tier 2 (Update): Only enforced on UPDATE operations (sequential upgrade)
//!
//! Every applicable policy runs, so a single request reports all of its
//! problems at once.

pub mod elasticsearch;
pub mod mtls;
pub mod upgrade;
pub mod version_support;

use kube::{Resource, ResourceExt};

use crate::capabilities::CapabilitySnapshot;
use crate::crd::TemporalCluster;
use crate::version::VersionPolicy;
use crate::webhooks::error::Result;
use crate::webhooks::field::{ErrorList, GroupKind, Rejection};

/// Context for validation
pub struct ValidationContext<'a> {
    /// The resource being validated
    pub resource: &'a TemporalCluster,
    /// The old resource (for UPDATE operations)
    pub old_resource: Option<&'a TemporalCluster>,
    /// Supported versions and version milestones
    pub policy: &'a VersionPolicy,
    /// Integrations available in the cluster when the request arrived
    pub capabilities: CapabilitySnapshot,
}

impl<'a> ValidationContext<'a> {
    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        self.old_resource.is_some()
    }
}

/// Run all validation policies
///
/// Returns an error only when the request cannot be interpreted, e.g. the
/// stored version of an UPDATE is unparsable.
pub fn validate_all(ctx: &ValidationContext<'_>) -> Result<ErrorList> {
    let mut errors = ErrorList::new();

    // Tier 1: Shared validations
    validate_shared(ctx, &mut errors);

    // Tier 2: Update validations (only for UPDATE operations)
    if ctx.is_update() {
        upgrade::validate(ctx, &mut errors)?;
    }

    Ok(errors)
}

/// Policies enforced on both CREATE and UPDATE
fn validate_shared(ctx: &ValidationContext<'_>, errors: &mut ErrorList) {
    mtls::validate(ctx, errors);
    version_support::validate(ctx, errors);
    elasticsearch::validate(ctx, errors);
}

/// Validate a cluster being created.
pub fn validate_create(
    policy: &VersionPolicy,
    capabilities: CapabilitySnapshot,
    cluster: &TemporalCluster,
) -> ErrorList {
    let ctx = ValidationContext {
        resource: cluster,
        old_resource: None,
        policy,
        capabilities,
    };
    let mut errors = ErrorList::new();
    validate_shared(&ctx, &mut errors);
    errors
}

/// Validate an update from `old` to `new`.
pub fn validate_update(
    policy: &VersionPolicy,
    capabilities: CapabilitySnapshot,
    old: &TemporalCluster,
    new: &TemporalCluster,
) -> Result<ErrorList> {
    validate_all(&ValidationContext {
        resource: new,
        old_resource: Some(old),
        policy,
        capabilities,
    })
}

/// Deleting a cluster is always allowed.
pub fn validate_delete(_cluster: &TemporalCluster) -> ErrorList {
    ErrorList::new()
}

/// Turn the collected errors into a rejection naming the cluster.
pub fn aggregate(cluster: &TemporalCluster, errors: ErrorList) -> std::result::Result<(), Rejection> {
    let group_kind = GroupKind {
        group: TemporalCluster::group(&()).to_string(),
        kind: TemporalCluster::kind(&()).to_string(),
    };
    match errors.into_rejection(group_kind, cluster.name_any()) {
        Some(rejection) => Err(rejection),
        None => Ok(()),
    }
}
