//! Supported version policy.
//!
//! Tier 1 (Shared): Enforced on CREATE and UPDATE
//!
//! Validates:
//! - `spec.version` lies within the supported version range

use super::ValidationContext;
use crate::webhooks::field::{ErrorList, FieldError, FieldPath};

/// Validate that the cluster version is a supported one
pub fn validate(ctx: &ValidationContext<'_>, errors: &mut ErrorList) {
    let supported = &ctx.policy.supported;
    if let Err(e) = ctx.resource.spec.version.validate(supported) {
        tracing::debug!(error = %e, "Unsupported temporal version");
        errors.push(FieldError::forbidden(
            FieldPath::new(["spec", "version"]),
            format!("Unsupported temporal version (supported: {supported})"),
        ));
    }
}
