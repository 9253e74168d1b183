//! mTLS provider capability policy.
//!
//! Tier 1 (Shared): Enforced on CREATE and UPDATE
//!
//! Validates:
//! - The integration required by the requested mTLS provider is installed
//!   in the cluster (cert-manager for the `cert-manager` provider)

use super::ValidationContext;
use crate::capabilities::required_capability;
use crate::webhooks::field::{ErrorList, FieldError, FieldPath};

/// Validate that the mTLS provider can be served by this cluster
pub fn validate(ctx: &ValidationContext<'_>, errors: &mut ErrorList) {
    let Some(mtls) = ctx.resource.spec.mtls.as_ref() else {
        return;
    };
    if !mtls.is_requested() {
        return;
    }

    let Some(capability) = required_capability(mtls.provider) else {
        return;
    };

    if !ctx.capabilities.is_available(capability) {
        errors.push(FieldError::forbidden(
            FieldPath::new(["spec", "mTLS", "provider"]),
            format!(
                "Can't use {} as mTLS provider as it's not available in the cluster",
                mtls.provider
            ),
        ));
    }
}
