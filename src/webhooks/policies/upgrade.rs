//! Sequential upgrade policy.
//!
//! Tier 2 (Update): Only enforced on UPDATE operations
//!
//! Validates:
//! - The new version is in the minor release line right after the old one
//!   (from v1.n.x to v1.n+1.x)
//!
//! Temporal only supports upgrading one minor version at a time. See
//! <https://docs.temporal.io/cluster-deployment-guide#upgrade-server>.
//!
//! Saving an UPDATE with an unchanged version is rejected as well: there is
//! no upgrade step from a version to itself.

use super::ValidationContext;
use crate::webhooks::error::{AdmissionError, Result};
use crate::webhooks::field::{ErrorList, FieldError, FieldPath};

/// Validate that the version change is a single sequential upgrade
///
/// Fails hard when the stored version cannot be parsed, since that means the
/// persisted object is corrupted rather than the request being wrong.
pub fn validate(ctx: &ValidationContext<'_>, errors: &mut ErrorList) -> Result<()> {
    let Some(old) = ctx.old_resource else {
        return Ok(()); // Not an UPDATE
    };

    let constraint = old
        .spec
        .version
        .upgrade_constraint()
        .map_err(AdmissionError::MalformedVersion)?;

    let new_version = &ctx.resource.spec.version;
    if !constraint.check(new_version) {
        tracing::debug!(
            old_version = %old.spec.version,
            new_version = %new_version,
            allowed = %constraint,
            "Non-sequential version upgrade"
        );
        errors.push(FieldError::forbidden(
            FieldPath::new(["spec", "version"]),
            "Unauthorized version upgrade. Only sequential version upgrades are allowed (from v1.n.x to v1.n+1.x)",
        ));
    }

    Ok(())
}
