//! Legacy Elasticsearch compatibility policy.
//!
//! Tier 1 (Shared): Enforced on CREATE and UPDATE
//!
//! Validates:
//! - Elasticsearch v6 is not used as advanced visibility store with a
//!   Temporal version at or past the cutoff (1.18.0 by default)

use super::ValidationContext;
use crate::crd::ElasticsearchVersion;
use crate::webhooks::field::{ErrorList, FieldError, FieldPath};

/// Validate that the advanced visibility store is supported by the version
pub fn validate(ctx: &ValidationContext<'_>, errors: &mut ErrorList) {
    let cutoff = &ctx.policy.legacy_elasticsearch_cutoff;

    let uses_v6 = ctx
        .resource
        .advanced_visibility_elasticsearch()
        .is_some_and(|es| es.version == ElasticsearchVersion::V6);

    if uses_v6 && ctx.resource.spec.version.greater_or_equal(cutoff) {
        errors.push(FieldError::forbidden(
            FieldPath::new([
                "spec",
                "persistence",
                "advancedVisibilityStore",
                "elasticsearch",
                "version",
            ]),
            format!("temporal cluster version >= {cutoff} doesn't support ElasticSearch v6"),
        ));
    }
}
