//! Temporal server version handling.
//!
//! `Version` keeps the string exactly as the user wrote it so that an
//! unparsable value survives decoding and can be reported on the right field.
//! Parsing is lenient: a leading `v` is stripped and partial versions
//! (`1.18`, `1`) are expanded to full semver.

use std::cmp::Ordering;
use std::fmt;

use schemars::JsonSchema;
use semver::{Comparator, Op, Prerelease, VersionReq};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Oldest minor release supported by default (`1.17.x`).
pub const DEFAULT_MIN_SUPPORTED: semver::Version = semver::Version::new(1, 17, 0);

/// Newest minor release supported by default (`1.23.x`).
pub const DEFAULT_MAX_SUPPORTED: semver::Version = semver::Version::new(1, 23, 0);

/// First release that dropped support for Elasticsearch v6 as a visibility store.
pub const V1_18_0: semver::Version = semver::Version::new(1, 18, 0);

/// Errors produced while interpreting a Temporal version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The string is not a semantic version.
    #[error("malformed version '{version}': {reason}")]
    Malformed { version: String, reason: String },

    /// The version parsed but lies outside the supported range.
    #[error("version {version} is outside the supported range ({range})")]
    Unsupported { version: String, range: String },
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// A Temporal server version as written in `spec.version`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw string as supplied by the user.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into a strict semantic version.
    pub fn parse(&self) -> Result<semver::Version> {
        let trimmed = self.0.trim();
        let unprefixed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let core_len = unprefixed.find(['-', '+']).unwrap_or(unprefixed.len());
        let (core, suffix) = unprefixed.split_at(core_len);
        let normalized = match core.matches('.').count() {
            0 => format!("{core}.0.0{suffix}"),
            1 => format!("{core}.0{suffix}"),
            _ => unprefixed.to_string(),
        };

        semver::Version::parse(&normalized).map_err(|e| VersionError::Malformed {
            version: self.0.clone(),
            reason: e.to_string(),
        })
    }

    /// Check the version against the supported range.
    pub fn validate(&self, range: &SupportedRange) -> Result<()> {
        let parsed = self.parse()?;
        if range.contains(&parsed) {
            Ok(())
        } else {
            Err(VersionError::Unsupported {
                version: self.0.clone(),
                range: range.to_string(),
            })
        }
    }

    /// True iff this version is at or past `milestone`.
    ///
    /// A version that cannot be parsed is never considered past a milestone.
    pub fn greater_or_equal(&self, milestone: &semver::Version) -> bool {
        self.parse()
            .is_ok_and(|v| cmp_release(&v, milestone) != Ordering::Less)
    }

    /// Versions reachable from this one in a single upgrade step.
    pub fn upgrade_constraint(&self) -> Result<UpgradeConstraint> {
        let parsed = self.parse()?;
        let next_minor = parsed.minor.checked_add(1).ok_or_else(|| VersionError::Malformed {
            version: self.0.clone(),
            reason: "minor version overflow".to_string(),
        })?;

        Ok(UpgradeConstraint {
            req: VersionReq {
                comparators: vec![Comparator {
                    op: Op::Tilde,
                    major: parsed.major,
                    minor: Some(next_minor),
                    patch: None,
                    pre: Prerelease::EMPTY,
                }],
            },
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<semver::Version> for Version {
    fn from(v: semver::Version) -> Self {
        Self(v.to_string())
    }
}

/// Compare on (major, minor, patch) only, ignoring pre-release and build data.
fn cmp_release(a: &semver::Version, b: &semver::Version) -> Ordering {
    (a.major, a.minor, a.patch).cmp(&(b.major, b.minor, b.patch))
}

/// Matcher for the next minor release line (`~major.minor+1`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeConstraint {
    req: VersionReq,
}

impl UpgradeConstraint {
    /// True iff `candidate` has the same major and exactly the next minor.
    ///
    /// Unparsable candidates never match.
    pub fn check(&self, candidate: &Version) -> bool {
        candidate.parse().is_ok_and(|v| {
            let release = semver::Version::new(v.major, v.minor, v.patch);
            self.req.matches(&release)
        })
    }
}

impl fmt::Display for UpgradeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.req)
    }
}

/// Range of supported minor releases, inclusive on both ends, any patch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupportedRange {
    min: semver::Version,
    max: semver::Version,
}

impl SupportedRange {
    /// Build a range from the oldest and newest supported minor releases.
    ///
    /// Patch components of the bounds are ignored. Bounds given in the wrong
    /// order are swapped.
    pub fn new(min: semver::Version, max: semver::Version) -> Self {
        let min = semver::Version::new(min.major, min.minor, 0);
        let max = semver::Version::new(max.major, max.minor, 0);
        if cmp_release(&min, &max) == Ordering::Greater {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn contains(&self, v: &semver::Version) -> bool {
        let minor_line = semver::Version::new(v.major, v.minor, 0);
        cmp_release(&minor_line, &self.min) != Ordering::Less
            && cmp_release(&minor_line, &self.max) != Ordering::Greater
    }

    pub fn min(&self) -> &semver::Version {
        &self.min
    }

    pub fn max(&self) -> &semver::Version {
        &self.max
    }
}

impl Default for SupportedRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SUPPORTED, DEFAULT_MAX_SUPPORTED)
    }
}

impl fmt::Display for SupportedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ">= {}.{}.0, < {}.{}.0",
            self.min.major,
            self.min.minor,
            self.max.major,
            self.max.minor.saturating_add(1)
        )
    }
}

/// Process-wide version rules: the supported range and named milestones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionPolicy {
    pub supported: SupportedRange,
    /// Versions at or above this no longer accept Elasticsearch v6.
    pub legacy_elasticsearch_cutoff: semver::Version,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            supported: SupportedRange::default(),
            legacy_elasticsearch_cutoff: V1_18_0,
        }
    }
}
