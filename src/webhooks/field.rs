//! Field-level validation errors.
//!
//! Mirrors the shape of Kubernetes API validation errors: every problem is
//! anchored to a field path, has a kind, and carries a human-readable detail.
//! A non-empty [`ErrorList`] becomes a single [`Rejection`] naming the
//! resource, rendered the same way the API server renders `Invalid` errors.

use std::fmt;

/// Dotted path to a field, e.g. `spec.mTLS.provider`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    /// Build a path from its segments.
    pub fn new<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut path = String::new();
        for segment in segments {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
        }
        Self(path)
    }

    /// Path to a named child of this field.
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a field error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The value is not acceptable.
    Invalid { value: String },
    /// The value is well-formed but not allowed in this context.
    Forbidden,
}

impl ErrorKind {
    /// Short name, as used in Kubernetes status causes.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorKind::Invalid { .. } => "FieldValueInvalid",
            ErrorKind::Forbidden => "FieldValueForbidden",
        }
    }
}

/// A single validation failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: FieldPath,
    pub kind: ErrorKind,
    pub detail: String,
}

impl FieldError {
    pub fn invalid(path: FieldPath, value: impl fmt::Display, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind: ErrorKind::Invalid {
                value: value.to_string(),
            },
            detail: detail.into(),
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind: ErrorKind::Forbidden,
            detail: detail.into(),
        }
    }

    pub fn is_forbidden(&self) -> bool {
        self.kind == ErrorKind::Forbidden
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Invalid { value } => {
                write!(f, "{}: Invalid value: \"{}\"", self.path, value)?;
            }
            ErrorKind::Forbidden => write!(f, "{}: Forbidden", self.path)?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Ordered collection of validation failures.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// True if an error of the given kind exists at `path`.
    pub fn has(&self, path: &str, forbidden: bool) -> bool {
        self.0
            .iter()
            .any(|e| e.path.as_str() == path && e.is_forbidden() == forbidden)
    }

    /// Convert into a rejection for the named resource, or `None` when empty.
    pub fn into_rejection(self, group_kind: GroupKind, name: impl Into<String>) -> Option<Rejection> {
        if self.is_empty() {
            None
        } else {
            Some(Rejection {
                group_kind,
                name: name.into(),
                causes: self,
            })
        }
    }
}

impl From<Vec<FieldError>> for ErrorList {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [single] => write!(f, "{single}"),
            many => {
                f.write_str("[")?;
                for (i, error) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{error}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// API group and kind of a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Structured refusal of an admission request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub group_kind: GroupKind,
    pub name: String,
    pub causes: ErrorList,
}

impl Rejection {
    /// Reason string used in admission responses.
    pub const REASON: &'static str = "Invalid";
    /// HTTP code of the status sent back (Unprocessable Entity).
    pub const CODE: u16 = 422;
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" is invalid: {}",
            self.group_kind, self.name, self.causes
        )
    }
}
