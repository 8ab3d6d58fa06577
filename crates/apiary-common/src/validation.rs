//! Structured validation errors for declarative specs
//!
//! Field errors are accumulated into a [`FieldErrorList`] rather than
//! returned on first failure, so a user sees every problem with their object
//! in one status update. A [`SpecError`] classifies the list as either an
//! invalid spec or an orphaned reference and maps onto the matching status
//! condition.

use std::fmt;

use thiserror::Error;

use crate::crd::{Condition, ConditionStatus, CONDITION_INVALID, CONDITION_ORPHAN};

/// One problem with one field of a declarative object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g., "spec.metrics.hits")
    pub path: String,
    /// The offending value, rendered as a string
    pub value: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(
        path: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}: {}", self.path, self.message)
        } else {
            write!(f, "{}: Invalid value: \"{}\": {}", self.path, self.value, self.message)
        }
    }
}

/// Accumulator for field errors
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrorList(Vec<FieldError>);

impl FieldErrorList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field error
    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    /// Whether no errors were recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of recorded errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Convert into a `SpecError` of the given kind, or `Ok` if empty
    pub fn into_result(self, kind: SpecErrorKind) -> Result<(), SpecError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(SpecError::new(kind, self.0))
        }
    }
}

impl From<FieldErrorList> for Vec<FieldError> {
    fn from(list: FieldErrorList) -> Self {
        list.0
    }
}

/// Classification of a spec error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecErrorKind {
    /// The spec itself is malformed
    Invalid,
    /// The spec references something that does not exist (yet)
    Orphan,
}

impl SpecErrorKind {
    /// Condition type surfaced for this kind of error
    pub fn condition_type(&self) -> &'static str {
        match self {
            Self::Invalid => CONDITION_INVALID,
            Self::Orphan => CONDITION_ORPHAN,
        }
    }
}

/// A validation failure on a declarative object
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}", render(.errors))]
pub struct SpecError {
    /// Invalid or orphan
    pub kind: SpecErrorKind,
    /// Every field that failed
    pub errors: Vec<FieldError>,
}

fn render(errors: &[FieldError]) -> String {
    match errors {
        [] => "spec validation failed".to_string(),
        [single] => single.to_string(),
        many => format!(
            "[{}]",
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

impl SpecError {
    /// Create a spec error
    pub fn new(kind: SpecErrorKind, errors: Vec<FieldError>) -> Self {
        Self { kind, errors }
    }

    /// Whether this is an invalid-spec error
    pub fn is_invalid(&self) -> bool {
        self.kind == SpecErrorKind::Invalid
    }

    /// Whether this is an orphan-reference error
    pub fn is_orphan(&self) -> bool {
        self.kind == SpecErrorKind::Orphan
    }

    /// Status condition describing this error
    pub fn condition(&self) -> Condition {
        Condition::new(
            self.kind.condition_type(),
            ConditionStatus::True,
            self.kind.condition_type(),
            self.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_ok() {
        let list = FieldErrorList::new();
        assert!(list.is_empty());
        assert!(list.into_result(SpecErrorKind::Invalid).is_ok());
    }

    #[test]
    fn errors_are_accumulated_not_short_circuited() {
        let mut list = FieldErrorList::new();
        list.push(FieldError::new("spec.metrics.hits", "", "reserved"));
        list.push(FieldError::new("spec.methods.a", "a", "duplicated system name"));
        assert_eq!(list.len(), 2);

        let err = list.into_result(SpecErrorKind::Invalid).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.to_string().starts_with('['));
        assert!(err.to_string().contains("spec.methods.a"));
    }

    #[test]
    fn single_error_renders_without_brackets() {
        let err = SpecError::new(
            SpecErrorKind::Orphan,
            vec![FieldError::new("spec.backendUsages", "b1", "backend not found")],
        );
        assert_eq!(
            err.to_string(),
            "spec.backendUsages: Invalid value: \"b1\": backend not found"
        );
    }

    #[test]
    fn condition_matches_kind() {
        let invalid = SpecError::new(SpecErrorKind::Invalid, vec![]);
        assert!(invalid.is_invalid());
        assert_eq!(invalid.condition().type_, CONDITION_INVALID);

        let orphan = SpecError::new(SpecErrorKind::Orphan, vec![]);
        assert!(orphan.is_orphan());
        let cond = orphan.condition();
        assert_eq!(cond.type_, CONDITION_ORPHAN);
        assert_eq!(cond.status, ConditionStatus::True);
    }
}
