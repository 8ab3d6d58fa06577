//! Shared types used across apiary resources

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Object is fully converged
pub const CONDITION_READY: &str = "Ready";
/// Last reconcile attempt failed
pub const CONDITION_FAILED: &str = "Failed";
/// Spec is malformed
pub const CONDITION_INVALID: &str = "Invalid";
/// Spec references something that does not exist
pub const CONDITION_ORPHAN: &str = "Orphan";
/// Waiting on a dependency
pub const CONDITION_WAITING: &str = "Waiting";
/// Remote entity matches the spec
pub const CONDITION_SYNCED: &str = "Synced";

/// Reference to a secret in the same namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretRef {
    /// Name of the secret
    pub name: String,
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, Synced)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Whether the condition has status True
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// A set of conditions kept in canonical order (sorted by type)
///
/// Equality ignores transition timestamps only when the caller chooses
/// [`ConditionSet::same_state`]; `PartialEq` compares the canonical JSON
/// form, which is what status writes are gated on.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from an arbitrary list, keeping the last entry per type
    pub fn from_conditions(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut set = Self::new();
        for c in conditions {
            set.set_condition(c);
        }
        set
    }

    /// Insert or replace a condition by type
    ///
    /// If a condition of the same type and status already exists, its
    /// transition time is preserved. Returns whether anything changed.
    pub fn set_condition(&mut self, mut condition: Condition) -> bool {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                if *existing == condition {
                    return false;
                }
                *existing = condition;
                true
            }
            None => {
                self.0.push(condition);
                self.0.sort_by(|a, b| a.type_.cmp(&b.type_));
                true
            }
        }
    }

    /// Remove a condition by type, returning whether it was present
    pub fn remove(&mut self, type_: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c.type_ != type_);
        before != self.0.len()
    }

    /// Look up a condition by type
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// Whether the condition of the given type exists with status True
    pub fn is_true_for(&self, type_: &str) -> bool {
        self.get(type_).is_some_and(Condition::is_true)
    }

    /// Conditions in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical serialized form used for equality decisions
    pub fn canonical_json(&self) -> String {
        let mut sorted = self.0.clone();
        sorted.sort_by(|a, b| a.type_.cmp(&b.type_));
        serde_json::to_string(&sorted).unwrap_or_default()
    }

    /// Compare type/status/reason/message only, ignoring timestamps
    pub fn same_state(&self, other: &Self) -> bool {
        let key = |s: &Self| -> BTreeMap<String, (ConditionStatus, String, String)> {
            s.0.iter()
                .map(|c| {
                    (
                        c.type_.clone(),
                        (c.status.clone(), c.reason.clone(), c.message.clone()),
                    )
                })
                .collect()
        };
        key(self) == key(other)
    }
}

impl PartialEq for ConditionSet {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_json() == other.canonical_json()
    }
}

impl From<Vec<Condition>> for ConditionSet {
    fn from(conditions: Vec<Condition>) -> Self {
        Self::from_conditions(conditions)
    }
}
