//! Error types for apiary
//!
//! Errors are structured with fields to aid debugging in production. Store
//! and portal failures carry the identity of the operation that failed so the
//! external scheduler logs enough to retry meaningfully.

use thiserror::Error;

use crate::validation::SpecError;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// HTTP status the portal uses for missing entities
const HTTP_NOT_FOUND: u16 = 404;

/// Main error type for apiary operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Object does not exist in the backing store
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Name (or namespace/name) of the missing object
        name: String,
    },

    /// Remote management API error
    #[error("portal error [{context}]: {message}")]
    Portal {
        /// HTTP status, when the request reached the server
        status: Option<u16>,
        /// Description of what failed
        message: String,
        /// Operation identity (e.g., "backend [foo] create method")
        context: String,
    },

    /// A hard precondition did not hold
    #[error("precondition failed [{context}]: {message}")]
    Precondition {
        /// Where the precondition was checked
        context: String,
        /// Description of the violated invariant
        message: String,
    },

    /// Declarative spec failed validation
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// No provider account strategy produced credentials
    #[error("no provider account found in namespace {namespace}")]
    NoProviderAccount {
        /// Namespace the lookup ran in
        namespace: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

impl Error {
    /// Create a not-found error for an object of the given kind
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a portal error without operation context
    pub fn portal(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Portal {
            status,
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create a portal error with operation context
    pub fn portal_for(
        context: impl Into<String>,
        status: Option<u16>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Portal {
            status,
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Create a precondition error
    pub fn precondition(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Precondition {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Re-scope a portal error under a new operation context
    ///
    /// Non-portal errors are returned unchanged.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Portal {
                status,
                message,
                context: inner,
            } => {
                let outer = context.into();
                let context = if inner == UNKNOWN_CONTEXT {
                    outer
                } else {
                    format!("{outer}: {inner}")
                };
                Self::Portal {
                    status,
                    message,
                    context,
                }
            }
            other => other,
        }
    }

    /// Whether this error means "the object does not exist"
    ///
    /// Covers the store's `NotFound`, kube API 404 responses, and portal 404s.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == HTTP_NOT_FOUND,
            Self::Portal { status, .. } => *status == Some(HTTP_NOT_FOUND),
            _ => false,
        }
    }

    /// Whether this error is a spec validation failure
    pub fn is_spec_error(&self) -> bool {
        matches!(self, Self::Spec(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
