//! Common types and utilities shared across apiary crates
//!
//! - [`crd`] - Declarative object types (Product, Backend, APIManager, conditions)
//! - [`error`] - Error taxonomy shared by the engine, portal client and resolver
//! - [`kube_utils`] - Deletion tagging and Kubernetes helpers
//! - [`kind_registry`] - Explicit registry of optional third-party kinds
//! - [`telemetry`] - Logging initialization
//! - [`validation`] - Accumulated field errors

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kind_registry;
pub mod kube_utils;
pub mod telemetry;
pub mod validation;

pub use error::Error;
pub use kind_registry::{KindRegistry, OptionalKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Provider Account Constants
// =============================================================================

/// Secret consulted when an object does not name its credentials secret
pub const DEFAULT_PROVIDER_ACCOUNT_SECRET: &str = "threescale-provider-account";

/// Secret field holding the tenant admin portal URL
pub const PROVIDER_ACCOUNT_ADMIN_URL_FIELD: &str = "adminURL";

/// Secret field holding the tenant access token
pub const PROVIDER_ACCOUNT_TOKEN_FIELD: &str = "token";

/// Secret generated by an APIManager installation with seed credentials
pub const SYSTEM_SEED_SECRET: &str = "system-seed";

/// Field of the seed secret holding the admin access token
pub const SYSTEM_SEED_ADMIN_ACCESS_TOKEN_FIELD: &str = "ADMIN_ACCESS_TOKEN";

/// Field manager name used for store writes
pub const FIELD_MANAGER: &str = "apiary";
