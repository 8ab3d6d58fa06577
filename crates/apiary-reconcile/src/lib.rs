//! Declarative object reconciliation for apiary
//!
//! - [`engine`]: converge one desired object against an [`ObjectStore`]
//! - [`mutator`]: the field-mutator contract and [`MutatorChain`]
//! - [`mutators`]: per-kind field mutators
//! - [`status`]: change-gated status writes

#![deny(missing_docs)]

pub mod engine;
pub mod mutator;
pub mod mutators;
pub mod status;
pub mod store;

pub use engine::{reconcile_resource, Outcome, ResourceReconciler};
pub use mutator::{create_only, Mutator, MutatorChain};
pub use status::{update_status, HasStatus};
pub use store::{KubeStore, ObjectStore};

pub use apiary_common::{Error, Result};
