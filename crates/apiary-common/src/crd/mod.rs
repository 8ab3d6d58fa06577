//! Declarative object types used by apiary
//!
//! Full CRD schemas are owned elsewhere; these types carry the fields the
//! reconcilers, filters and resolver read or write.

mod api_manager;
mod capabilities;
mod external;
mod types;

pub use api_manager::{ApiManager, ApiManagerSpec, DEFAULT_TENANT_NAME};
pub use capabilities::{
    ApplicationPlanSpec, Backend, BackendSpec, BackendStatus, BackendUsageSpec, MappingRuleSpec,
    MethodSpec, MetricSpec, Product, ProductSpec, ProductStatus, HITS_SYSTEM_NAME,
};
pub use external::{
    GrafanaDashboard, GrafanaDashboardSpec, ImageStream, ImageStreamSpec, ImageStreamTag,
    TagImportPolicy, TagReference,
};
pub use types::{
    Condition, ConditionSet, ConditionStatus, LocalSecretRef, CONDITION_FAILED,
    CONDITION_INVALID, CONDITION_ORPHAN, CONDITION_READY, CONDITION_SYNCED, CONDITION_WAITING,
};

/// Objects whose status carries a condition set
pub trait Synchronizable {
    /// The object's conditions, if status has been written
    fn conditions(&self) -> Option<&ConditionSet>;

    /// Whether the `Synced` condition is true
    fn is_synced(&self) -> bool {
        self.conditions()
            .is_some_and(|c| c.is_true_for(CONDITION_SYNCED))
    }
}

/// Objects that may name the secret holding their tenant credentials
pub trait ProviderAccountScoped {
    /// Explicit credentials secret, if set
    fn provider_account_ref(&self) -> Option<&LocalSecretRef>;
}
