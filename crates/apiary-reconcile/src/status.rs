//! Status subresource writes
//!
//! Status is written only when the new value differs from what the object
//! already carries. Condition sets compare in canonical order, so a reorder
//! alone never triggers a write.

use kube::Resource;
use tracing::{debug, info, instrument};

use apiary_common::crd::{Backend, BackendStatus, Product, ProductStatus};
use apiary_common::kube_utils::object_info;

use crate::store::ObjectStore;
use crate::Result;

/// Kinds with a typed status subresource
pub trait HasStatus: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    /// Status payload
    type Status: PartialEq + Clone + Send + Sync;

    /// Current status, if written
    fn status(&self) -> Option<&Self::Status>;

    /// Mutable access to the status slot
    fn status_mut(&mut self) -> &mut Option<Self::Status>;
}

impl HasStatus for Backend {
    type Status = BackendStatus;

    fn status(&self) -> Option<&BackendStatus> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Option<BackendStatus> {
        &mut self.status
    }
}

impl HasStatus for Product {
    type Status = ProductStatus;

    fn status(&self) -> Option<&ProductStatus> {
        self.status.as_ref()
    }

    fn status_mut(&mut self) -> &mut Option<ProductStatus> {
        &mut self.status
    }
}

/// Write `new_status` if it differs from the object's current status
///
/// Returns whether a write happened.
#[instrument(skip_all, fields(object = %object_info(obj)))]
pub async fn update_status<K, S>(store: &S, obj: &K, new_status: K::Status) -> Result<bool>
where
    K: HasStatus,
    S: ObjectStore<K> + ?Sized,
{
    if obj.status() == Some(&new_status) {
        debug!("status unchanged");
        return Ok(false);
    }

    let mut updated = obj.clone();
    *updated.status_mut() = Some(new_status);
    store.patch_status(&updated).await?;
    info!("status updated");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use apiary_common::crd::{Condition, ConditionSet, ConditionStatus, ProductSpec};
    use apiary_common::Error;

    use crate::store::MockObjectStore;

    fn product(status: Option<ProductStatus>) -> Product {
        let mut p = Product::new(
            "api",
            ProductSpec {
                name: "API".to_string(),
                system_name: "api".to_string(),
                description: None,
                metrics: BTreeMap::new(),
                methods: BTreeMap::new(),
                mapping_rules: vec![],
                backend_usages: BTreeMap::new(),
                application_plans: BTreeMap::new(),
                provider_account_ref: None,
            },
        );
        p.metadata.namespace = Some("apps".to_string());
        p.status = status;
        p
    }

    fn status(conditions: Vec<Condition>) -> ProductStatus {
        ProductStatus {
            product_id: Some(7),
            provider_account_host: Some("https://tenant-admin.example.com".to_string()),
            observed_generation: Some(1),
            conditions: ConditionSet::from_conditions(conditions),
        }
    }

    fn synced() -> Condition {
        Condition::new("Synced", ConditionStatus::True, "Synced", "")
    }

    fn failed() -> Condition {
        Condition::new("Failed", ConditionStatus::False, "", "")
    }

    #[tokio::test]
    async fn equal_status_is_not_written() {
        let current = status(vec![synced(), failed()]);
        let obj = product(Some(current.clone()));
        let mut store = MockObjectStore::<Product>::new();
        store.expect_patch_status().never();

        let reordered = ProductStatus {
            conditions: ConditionSet::from_conditions(vec![
                current.conditions.get("Failed").cloned().unwrap(),
                current.conditions.get("Synced").cloned().unwrap(),
            ]),
            ..current
        };
        assert!(!update_status(&store, &obj, reordered).await.unwrap());
    }

    #[tokio::test]
    async fn changed_status_is_patched() {
        let obj = product(None);
        let mut store = MockObjectStore::<Product>::new();
        store
            .expect_patch_status()
            .withf(|p: &Product| p.status.as_ref().and_then(|s| s.product_id) == Some(7))
            .times(1)
            .returning(|_| Ok(()));

        assert!(update_status(&store, &obj, status(vec![synced()])).await.unwrap());
    }

    #[tokio::test]
    async fn patch_error_propagates() {
        let obj = product(None);
        let mut store = MockObjectStore::<Product>::new();
        store
            .expect_patch_status()
            .returning(|_| Err(Error::internal("conflict")));

        assert!(update_status(&store, &obj, status(vec![])).await.is_err());
    }
}
