//! Generic reconciliation engine
//!
//! Drives one desired object to convergence against the backing store:
//!
//! | existing  | deletion tag | action                                   |
//! |-----------|--------------|------------------------------------------|
//! | not found | no           | create desired                           |
//! | not found | yes          | nothing (already absent)                 |
//! | found     | yes          | delete existing                          |
//! | found     | no           | mutate existing; update if it changed    |
//!
//! Exactly one of create/update/delete (or nothing) happens per call. Store
//! errors other than "not found" are returned as-is; retrying is the caller's
//! job.

use std::sync::Arc;

use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument};

use apiary_common::kube_utils::{delete_propagation_policy, is_object_tagged_to_delete, object_info};
use apiary_common::{KindRegistry, OptionalKind};

use crate::store::ObjectStore;
use crate::Result;

/// What a reconcile call did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Desired object was created
    Created,
    /// Existing object was mutated and written back
    Updated,
    /// Existing object was deleted because desired is tagged
    Deleted,
    /// Existing object already matched desired
    Unchanged,
    /// Desired is tagged for deletion and nothing exists
    AlreadyAbsent,
}

impl Outcome {
    /// Whether the call wrote to the store
    pub fn wrote(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

/// Converge one object
///
/// `mutate(existing, desired)` copies the concerns it owns from `desired` into
/// `existing` and reports whether anything changed.
#[instrument(
    skip_all,
    fields(
        object = %object_info(&desired),
        namespace = %desired.namespace().unwrap_or_default()
    )
)]
pub async fn reconcile_resource<K, S, F>(store: &S, desired: K, mutate: F) -> Result<Outcome>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    S: ObjectStore<K> + ?Sized,
    F: Fn(&mut K, &K) -> Result<bool> + Send + Sync,
{
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();
    let info = object_info(&desired);
    let tagged = is_object_tagged_to_delete(&desired);

    let Some(mut existing) = store.get(&namespace, &name).await? else {
        if tagged {
            debug!(object = %info, "tagged for deletion and already absent");
            return Ok(Outcome::AlreadyAbsent);
        }
        store.create(&desired).await?;
        info!(object = %info, namespace = %namespace, "created object");
        return Ok(Outcome::Created);
    };

    if tagged {
        let propagation = delete_propagation_policy(&desired);
        store.delete(&existing, propagation).await?;
        info!(object = %info, namespace = %namespace, "deleted object");
        return Ok(Outcome::Deleted);
    }

    if !mutate(&mut existing, &desired)? {
        debug!(object = %info, "object up to date");
        return Ok(Outcome::Unchanged);
    }

    store.update(&existing).await?;
    info!(object = %info, namespace = %namespace, "updated object");
    Ok(Outcome::Updated)
}

/// Engine front-end bound to a store and the optional-kind registry
///
/// Built once at startup and shared by every reconciler.
pub struct ResourceReconciler<S> {
    store: S,
    registry: Arc<KindRegistry>,
}

impl<S> ResourceReconciler<S> {
    /// Create a reconciler over a store and registry
    pub fn new(store: S, registry: Arc<KindRegistry>) -> Self {
        Self { store, registry }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The optional-kind registry
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Converge one object of a core kind
    pub async fn reconcile<K, F>(&self, desired: K, mutate: F) -> Result<Outcome>
    where
        K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
        S: ObjectStore<K>,
        F: Fn(&mut K, &K) -> Result<bool> + Send + Sync,
    {
        reconcile_resource(&self.store, desired, mutate).await
    }

    /// Converge one object of an optional third-party kind
    ///
    /// Returns `None` without touching the store when the kind's CRD is not
    /// installed.
    pub async fn reconcile_optional<K, F>(
        &self,
        kind: OptionalKind,
        desired: K,
        mutate: F,
    ) -> Result<Option<Outcome>>
    where
        K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
        S: ObjectStore<K>,
        F: Fn(&mut K, &K) -> Result<bool> + Send + Sync,
    {
        if !self.registry.is_installed(kind).await {
            debug!(
                kind = kind.kind_str(),
                object = %object_info(&desired),
                "kind not installed, skipping"
            );
            return Ok(None);
        }
        reconcile_resource(&self.store, desired, mutate)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use apiary_common::crd::{GrafanaDashboard, GrafanaDashboardSpec};
    use apiary_common::kube_utils::{tag_object_to_delete, tag_object_to_delete_with_propagation_policy};
    use apiary_common::Error;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::PropagationPolicy;

    use crate::mutator::create_only;
    use crate::mutators::config_map_data;
    use crate::store::MockObjectStore;

    // =========================================================================
    // Test Fixtures
    // =========================================================================

    fn config_map(data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("system-environment".to_string()),
                namespace: Some("apps".to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    fn tagged(mut cm: ConfigMap) -> ConfigMap {
        tag_object_to_delete(&mut cm);
        cm
    }

    fn data_mutator(existing: &mut ConfigMap, desired: &ConfigMap) -> Result<bool> {
        config_map_data(desired, existing)
    }

    // =========================================================================
    // State Machine
    // =========================================================================

    #[tokio::test]
    async fn absent_untagged_is_created() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store.expect_get().times(1).returning(|_, _| Ok(None));
        store
            .expect_create()
            .times(1)
            .withf(|cm| cm.metadata.name.as_deref() == Some("system-environment"))
            .returning(|_| Ok(()));

        let outcome = reconcile_resource(&store, config_map(&[("A", "1")]), data_mutator)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Created);
        assert!(outcome.wrote());
    }

    #[tokio::test]
    async fn absent_tagged_is_a_noop() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store.expect_get().times(1).returning(|_, _| Ok(None));

        let outcome = reconcile_resource(&store, tagged(config_map(&[])), data_mutator)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::AlreadyAbsent);
        assert!(!outcome.wrote());
    }

    #[tokio::test]
    async fn present_tagged_is_deleted_exactly_once() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .times(1)
            .returning(|_, _| Ok(Some(config_map(&[("A", "1")]))));
        store
            .expect_delete()
            .times(1)
            .withf(|_, policy| policy.is_none())
            .returning(|_, _| Ok(()));

        let outcome = reconcile_resource(&store, tagged(config_map(&[])), data_mutator)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Deleted);
    }

    #[tokio::test]
    async fn delete_honours_propagation_policy_annotation() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .returning(|_, _| Ok(Some(config_map(&[]))));
        store
            .expect_delete()
            .times(1)
            .withf(|_, policy| matches!(policy, Some(PropagationPolicy::Background)))
            .returning(|_, _| Ok(()));

        let mut desired = config_map(&[]);
        tag_object_to_delete_with_propagation_policy(&mut desired, PropagationPolicy::Background);
        let outcome = reconcile_resource(&store, desired, data_mutator).await.unwrap();
        assert_eq!(outcome, Outcome::Deleted);
    }

    #[tokio::test]
    async fn present_and_changed_is_updated() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .returning(|_, _| Ok(Some(config_map(&[("A", "old")]))));
        store
            .expect_update()
            .times(1)
            .withf(|cm| cm.data.as_ref().and_then(|d| d.get("A")).map(String::as_str) == Some("new"))
            .returning(|_| Ok(()));

        let outcome = reconcile_resource(&store, config_map(&[("A", "new")]), data_mutator)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Updated);
    }

    #[tokio::test]
    async fn present_and_unchanged_writes_nothing() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .returning(|_, _| Ok(Some(config_map(&[("A", "1")]))));

        let outcome = reconcile_resource(&store, config_map(&[("A", "1")]), data_mutator)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn second_pass_is_idempotent() {
        // First pass updates; the second sees the written object and stops.
        let desired = config_map(&[("A", "new")]);
        let mut existing = config_map(&[("A", "old")]);
        assert!(data_mutator(&mut existing, &desired).unwrap());

        let mut store = MockObjectStore::<ConfigMap>::new();
        let written = existing.clone();
        store
            .expect_get()
            .returning(move |_, _| Ok(Some(written.clone())));

        let outcome = reconcile_resource(&store, desired, data_mutator).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .returning(|_, _| Err(Error::internal("etcd unavailable")));

        let err = reconcile_resource(&store, config_map(&[]), data_mutator)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("etcd unavailable"));
    }

    #[tokio::test]
    async fn mutator_errors_abort_before_update() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .returning(|_, _| Ok(Some(config_map(&[]))));

        let result = reconcile_resource(&store, config_map(&[]), |_: &mut ConfigMap, _: &ConfigMap| {
            Err(Error::precondition("test", "bad desired"))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_only_never_updates() {
        let mut store = MockObjectStore::<ConfigMap>::new();
        store
            .expect_get()
            .returning(|_, _| Ok(Some(config_map(&[("A", "user-edited")]))));

        let outcome = reconcile_resource(&store, config_map(&[("A", "default")]), create_only)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
    }

    // =========================================================================
    // Optional Kinds
    // =========================================================================

    fn dashboard() -> GrafanaDashboard {
        let mut d = GrafanaDashboard::new("apicast", GrafanaDashboardSpec::default());
        d.metadata.namespace = Some("apps".to_string());
        d
    }

    #[tokio::test]
    async fn optional_kind_not_installed_is_skipped() {
        let store = MockObjectStore::<GrafanaDashboard>::new();
        let reconciler = ResourceReconciler::new(store, Arc::new(KindRegistry::with_kinds(&[])));

        let outcome = reconciler
            .reconcile_optional(OptionalKind::GrafanaDashboard, dashboard(), create_only)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn optional_kind_installed_is_reconciled() {
        let mut store = MockObjectStore::<GrafanaDashboard>::new();
        store.expect_get().returning(|_, _| Ok(None));
        store.expect_create().times(1).returning(|_| Ok(()));
        let registry = KindRegistry::with_kinds(&[OptionalKind::GrafanaDashboard]);
        let reconciler = ResourceReconciler::new(store, Arc::new(registry));

        let outcome = reconciler
            .reconcile_optional(OptionalKind::GrafanaDashboard, dashboard(), create_only)
            .await
            .unwrap();
        assert_eq!(outcome, Some(Outcome::Created));
    }
}
