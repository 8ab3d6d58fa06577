//! Remote backend API wrapper

use std::sync::Arc;

use tracing::debug;

use crate::catalog::MetricCatalog;
use crate::client::PortalApi;
use crate::types::{BackendApiItem, MappingRuleItem, MethodItem, MetricItem, Params};
use crate::Result;

/// A backend API as it exists in the portal, with lazily loaded children
///
/// Metric and method system names are reported without the `.<id>` suffix
/// the portal appends to backend children.
pub struct BackendEntity {
    api: Arc<dyn PortalApi>,
    item: BackendApiItem,
    catalog: MetricCatalog,
}

impl BackendEntity {
    /// Wrap a backend element
    pub fn new(api: Arc<dyn PortalApi>, item: BackendApiItem) -> Self {
        let catalog = MetricCatalog::for_backend(item.id, &item.system_name);
        Self { api, item, catalog }
    }

    /// Remote ID
    pub fn id(&self) -> i64 {
        self.item.id
    }

    /// System name
    pub fn system_name(&self) -> &str {
        &self.item.system_name
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.item.name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.item.description
    }

    /// Upstream URL
    pub fn private_endpoint(&self) -> &str {
        &self.item.private_endpoint
    }

    /// Wire element as last read or written
    pub fn item(&self) -> &BackendApiItem {
        &self.item
    }

    /// Update the backend; the held element is replaced by the response
    pub async fn update(&mut self, params: &Params) -> Result<()> {
        debug!(backend = %self.item.system_name, "updating backend");
        self.item = self
            .api
            .update_backend_api(self.item.id, params)
            .await
            .map_err(|e| e.with_context(self.catalog.context("update request")))?;
        self.catalog.rename(&self.item.system_name);
        Ok(())
    }

    /// Delete the backend
    pub async fn delete(self) -> Result<()> {
        self.api
            .delete_backend_api(self.item.id)
            .await
            .map_err(|e| e.with_context(self.catalog.context("delete")))
    }

    /// Methods under hits
    pub async fn methods(&mut self) -> Result<Vec<MethodItem>> {
        self.catalog.methods(self.api.as_ref()).await
    }

    /// Create a method under hits
    pub async fn create_method(&mut self, params: &Params) -> Result<MethodItem> {
        self.catalog.create_method(self.api.as_ref(), params).await
    }

    /// Update a method
    pub async fn update_method(&mut self, id: i64, params: &Params) -> Result<MethodItem> {
        self.catalog.update_method(self.api.as_ref(), id, params).await
    }

    /// Delete a method
    pub async fn delete_method(&mut self, id: i64) -> Result<()> {
        self.catalog.delete_method(self.api.as_ref(), id).await
    }

    /// Metrics excluding methods
    pub async fn metrics(&mut self) -> Result<Vec<MetricItem>> {
        self.catalog.metrics(self.api.as_ref()).await
    }

    /// Metrics and methods together, as the portal lists them
    pub async fn metrics_and_methods(&mut self) -> Result<Vec<MetricItem>> {
        self.catalog.metrics_and_methods(self.api.as_ref()).await
    }

    /// Create a metric
    pub async fn create_metric(&mut self, params: &Params) -> Result<MetricItem> {
        self.catalog.create_metric(self.api.as_ref(), params).await
    }

    /// Update a metric
    pub async fn update_metric(&mut self, id: i64, params: &Params) -> Result<MetricItem> {
        self.catalog.update_metric(self.api.as_ref(), id, params).await
    }

    /// Delete a metric
    pub async fn delete_metric(&mut self, id: i64) -> Result<()> {
        self.catalog.delete_metric(self.api.as_ref(), id).await
    }

    /// Mapping rules
    pub async fn mapping_rules(&mut self) -> Result<Vec<MappingRuleItem>> {
        self.catalog.mapping_rules(self.api.as_ref()).await
    }

    /// Create a mapping rule
    pub async fn create_mapping_rule(&mut self, params: &Params) -> Result<MappingRuleItem> {
        self.catalog.create_mapping_rule(self.api.as_ref(), params).await
    }

    /// Update a mapping rule
    pub async fn update_mapping_rule(&mut self, id: i64, params: &Params) -> Result<MappingRuleItem> {
        self.catalog.update_mapping_rule(self.api.as_ref(), id, params).await
    }

    /// Delete a mapping rule
    pub async fn delete_mapping_rule(&mut self, id: i64) -> Result<()> {
        self.catalog.delete_mapping_rule(self.api.as_ref(), id).await
    }

    /// ID of the metric or method with this (unsuffixed) system name
    pub async fn find_method_metric_id_by_system_name(&mut self, system_name: &str) -> Result<Option<i64>> {
        self.catalog
            .find_method_metric_id_by_system_name(self.api.as_ref(), system_name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiScope, MockPortalApi};
    use crate::types::params;
    use apiary_common::Error;

    fn item() -> BackendApiItem {
        BackendApiItem {
            id: 10,
            name: "Echo".to_string(),
            system_name: "echo".to_string(),
            private_endpoint: "https://echo.example.com".to_string(),
            ..Default::default()
        }
    }

    fn metric(id: i64, system_name: &str) -> MetricItem {
        MetricItem {
            id,
            system_name: system_name.to_string(),
            ..Default::default()
        }
    }

    fn method(id: i64, system_name: &str) -> MethodItem {
        MethodItem {
            id,
            system_name: system_name.to_string(),
            parent_id: 1,
            ..Default::default()
        }
    }

    /// hits(1) and a method "list"(2) and a metric "bytes"(3), all suffixed
    fn listing(api: &mut MockPortalApi) {
        api.expect_list_metrics()
            .withf(|scope| *scope == ApiScope::Backend(10))
            .returning(|_| {
                Ok(vec![
                    metric(1, "hits.10"),
                    metric(2, "list.10"),
                    metric(3, "bytes.10"),
                ])
            });
        api.expect_list_methods()
            .withf(|scope, hits| *scope == ApiScope::Backend(10) && *hits == 1)
            .returning(|_, _| Ok(vec![method(2, "list.10")]));
    }

    #[tokio::test]
    async fn system_names_are_sanitized() {
        let mut api = MockPortalApi::new();
        listing(&mut api);
        let mut backend = BackendEntity::new(Arc::new(api), item());

        let all = backend.metrics_and_methods().await.unwrap();
        let names: Vec<_> = all.iter().map(|m| m.system_name.as_str()).collect();
        assert_eq!(names, vec!["hits", "list", "bytes"]);

        let methods = backend.methods().await.unwrap();
        assert_eq!(methods[0].system_name, "list");
    }

    #[tokio::test]
    async fn metrics_exclude_methods() {
        let mut api = MockPortalApi::new();
        listing(&mut api);
        let mut backend = BackendEntity::new(Arc::new(api), item());

        let metrics = backend.metrics().await.unwrap();
        let names: Vec<_> = metrics.iter().map(|m| m.system_name.as_str()).collect();
        assert_eq!(names, vec!["hits", "bytes"]);
    }

    #[tokio::test]
    async fn reads_are_cached() {
        let mut api = MockPortalApi::new();
        api.expect_list_metrics()
            .times(1)
            .returning(|_| Ok(vec![metric(1, "hits.10")]));
        let mut backend = BackendEntity::new(Arc::new(api), item());

        backend.metrics_and_methods().await.unwrap();
        backend.metrics_and_methods().await.unwrap();
        assert_eq!(
            backend.find_method_metric_id_by_system_name("hits").await.unwrap(),
            Some(1)
        );
        assert_eq!(
            backend.find_method_metric_id_by_system_name("missing").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn method_writes_reset_methods_and_metrics() {
        let mut api = MockPortalApi::new();
        listing(&mut api);
        api.expect_create_method()
            .withf(|_, hits, p| *hits == 1 && p["system_name"] == "new")
            .times(1)
            .returning(|_, _, _| Ok(method(4, "new.10")));
        let mut backend = BackendEntity::new(Arc::new(api), item());

        backend.methods().await.unwrap();
        assert_eq!(backend.catalog.cached(), (true, true, false));
        backend
            .create_method(&params([("system_name", "new".to_string())]))
            .await
            .unwrap();
        assert_eq!(backend.catalog.cached(), (false, false, false));
    }

    #[tokio::test]
    async fn metric_writes_reset_metrics_only() {
        let mut api = MockPortalApi::new();
        listing(&mut api);
        api.expect_list_mapping_rules()
            .returning(|_| Ok(vec![]));
        api.expect_delete_metric()
            .withf(|_, id| *id == 3)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut backend = BackendEntity::new(Arc::new(api), item());

        backend.methods().await.unwrap();
        backend.mapping_rules().await.unwrap();
        backend.delete_metric(3).await.unwrap();
        assert_eq!(backend.catalog.cached(), (false, true, true));
    }

    #[tokio::test]
    async fn mapping_rule_writes_reset_mapping_rules() {
        let mut api = MockPortalApi::new();
        api.expect_list_mapping_rules()
            .times(2)
            .returning(|_| Ok(vec![]));
        api.expect_update_mapping_rule()
            .returning(|_, id, _| {
                Ok(MappingRuleItem {
                    id,
                    ..Default::default()
                })
            });
        let mut backend = BackendEntity::new(Arc::new(api), item());

        backend.mapping_rules().await.unwrap();
        backend.update_mapping_rule(5, &Params::new()).await.unwrap();
        backend.mapping_rules().await.unwrap();
    }

    #[tokio::test]
    async fn method_without_hits_is_a_precondition_error() {
        let mut api = MockPortalApi::new();
        api.expect_list_metrics()
            .returning(|_| Ok(vec![metric(3, "bytes.10")]));
        api.expect_create_method().never();
        let mut backend = BackendEntity::new(Arc::new(api), item());

        let err = backend.create_method(&Params::new()).await.unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
        assert_eq!(
            err.to_string(),
            "precondition failed [backend [echo]]: hits not found"
        );
    }

    #[tokio::test]
    async fn write_errors_name_backend_and_operation() {
        let mut api = MockPortalApi::new();
        api.expect_create_metric()
            .returning(|_, _| Err(Error::portal(Some(422), "system_name: has already been taken")));
        let mut backend = BackendEntity::new(Arc::new(api), item());

        let err = backend.create_metric(&Params::new()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "portal error [backend [echo] create metric]: system_name: has already been taken"
        );
    }

    #[tokio::test]
    async fn update_replaces_held_item() {
        let mut api = MockPortalApi::new();
        api.expect_update_backend_api()
            .withf(|id, p| *id == 10 && p["name"] == "Echo v2")
            .returning(|_, _| {
                Ok(BackendApiItem {
                    name: "Echo v2".to_string(),
                    ..item()
                })
            });
        let mut backend = BackendEntity::new(Arc::new(api), item());

        backend
            .update(&params([("name", "Echo v2".to_string())]))
            .await
            .unwrap();
        assert_eq!(backend.name(), "Echo v2");
        assert_eq!(backend.private_endpoint(), "https://echo.example.com");
    }

    #[tokio::test]
    async fn renamed_backend_reports_new_name_in_errors() {
        let mut api = MockPortalApi::new();
        api.expect_update_backend_api().returning(|_, _| {
            Ok(BackendApiItem {
                system_name: "echo2".to_string(),
                ..item()
            })
        });
        api.expect_create_metric()
            .returning(|_, _| Err(Error::portal(Some(422), "system_name: taken")));
        let mut backend = BackendEntity::new(Arc::new(api), item());

        backend
            .update(&params([("system_name", "echo2".to_string())]))
            .await
            .unwrap();
        assert_eq!(backend.system_name(), "echo2");

        let err = backend.create_metric(&Params::new()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "portal error [backend [echo2] create metric]: system_name: taken"
        );
    }
}
