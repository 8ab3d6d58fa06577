//! Remote product wrapper

use std::sync::Arc;

use tracing::debug;

use crate::cache::CachedCell;
use crate::catalog::MetricCatalog;
use crate::client::PortalApi;
use crate::plan::ApplicationPlanEntity;
use crate::types::{
    ApplicationPlanItem, BackendUsageItem, MappingRuleItem, MethodItem, MetricItem, Params,
    ProductItem, ProxyItem,
};
use crate::Result;

/// A product as it exists in the portal, with lazily loaded children
pub struct ProductEntity {
    api: Arc<dyn PortalApi>,
    item: ProductItem,
    catalog: MetricCatalog,
    backend_usages: CachedCell<Vec<BackendUsageItem>>,
    proxy: CachedCell<ProxyItem>,
    plans: CachedCell<Vec<ApplicationPlanItem>>,
}

impl ProductEntity {
    /// Wrap a product element
    pub fn new(api: Arc<dyn PortalApi>, item: ProductItem) -> Self {
        let catalog = MetricCatalog::for_product(item.id, &item.system_name);
        Self {
            api,
            item,
            catalog,
            backend_usages: CachedCell::new(),
            proxy: CachedCell::new(),
            plans: CachedCell::new(),
        }
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

    /// Lifecycle state
    pub fn state(&self) -> &str {
        &self.item.state
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.item.description
    }

    /// Gateway deployment option
    pub fn deployment_option(&self) -> &str {
        &self.item.deployment_option
    }

    /// Authentication mode
    pub fn backend_version(&self) -> &str {
        &self.item.backend_version
    }

    /// Wire element as last read or written
    pub fn item(&self) -> &ProductItem {
        &self.item
    }

    /// Update the product; the held element is replaced by the response
    pub async fn update(&mut self, params: &Params) -> Result<()> {
        debug!(product = %self.item.system_name, "updating product");
        self.item = self
            .api
            .update_product(self.item.id, params)
            .await
            .map_err(|e| e.with_context(self.catalog.context("update request")))?;
        self.catalog.rename(&self.item.system_name);
        Ok(())
    }

    /// Delete the product
    pub async fn delete(self) -> Result<()> {
        self.api
            .delete_product(self.item.id)
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

    /// Metrics and methods together
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

    /// ID of the metric or method with this system name
    pub async fn find_method_metric_id_by_system_name(&mut self, system_name: &str) -> Result<Option<i64>> {
        self.catalog
            .find_method_metric_id_by_system_name(self.api.as_ref(), system_name)
            .await
    }

    /// Backends mounted on this product
    pub async fn backend_usages(&mut self) -> Result<Vec<BackendUsageItem>> {
        let api = self.api.as_ref();
        let id = self.item.id;
        let ctx = self.catalog.context("get backend usages");
        let usages = self
            .backend_usages
            .get_or_try_fetch(|| api.list_backend_usages(id))
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(usages.clone())
    }

    /// Mount a backend
    pub async fn create_backend_usage(&mut self, params: &Params) -> Result<BackendUsageItem> {
        let created = self
            .api
            .create_backend_usage(self.item.id, params)
            .await
            .map_err(|e| e.with_context(self.catalog.context("create backend usage")))?;
        self.backend_usages.invalidate();
        Ok(created)
    }

    /// Update a backend usage
    pub async fn update_backend_usage(&mut self, id: i64, params: &Params) -> Result<BackendUsageItem> {
        let updated = self
            .api
            .update_backend_usage(self.item.id, id, params)
            .await
            .map_err(|e| e.with_context(self.catalog.context("update backend usage")))?;
        self.backend_usages.invalidate();
        Ok(updated)
    }

    /// Unmount a backend
    pub async fn delete_backend_usage(&mut self, id: i64) -> Result<()> {
        self.api
            .delete_backend_usage(self.item.id, id)
            .await
            .map_err(|e| e.with_context(self.catalog.context("delete backend usage")))?;
        self.backend_usages.invalidate();
        Ok(())
    }

    /// Gateway configuration
    pub async fn proxy(&mut self) -> Result<ProxyItem> {
        let api = self.api.as_ref();
        let id = self.item.id;
        let ctx = self.catalog.context("get proxy");
        let proxy = self
            .proxy
            .get_or_try_fetch(|| api.read_proxy(id))
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(proxy.clone())
    }

    /// Update the gateway configuration; the response is cached
    pub async fn update_proxy(&mut self, params: &Params) -> Result<()> {
        let updated = self
            .api
            .update_proxy(self.item.id, params)
            .await
            .map_err(|e| e.with_context(self.catalog.context("update proxy")))?;
        self.proxy.set(updated);
        Ok(())
    }

    /// Promote the gateway configuration to staging; the response is cached
    pub async fn promote_proxy_to_staging(&mut self) -> Result<()> {
        let deployed = self
            .api
            .deploy_proxy(self.item.id)
            .await
            .map_err(|e| e.with_context(self.catalog.context("promote proxy to staging")))?;
        self.proxy.set(deployed);
        Ok(())
    }

    /// Application plans
    pub async fn application_plans(&mut self) -> Result<Vec<ApplicationPlanItem>> {
        let api = self.api.as_ref();
        let id = self.item.id;
        let ctx = self.catalog.context("get plans");
        let plans = self
            .plans
            .get_or_try_fetch(|| api.list_application_plans(id))
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(plans.clone())
    }

    /// Create an application plan
    pub async fn create_application_plan(&mut self, params: &Params) -> Result<ApplicationPlanItem> {
        let created = self
            .api
            .create_application_plan(self.item.id, params)
            .await
            .map_err(|e| e.with_context(self.catalog.context("create plan")))?;
        self.plans.invalidate();
        Ok(created)
    }

    /// Delete an application plan
    pub async fn delete_application_plan(&mut self, id: i64) -> Result<()> {
        self.api
            .delete_application_plan(self.item.id, id)
            .await
            .map_err(|e| e.with_context(self.catalog.context("delete plan")))?;
        self.plans.invalidate();
        Ok(())
    }

    /// Plan wrapper for the plan with this system name
    pub async fn find_application_plan_by_system_name(
        &mut self,
        system_name: &str,
    ) -> Result<Option<ApplicationPlanEntity>> {
        let plan = self
            .application_plans()
            .await?
            .into_iter()
            .find(|p| p.system_name == system_name);
        Ok(plan.map(|item| ApplicationPlanEntity::new(Arc::clone(&self.api), self.item.id, item)))
    }
}
