//! Metrics, methods and mapping rules of one backend or product
//!
//! Backends and products expose the same child collections under different
//! URL prefixes. The catalog owns their caches and the invalidation rules:
//! method writes drop methods and metrics-and-methods, metric writes drop
//! metrics-and-methods, mapping rule writes drop mapping rules.

use std::collections::HashSet;

use apiary_common::crd::HITS_SYSTEM_NAME;
use apiary_common::Error;

use crate::cache::CachedCell;
use crate::client::{ApiScope, PortalApi};
use crate::types::{MappingRuleItem, MethodItem, MetricItem, Params};
use crate::Result;

/// Strip the `.<backend id>` suffix the portal appends to backend metric
/// and method system names
///
/// `"hits.45498"` becomes `"hits"`; a name without a dot is returned as is.
pub fn sanitize_backend_system_name(system_name: &str) -> &str {
    match system_name.rfind('.') {
        Some(idx) => &system_name[..idx],
        None => system_name,
    }
}

pub(crate) struct MetricCatalog {
    scope: ApiScope,
    sanitize: bool,
    kind: &'static str,
    label: String,
    metrics_and_methods: CachedCell<Vec<MetricItem>>,
    methods: CachedCell<Vec<MethodItem>>,
    mapping_rules: CachedCell<Vec<MappingRuleItem>>,
}

impl MetricCatalog {
    pub fn for_backend(id: i64, system_name: &str) -> Self {
        Self::new(ApiScope::Backend(id), true, "backend", system_name)
    }

    pub fn for_product(id: i64, system_name: &str) -> Self {
        Self::new(ApiScope::Product(id), false, "product", system_name)
    }

    fn new(scope: ApiScope, sanitize: bool, kind: &'static str, system_name: &str) -> Self {
        Self {
            scope,
            sanitize,
            kind,
            label: format!("{kind} [{system_name}]"),
            metrics_and_methods: CachedCell::new(),
            methods: CachedCell::new(),
            mapping_rules: CachedCell::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Follow a system name change of the owning entity
    pub fn rename(&mut self, system_name: &str) {
        self.label = format!("{} [{system_name}]", self.kind);
    }

    /// Operation context for error wrapping, e.g. `backend [foo] create method`
    pub fn context(&self, op: &str) -> String {
        format!("{} {op}", self.label)
    }

    fn reset_methods(&mut self) {
        self.methods.invalidate();
        self.metrics_and_methods.invalidate();
    }

    fn reset_metrics(&mut self) {
        self.metrics_and_methods.invalidate();
    }

    async fn cached_metrics_and_methods(&mut self, api: &dyn PortalApi) -> Result<&[MetricItem]> {
        let scope = self.scope;
        let sanitize = self.sanitize;
        let ctx = self.context("get metrics");
        let items = self
            .metrics_and_methods
            .get_or_try_fetch(|| async move {
                let mut items = api.list_metrics(scope).await?;
                if sanitize {
                    for item in &mut items {
                        item.system_name = sanitize_backend_system_name(&item.system_name).to_string();
                    }
                }
                Ok(items)
            })
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(items.as_slice())
    }

    pub async fn metrics_and_methods(&mut self, api: &dyn PortalApi) -> Result<Vec<MetricItem>> {
        Ok(self.cached_metrics_and_methods(api).await?.to_vec())
    }

    pub async fn hits_id(&mut self, api: &dyn PortalApi) -> Result<i64> {
        let label = self.label.clone();
        self.cached_metrics_and_methods(api)
            .await?
            .iter()
            .find(|m| m.system_name == HITS_SYSTEM_NAME)
            .map(|m| m.id)
            .ok_or_else(|| Error::precondition(label, "hits not found"))
    }

    pub async fn methods(&mut self, api: &dyn PortalApi) -> Result<Vec<MethodItem>> {
        if let Some(cached) = self.methods.peek() {
            return Ok(cached.clone());
        }
        let hits_id = self.hits_id(api).await?;
        let scope = self.scope;
        let sanitize = self.sanitize;
        let ctx = self.context("get methods");
        let items = self
            .methods
            .get_or_try_fetch(|| async move {
                let mut items = api.list_methods(scope, hits_id).await?;
                if sanitize {
                    for item in &mut items {
                        item.system_name = sanitize_backend_system_name(&item.system_name).to_string();
                    }
                }
                Ok(items)
            })
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(items.clone())
    }

    /// Metrics-and-methods minus the methods, by system name
    pub async fn metrics(&mut self, api: &dyn PortalApi) -> Result<Vec<MetricItem>> {
        let method_names: HashSet<String> = self
            .methods(api)
            .await?
            .into_iter()
            .map(|m| m.system_name)
            .collect();
        Ok(self
            .cached_metrics_and_methods(api)
            .await?
            .iter()
            .filter(|m| !method_names.contains(&m.system_name))
            .cloned()
            .collect())
    }

    pub async fn find_method_metric_id_by_system_name(
        &mut self,
        api: &dyn PortalApi,
        system_name: &str,
    ) -> Result<Option<i64>> {
        Ok(self
            .cached_metrics_and_methods(api)
            .await?
            .iter()
            .find(|m| m.system_name == system_name)
            .map(|m| m.id))
    }

    pub async fn create_method(&mut self, api: &dyn PortalApi, params: &Params) -> Result<MethodItem> {
        let hits_id = self.hits_id(api).await?;
        let created = api
            .create_method(self.scope, hits_id, params)
            .await
            .map_err(|e| e.with_context(self.context("create method")))?;
        self.reset_methods();
        Ok(created)
    }

    pub async fn update_method(
        &mut self,
        api: &dyn PortalApi,
        method_id: i64,
        params: &Params,
    ) -> Result<MethodItem> {
        let hits_id = self.hits_id(api).await?;
        let updated = api
            .update_method(self.scope, hits_id, method_id, params)
            .await
            .map_err(|e| e.with_context(self.context("update method")))?;
        self.reset_methods();
        Ok(updated)
    }

    pub async fn delete_method(&mut self, api: &dyn PortalApi, method_id: i64) -> Result<()> {
        let hits_id = self.hits_id(api).await?;
        api.delete_method(self.scope, hits_id, method_id)
            .await
            .map_err(|e| e.with_context(self.context("delete method")))?;
        self.reset_methods();
        Ok(())
    }

    pub async fn create_metric(&mut self, api: &dyn PortalApi, params: &Params) -> Result<MetricItem> {
        let created = api
            .create_metric(self.scope, params)
            .await
            .map_err(|e| e.with_context(self.context("create metric")))?;
        self.reset_metrics();
        Ok(created)
    }

    pub async fn update_metric(
        &mut self,
        api: &dyn PortalApi,
        metric_id: i64,
        params: &Params,
    ) -> Result<MetricItem> {
        let updated = api
            .update_metric(self.scope, metric_id, params)
            .await
            .map_err(|e| e.with_context(self.context("update metric")))?;
        self.reset_metrics();
        Ok(updated)
    }

    pub async fn delete_metric(&mut self, api: &dyn PortalApi, metric_id: i64) -> Result<()> {
        api.delete_metric(self.scope, metric_id)
            .await
            .map_err(|e| e.with_context(self.context("delete metric")))?;
        self.reset_metrics();
        Ok(())
    }

    pub async fn mapping_rules(&mut self, api: &dyn PortalApi) -> Result<Vec<MappingRuleItem>> {
        let scope = self.scope;
        let ctx = self.context("get mapping rules");
        let items = self
            .mapping_rules
            .get_or_try_fetch(|| api.list_mapping_rules(scope))
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(items.clone())
    }

    pub async fn create_mapping_rule(
        &mut self,
        api: &dyn PortalApi,
        params: &Params,
    ) -> Result<MappingRuleItem> {
        let created = api
            .create_mapping_rule(self.scope, params)
            .await
            .map_err(|e| e.with_context(self.context("create mapping rule")))?;
        self.mapping_rules.invalidate();
        Ok(created)
    }

    pub async fn update_mapping_rule(
        &mut self,
        api: &dyn PortalApi,
        rule_id: i64,
        params: &Params,
    ) -> Result<MappingRuleItem> {
        let updated = api
            .update_mapping_rule(self.scope, rule_id, params)
            .await
            .map_err(|e| e.with_context(self.context("update mapping rule")))?;
        self.mapping_rules.invalidate();
        Ok(updated)
    }

    pub async fn delete_mapping_rule(&mut self, api: &dyn PortalApi, rule_id: i64) -> Result<()> {
        api.delete_mapping_rule(self.scope, rule_id)
            .await
            .map_err(|e| e.with_context(self.context("delete mapping rule")))?;
        self.mapping_rules.invalidate();
        Ok(())
    }

    #[cfg(test)]
    pub fn cached(&self) -> (bool, bool, bool) {
        (
            self.metrics_and_methods.is_cached(),
            self.methods.is_cached(),
            self.mapping_rules.is_cached(),
        )
    }
}
