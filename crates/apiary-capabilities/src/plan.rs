//! Remote application plan wrapper

use std::sync::Arc;

use crate::cache::CachedCell;
use crate::client::PortalApi;
use crate::types::{ApplicationPlanItem, LimitItem, Params, PricingRuleItem};
use crate::Result;

/// Plan state meaning "visible to developers"
const PUBLISHED_STATE: &str = "published";

/// An application plan of one product, with lazily loaded limits and
/// pricing rules
pub struct ApplicationPlanEntity {
    api: Arc<dyn PortalApi>,
    product_id: i64,
    item: ApplicationPlanItem,
    limits: CachedCell<Vec<LimitItem>>,
    pricing_rules: CachedCell<Vec<PricingRuleItem>>,
}

impl ApplicationPlanEntity {
    /// Wrap a plan element of the given product
    pub fn new(api: Arc<dyn PortalApi>, product_id: i64, item: ApplicationPlanItem) -> Self {
        Self {
            api,
            product_id,
            item,
            limits: CachedCell::new(),
            pricing_rules: CachedCell::new(),
        }
    }

    /// Remote ID
    pub fn id(&self) -> i64 {
        self.item.id
    }

    /// Owning product
    pub fn product_id(&self) -> i64 {
        self.product_id
    }

    /// System name
    pub fn system_name(&self) -> &str {
        &self.item.system_name
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.item.name
    }

    /// Whether applications need approval
    pub fn approval_required(&self) -> bool {
        self.item.approval_required
    }

    /// Trial length in days
    pub fn trial_period_days(&self) -> i64 {
        self.item.trial_period_days
    }

    /// One-off fee
    pub fn setup_fee(&self) -> f64 {
        self.item.setup_fee
    }

    /// Monthly fee
    pub fn cost_per_month(&self) -> f64 {
        self.item.cost_per_month
    }

    /// Lifecycle state
    pub fn state(&self) -> &str {
        &self.item.state
    }

    /// Whether developers can see the plan
    pub fn is_published(&self) -> bool {
        self.item.state == PUBLISHED_STATE
    }

    fn context(&self, op: &str) -> String {
        format!("application plan [{}] {op}", self.item.system_name)
    }

    /// Update the plan; the held element is replaced by the response
    pub async fn update(&mut self, params: &Params) -> Result<()> {
        let ctx = format!(
            "product [{}] plan [{}] update",
            self.product_id, self.item.system_name
        );
        self.item = self
            .api
            .update_application_plan(self.product_id, self.item.id, params)
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(())
    }

    /// Usage limits
    pub async fn limits(&mut self) -> Result<Vec<LimitItem>> {
        let api = self.api.as_ref();
        let id = self.item.id;
        let ctx = self.context("get limits");
        let limits = self
            .limits
            .get_or_try_fetch(|| api.list_plan_limits(id))
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(limits.clone())
    }

    /// Create a limit on one metric
    pub async fn create_limit(&mut self, metric_id: i64, params: &Params) -> Result<LimitItem> {
        let created = self
            .api
            .create_plan_limit(self.item.id, metric_id, params)
            .await
            .map_err(|e| e.with_context(self.context("create limit")))?;
        self.limits.invalidate();
        Ok(created)
    }

    /// Delete a limit
    pub async fn delete_limit(&mut self, metric_id: i64, limit_id: i64) -> Result<()> {
        self.api
            .delete_plan_limit(self.item.id, metric_id, limit_id)
            .await
            .map_err(|e| e.with_context(self.context("delete limit")))?;
        self.limits.invalidate();
        Ok(())
    }

    /// Pricing rules
    pub async fn pricing_rules(&mut self) -> Result<Vec<PricingRuleItem>> {
        let api = self.api.as_ref();
        let id = self.item.id;
        let ctx = self.context("get pricing rules");
        let rules = self
            .pricing_rules
            .get_or_try_fetch(|| api.list_plan_pricing_rules(id))
            .await
            .map_err(|e| e.with_context(ctx))?;
        Ok(rules.clone())
    }

    /// Create a pricing rule on one metric
    pub async fn create_pricing_rule(&mut self, metric_id: i64, params: &Params) -> Result<PricingRuleItem> {
        let created = self
            .api
            .create_plan_pricing_rule(self.item.id, metric_id, params)
            .await
            .map_err(|e| e.with_context(self.context("create pricing rule")))?;
        self.pricing_rules.invalidate();
        Ok(created)
    }

    /// Delete a pricing rule
    pub async fn delete_pricing_rule(&mut self, metric_id: i64, rule_id: i64) -> Result<()> {
        self.api
            .delete_plan_pricing_rule(self.item.id, metric_id, rule_id)
            .await
            .map_err(|e| e.with_context(self.context("delete pricing rule")))?;
        self.pricing_rules.invalidate();
        Ok(())
    }
}
