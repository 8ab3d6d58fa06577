//! Portal admin API client
//!
//! [`PortalApi`] is the seam the entity wrappers talk through; tests mock it.
//! [`HttpPortalClient`] is the reqwest implementation: basic auth with an
//! empty user and the access token as password, form-encoded request bodies,
//! enveloped JSON responses.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use apiary_common::Error;

use crate::account::ProviderAccount;
use crate::config::PortalClientConfig;
use crate::types::{
    ApplicationItem, ApplicationPlanItem, BackendApiItem, BackendUsageItem, LimitItem,
    MappingRuleItem, MethodItem, MetricItem, Params, PricingRuleItem, ProductItem, ProxyItem,
    UnprocessableBody,
};
use crate::Result;

/// Owner of a metric/method/mapping-rule collection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiScope {
    /// A backend API
    Backend(i64),
    /// A product (service)
    Product(i64),
}

impl ApiScope {
    fn base(&self) -> String {
        match self {
            Self::Backend(id) => format!("/admin/api/backend_apis/{id}"),
            Self::Product(id) => format!("/admin/api/services/{id}"),
        }
    }

    fn metrics(&self) -> String {
        format!("{}/metrics", self.base())
    }

    fn methods(&self, hits_id: i64) -> String {
        format!("{}/metrics/{hits_id}/methods", self.base())
    }

    fn mapping_rules(&self) -> String {
        match self {
            Self::Backend(_) => format!("{}/mapping_rules", self.base()),
            Self::Product(_) => format!("{}/proxy/mapping_rules", self.base()),
        }
    }
}

impl fmt::Display for ApiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(id) => write!(f, "backend_api {id}"),
            Self::Product(id) => write!(f, "service {id}"),
        }
    }
}

/// Admin API operations used by the entity wrappers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// List all backend APIs of the tenant
    async fn list_backend_apis(&self) -> Result<Vec<BackendApiItem>>;
    /// Create a backend API
    async fn create_backend_api(&self, params: &Params) -> Result<BackendApiItem>;
    /// Read one backend API
    async fn read_backend_api(&self, id: i64) -> Result<BackendApiItem>;
    /// Update a backend API
    async fn update_backend_api(&self, id: i64, params: &Params) -> Result<BackendApiItem>;
    /// Delete a backend API
    async fn delete_backend_api(&self, id: i64) -> Result<()>;

    /// List all products of the tenant
    async fn list_products(&self) -> Result<Vec<ProductItem>>;
    /// Create a product
    async fn create_product(&self, params: &Params) -> Result<ProductItem>;
    /// Read one product
    async fn read_product(&self, id: i64) -> Result<ProductItem>;
    /// Update a product
    async fn update_product(&self, id: i64, params: &Params) -> Result<ProductItem>;
    /// Delete a product
    async fn delete_product(&self, id: i64) -> Result<()>;

    /// List metrics, including methods
    async fn list_metrics(&self, scope: ApiScope) -> Result<Vec<MetricItem>>;
    /// Create a metric
    async fn create_metric(&self, scope: ApiScope, params: &Params) -> Result<MetricItem>;
    /// Update a metric
    async fn update_metric(&self, scope: ApiScope, metric_id: i64, params: &Params)
        -> Result<MetricItem>;
    /// Delete a metric
    async fn delete_metric(&self, scope: ApiScope, metric_id: i64) -> Result<()>;

    /// List methods under the hits metric
    async fn list_methods(&self, scope: ApiScope, hits_id: i64) -> Result<Vec<MethodItem>>;
    /// Create a method under the hits metric
    async fn create_method(&self, scope: ApiScope, hits_id: i64, params: &Params)
        -> Result<MethodItem>;
    /// Update a method
    async fn update_method(
        &self,
        scope: ApiScope,
        hits_id: i64,
        method_id: i64,
        params: &Params,
    ) -> Result<MethodItem>;
    /// Delete a method
    async fn delete_method(&self, scope: ApiScope, hits_id: i64, method_id: i64) -> Result<()>;

    /// List mapping rules
    async fn list_mapping_rules(&self, scope: ApiScope) -> Result<Vec<MappingRuleItem>>;
    /// Create a mapping rule
    async fn create_mapping_rule(&self, scope: ApiScope, params: &Params)
        -> Result<MappingRuleItem>;
    /// Update a mapping rule
    async fn update_mapping_rule(
        &self,
        scope: ApiScope,
        rule_id: i64,
        params: &Params,
    ) -> Result<MappingRuleItem>;
    /// Delete a mapping rule
    async fn delete_mapping_rule(&self, scope: ApiScope, rule_id: i64) -> Result<()>;

    /// List backends mounted on a product
    async fn list_backend_usages(&self, product_id: i64) -> Result<Vec<BackendUsageItem>>;
    /// Mount a backend on a product
    async fn create_backend_usage(&self, product_id: i64, params: &Params)
        -> Result<BackendUsageItem>;
    /// Update a backend usage
    async fn update_backend_usage(
        &self,
        product_id: i64,
        usage_id: i64,
        params: &Params,
    ) -> Result<BackendUsageItem>;
    /// Unmount a backend
    async fn delete_backend_usage(&self, product_id: i64, usage_id: i64) -> Result<()>;

    /// Read the product's gateway configuration
    async fn read_proxy(&self, product_id: i64) -> Result<ProxyItem>;
    /// Update the product's gateway configuration
    async fn update_proxy(&self, product_id: i64, params: &Params) -> Result<ProxyItem>;
    /// Promote the current gateway configuration to staging
    async fn deploy_proxy(&self, product_id: i64) -> Result<ProxyItem>;

    /// List the product's application plans
    async fn list_application_plans(&self, product_id: i64) -> Result<Vec<ApplicationPlanItem>>;
    /// Create an application plan
    async fn create_application_plan(&self, product_id: i64, params: &Params)
        -> Result<ApplicationPlanItem>;
    /// Update an application plan
    async fn update_application_plan(
        &self,
        product_id: i64,
        plan_id: i64,
        params: &Params,
    ) -> Result<ApplicationPlanItem>;
    /// Delete an application plan
    async fn delete_application_plan(&self, product_id: i64, plan_id: i64) -> Result<()>;

    /// List a plan's limits
    async fn list_plan_limits(&self, plan_id: i64) -> Result<Vec<LimitItem>>;
    /// Create a limit on one metric of a plan
    async fn create_plan_limit(&self, plan_id: i64, metric_id: i64, params: &Params)
        -> Result<LimitItem>;
    /// Delete a limit
    async fn delete_plan_limit(&self, plan_id: i64, metric_id: i64, limit_id: i64) -> Result<()>;

    /// List a plan's pricing rules
    async fn list_plan_pricing_rules(&self, plan_id: i64) -> Result<Vec<PricingRuleItem>>;
    /// Create a pricing rule on one metric of a plan
    async fn create_plan_pricing_rule(
        &self,
        plan_id: i64,
        metric_id: i64,
        params: &Params,
    ) -> Result<PricingRuleItem>;
    /// Delete a pricing rule
    async fn delete_plan_pricing_rule(&self, plan_id: i64, metric_id: i64, rule_id: i64)
        -> Result<()>;

    /// Read a developer application
    async fn read_application(&self, account_id: i64, app_id: i64) -> Result<ApplicationItem>;
    /// Update a developer application
    async fn update_application(&self, account_id: i64, app_id: i64, params: &Params)
        -> Result<ApplicationItem>;
    /// Suspend a live application
    async fn suspend_application(&self, account_id: i64, app_id: i64) -> Result<ApplicationItem>;
    /// Resume a suspended application
    async fn resume_application(&self, account_id: i64, app_id: i64) -> Result<ApplicationItem>;
    /// Move an application to another plan
    async fn change_application_plan(&self, account_id: i64, app_id: i64, plan_id: i64)
        -> Result<ApplicationItem>;
    /// Delete a developer application
    async fn delete_application(&self, account_id: i64, app_id: i64) -> Result<()>;
}

/// Pull the single element out of `{"<key>": {...}}`
fn element<T: DeserializeOwned>(mut value: Value, key: &str) -> Result<T> {
    let inner = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| Error::serialization_for(key, format!("response has no '{key}' element")))?;
    Ok(serde_json::from_value(inner)?)
}

/// Pull the elements out of `{"<list_key>": [{"<key>": {...}}, ...]}`
///
/// With no `list_key` the response itself is the array.
fn elements<T: DeserializeOwned>(mut value: Value, list_key: Option<&str>, key: &str) -> Result<Vec<T>> {
    let list = match list_key {
        Some(list_key) => value.get_mut(list_key).map(Value::take).unwrap_or(Value::Null),
        None => value,
    };
    match list {
        Value::Array(items) => items.into_iter().map(|item| element(item, key)).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::serialization_for(
            key,
            format!("expected a list of '{key}', got {other}"),
        )),
    }
}

/// reqwest implementation of [`PortalApi`]
#[derive(Clone)]
pub struct HttpPortalClient {
    http: reqwest::Client,
    base: Url,
    token: String,
    debug: bool,
}

impl fmt::Debug for HttpPortalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPortalClient")
            .field("base", &self.base.as_str())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl HttpPortalClient {
    /// Build a client for the account's admin portal
    pub fn new(account: &ProviderAccount, config: &PortalClientConfig) -> Result<Self> {
        let base = Url::parse(&account.admin_url).map_err(|e| {
            Error::portal_for(
                "portal client",
                None,
                format!("invalid admin URL '{}': {e}", account.admin_url),
            )
        })?;

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::portal_for("portal client", None, e.to_string()))?;

        Ok(Self {
            http,
            base,
            token: account.token.clone(),
            debug: config.debug,
        })
    }

    /// Admin portal base URL
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Admin API path appended to the base URL, keeping any base path prefix
    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        url
    }

    async fn call(&self, method: Method, path: &str, form: Option<&Params>) -> Result<Value> {
        let context = format!("{method} {path}");
        let url = self.url(path);

        let mut request = self
            .http
            .request(method.clone(), url)
            .basic_auth("", Some(&self.token))
            .header(ACCEPT, "application/json");
        if let Some(form) = form {
            request = request.form(form);
        }

        if self.debug {
            debug!(%method, path = %path, params = form.map_or(0, |f| f.len()), "portal request");
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::portal_for(&context, None, e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::portal_for(&context, Some(status.as_u16()), e.to_string()))?;
        if self.debug {
            debug!(%method, path = %path, status = status.as_u16(), bytes = body.len(), "portal response");
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let parsed: UnprocessableBody = serde_json::from_str(&body).unwrap_or_default();
            let message = if parsed.errors.is_empty() {
                body
            } else {
                parsed.message()
            };
            return Err(Error::portal_for(context, Some(status.as_u16()), message));
        }
        if !status.is_success() {
            return Err(Error::portal_for(
                context,
                Some(status.as_u16()),
                format!("portal returned {status}: {body}"),
            ));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            Error::portal_for(context, Some(status.as_u16()), format!("decoding response: {e}"))
        })
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.call(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, params: &Params) -> Result<Value> {
        self.call(Method::POST, path, Some(params)).await
    }

    async fn put(&self, path: &str, params: &Params) -> Result<Value> {
        self.call(Method::PUT, path, Some(params)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.call(Method::DELETE, path, None).await.map(|_| ())
    }
}

#[async_trait]
impl PortalApi for HttpPortalClient {
    async fn list_backend_apis(&self) -> Result<Vec<BackendApiItem>> {
        let value = self.get("/admin/api/backend_apis.json").await?;
        elements(value, Some("backend_apis"), "backend_api")
    }

    async fn create_backend_api(&self, params: &Params) -> Result<BackendApiItem> {
        let value = self.post("/admin/api/backend_apis.json", params).await?;
        element(value, "backend_api")
    }

    async fn read_backend_api(&self, id: i64) -> Result<BackendApiItem> {
        let value = self.get(&format!("/admin/api/backend_apis/{id}.json")).await?;
        element(value, "backend_api")
    }

    async fn update_backend_api(&self, id: i64, params: &Params) -> Result<BackendApiItem> {
        let value = self
            .put(&format!("/admin/api/backend_apis/{id}.json"), params)
            .await?;
        element(value, "backend_api")
    }

    async fn delete_backend_api(&self, id: i64) -> Result<()> {
        self.delete(&format!("/admin/api/backend_apis/{id}.json")).await
    }

    async fn list_products(&self) -> Result<Vec<ProductItem>> {
        let value = self.get("/admin/api/services.json").await?;
        elements(value, Some("services"), "service")
    }

    async fn create_product(&self, params: &Params) -> Result<ProductItem> {
        let value = self.post("/admin/api/services.json", params).await?;
        element(value, "service")
    }

    async fn read_product(&self, id: i64) -> Result<ProductItem> {
        let value = self.get(&format!("/admin/api/services/{id}.json")).await?;
        element(value, "service")
    }

    async fn update_product(&self, id: i64, params: &Params) -> Result<ProductItem> {
        let value = self
            .put(&format!("/admin/api/services/{id}.json"), params)
            .await?;
        element(value, "service")
    }

    async fn delete_product(&self, id: i64) -> Result<()> {
        self.delete(&format!("/admin/api/services/{id}.json")).await
    }

    async fn list_metrics(&self, scope: ApiScope) -> Result<Vec<MetricItem>> {
        let value = self.get(&format!("{}.json", scope.metrics())).await?;
        elements(value, Some("metrics"), "metric")
    }

    async fn create_metric(&self, scope: ApiScope, params: &Params) -> Result<MetricItem> {
        let value = self.post(&format!("{}.json", scope.metrics()), params).await?;
        element(value, "metric")
    }

    async fn update_metric(
        &self,
        scope: ApiScope,
        metric_id: i64,
        params: &Params,
    ) -> Result<MetricItem> {
        let path = format!("{}/{metric_id}.json", scope.metrics());
        element(self.put(&path, params).await?, "metric")
    }

    async fn delete_metric(&self, scope: ApiScope, metric_id: i64) -> Result<()> {
        self.delete(&format!("{}/{metric_id}.json", scope.metrics()))
            .await
    }

    async fn list_methods(&self, scope: ApiScope, hits_id: i64) -> Result<Vec<MethodItem>> {
        let value = self.get(&format!("{}.json", scope.methods(hits_id))).await?;
        elements(value, Some("methods"), "method")
    }

    async fn create_method(
        &self,
        scope: ApiScope,
        hits_id: i64,
        params: &Params,
    ) -> Result<MethodItem> {
        let path = format!("{}.json", scope.methods(hits_id));
        element(self.post(&path, params).await?, "method")
    }

    async fn update_method(
        &self,
        scope: ApiScope,
        hits_id: i64,
        method_id: i64,
        params: &Params,
    ) -> Result<MethodItem> {
        let path = format!("{}/{method_id}.json", scope.methods(hits_id));
        element(self.put(&path, params).await?, "method")
    }

    async fn delete_method(&self, scope: ApiScope, hits_id: i64, method_id: i64) -> Result<()> {
        self.delete(&format!("{}/{method_id}.json", scope.methods(hits_id)))
            .await
    }

    async fn list_mapping_rules(&self, scope: ApiScope) -> Result<Vec<MappingRuleItem>> {
        let value = self.get(&format!("{}.json", scope.mapping_rules())).await?;
        elements(value, Some("mapping_rules"), "mapping_rule")
    }

    async fn create_mapping_rule(
        &self,
        scope: ApiScope,
        params: &Params,
    ) -> Result<MappingRuleItem> {
        let path = format!("{}.json", scope.mapping_rules());
        element(self.post(&path, params).await?, "mapping_rule")
    }

    async fn update_mapping_rule(
        &self,
        scope: ApiScope,
        rule_id: i64,
        params: &Params,
    ) -> Result<MappingRuleItem> {
        let path = format!("{}/{rule_id}.json", scope.mapping_rules());
        element(self.put(&path, params).await?, "mapping_rule")
    }

    async fn delete_mapping_rule(&self, scope: ApiScope, rule_id: i64) -> Result<()> {
        self.delete(&format!("{}/{rule_id}.json", scope.mapping_rules()))
            .await
    }

    async fn list_backend_usages(&self, product_id: i64) -> Result<Vec<BackendUsageItem>> {
        let path = format!("/admin/api/services/{product_id}/backend_usages.json");
        elements(self.get(&path).await?, None, "backend_usage")
    }

    async fn create_backend_usage(
        &self,
        product_id: i64,
        params: &Params,
    ) -> Result<BackendUsageItem> {
        let path = format!("/admin/api/services/{product_id}/backend_usages.json");
        element(self.post(&path, params).await?, "backend_usage")
    }

    async fn update_backend_usage(
        &self,
        product_id: i64,
        usage_id: i64,
        params: &Params,
    ) -> Result<BackendUsageItem> {
        let path = format!("/admin/api/services/{product_id}/backend_usages/{usage_id}.json");
        element(self.put(&path, params).await?, "backend_usage")
    }

    async fn delete_backend_usage(&self, product_id: i64, usage_id: i64) -> Result<()> {
        self.delete(&format!(
            "/admin/api/services/{product_id}/backend_usages/{usage_id}.json"
        ))
        .await
    }

    async fn read_proxy(&self, product_id: i64) -> Result<ProxyItem> {
        let path = format!("/admin/api/services/{product_id}/proxy.json");
        element(self.get(&path).await?, "proxy")
    }

    async fn update_proxy(&self, product_id: i64, params: &Params) -> Result<ProxyItem> {
        let path = format!("/admin/api/services/{product_id}/proxy.json");
        let value = self.call(Method::PATCH, &path, Some(params)).await?;
        element(value, "proxy")
    }

    async fn deploy_proxy(&self, product_id: i64) -> Result<ProxyItem> {
        let path = format!("/admin/api/services/{product_id}/proxy/deploy.json");
        element(self.post(&path, &Params::new()).await?, "proxy")
    }

    async fn list_application_plans(&self, product_id: i64) -> Result<Vec<ApplicationPlanItem>> {
        let path = format!("/admin/api/services/{product_id}/application_plans.json");
        elements(self.get(&path).await?, Some("plans"), "application_plan")
    }

    async fn create_application_plan(
        &self,
        product_id: i64,
        params: &Params,
    ) -> Result<ApplicationPlanItem> {
        let path = format!("/admin/api/services/{product_id}/application_plans.json");
        element(self.post(&path, params).await?, "application_plan")
    }

    async fn update_application_plan(
        &self,
        product_id: i64,
        plan_id: i64,
        params: &Params,
    ) -> Result<ApplicationPlanItem> {
        let path = format!("/admin/api/services/{product_id}/application_plans/{plan_id}.json");
        element(self.put(&path, params).await?, "application_plan")
    }

    async fn delete_application_plan(&self, product_id: i64, plan_id: i64) -> Result<()> {
        self.delete(&format!(
            "/admin/api/services/{product_id}/application_plans/{plan_id}.json"
        ))
        .await
    }

    async fn list_plan_limits(&self, plan_id: i64) -> Result<Vec<LimitItem>> {
        let path = format!("/admin/api/application_plans/{plan_id}/limits.json");
        elements(self.get(&path).await?, Some("limits"), "limit")
    }

    async fn create_plan_limit(
        &self,
        plan_id: i64,
        metric_id: i64,
        params: &Params,
    ) -> Result<LimitItem> {
        let path = format!("/admin/api/application_plans/{plan_id}/metrics/{metric_id}/limits.json");
        element(self.post(&path, params).await?, "limit")
    }

    async fn delete_plan_limit(&self, plan_id: i64, metric_id: i64, limit_id: i64) -> Result<()> {
        self.delete(&format!(
            "/admin/api/application_plans/{plan_id}/metrics/{metric_id}/limits/{limit_id}.json"
        ))
        .await
    }

    async fn list_plan_pricing_rules(&self, plan_id: i64) -> Result<Vec<PricingRuleItem>> {
        let path = format!("/admin/api/application_plans/{plan_id}/pricing_rules.json");
        elements(self.get(&path).await?, Some("pricing_rules"), "pricing_rule")
    }

    async fn create_plan_pricing_rule(
        &self,
        plan_id: i64,
        metric_id: i64,
        params: &Params,
    ) -> Result<PricingRuleItem> {
        let path = format!(
            "/admin/api/application_plans/{plan_id}/metrics/{metric_id}/pricing_rules.json"
        );
        element(self.post(&path, params).await?, "pricing_rule")
    }

    async fn delete_plan_pricing_rule(
        &self,
        plan_id: i64,
        metric_id: i64,
        rule_id: i64,
    ) -> Result<()> {
        self.delete(&format!(
            "/admin/api/application_plans/{plan_id}/metrics/{metric_id}/pricing_rules/{rule_id}.json"
        ))
        .await
    }

    async fn read_application(&self, account_id: i64, app_id: i64) -> Result<ApplicationItem> {
        let path = format!("/admin/api/accounts/{account_id}/applications/{app_id}.json");
        element(self.get(&path).await?, "application")
    }

    async fn update_application(
        &self,
        account_id: i64,
        app_id: i64,
        params: &Params,
    ) -> Result<ApplicationItem> {
        let path = format!("/admin/api/accounts/{account_id}/applications/{app_id}.json");
        element(self.put(&path, params).await?, "application")
    }

    async fn suspend_application(&self, account_id: i64, app_id: i64) -> Result<ApplicationItem> {
        let path = format!("/admin/api/accounts/{account_id}/applications/{app_id}/suspend.json");
        element(self.put(&path, &Params::new()).await?, "application")
    }

    async fn resume_application(&self, account_id: i64, app_id: i64) -> Result<ApplicationItem> {
        let path = format!("/admin/api/accounts/{account_id}/applications/{app_id}/resume.json");
        element(self.put(&path, &Params::new()).await?, "application")
    }

    async fn change_application_plan(
        &self,
        account_id: i64,
        app_id: i64,
        plan_id: i64,
    ) -> Result<ApplicationItem> {
        let path =
            format!("/admin/api/accounts/{account_id}/applications/{app_id}/change_plan.json");
        let params = crate::types::params([("plan_id", plan_id.to_string())]);
        element(self.put(&path, &params).await?, "application")
    }

    async fn delete_application(&self, account_id: i64, app_id: i64) -> Result<()> {
        self.delete(&format!(
            "/admin/api/accounts/{account_id}/applications/{app_id}.json"
        ))
        .await
    }
}
