//! Product and Backend declarative objects
//!
//! These mirror entities that live behind the portal API. The controller
//! translates their spec into portal calls and records the remote ID plus a
//! `Synced` condition in status.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ConditionSet, LocalSecretRef, CONDITION_SYNCED};
use super::{ProviderAccountScoped, Synchronizable};
use crate::validation::{FieldError, FieldErrorList, SpecErrorKind};
use crate::Result;

/// Reserved system name of the built-in hits metric
pub const HITS_SYSTEM_NAME: &str = "hits";

/// A metric declared on a backend or product
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricSpec {
    /// Display name
    pub friendly_name: String,
    /// Measurement unit (e.g., "hit")
    pub unit: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A method declared on a backend or product (child of hits)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodSpec {
    /// Display name
    pub friendly_name: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A mapping rule binding a request pattern to a metric or method
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MappingRuleSpec {
    /// HTTP verb
    pub http_method: String,
    /// Request path pattern
    pub pattern: String,
    /// System name of the metric or method to increment
    pub metric_method_ref: String,
    /// Increment amount
    pub increment: i64,
    /// Stop evaluating further rules when this one matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<bool>,
}

/// Common validation for metrics, methods and mapping rules
fn validate_metrics_methods(
    metrics: &BTreeMap<String, MetricSpec>,
    methods: &BTreeMap<String, MethodSpec>,
    mapping_rules: &[MappingRuleSpec],
    errors: &mut FieldErrorList,
) {
    if methods.contains_key(HITS_SYSTEM_NAME) {
        errors.push(FieldError::new(
            "spec.methods",
            HITS_SYSTEM_NAME,
            "hits is reserved for the built-in metric",
        ));
    }

    for name in methods.keys().filter(|name| metrics.contains_key(*name)) {
        errors.push(FieldError::new(
            "spec.methods",
            name,
            "system name is also used by a metric",
        ));
    }

    for (idx, rule) in mapping_rules.iter().enumerate() {
        let known = rule.metric_method_ref == HITS_SYSTEM_NAME
            || metrics.contains_key(&rule.metric_method_ref)
            || methods.contains_key(&rule.metric_method_ref);
        if !known {
            errors.push(FieldError::new(
                format!("spec.mappingRules[{idx}].metricMethodRef"),
                &rule.metric_method_ref,
                "unknown metric or method",
            ));
        }
    }
}

/// Backend API served behind one or more products
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "capabilities.3scale.net",
    version = "v1beta1",
    kind = "Backend",
    namespaced,
    status = "BackendStatus",
    printcolumn = r#"{"name":"SystemName","type":"string","jsonPath":".spec.systemName"}"#,
    printcolumn = r#"{"name":"ID","type":"integer","jsonPath":".status.backendId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    /// Display name
    pub name: String,

    /// Unique system name within the tenant
    pub system_name: String,

    /// Upstream URL the gateway forwards to
    #[serde(rename = "privateBaseURL")]
    pub private_base_url: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Metrics keyed by system name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, MetricSpec>,

    /// Methods keyed by system name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<String, MethodSpec>,

    /// Ordered mapping rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping_rules: Vec<MappingRuleSpec>,

    /// Secret holding tenant credentials; resolved by convention when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_ref: Option<LocalSecretRef>,
}

impl BackendSpec {
    /// Validate the spec, accumulating every field error
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrorList::new();
        if self.system_name.is_empty() {
            errors.push(FieldError::new("spec.systemName", "", "must not be empty"));
        }
        if self.private_base_url.is_empty() {
            errors.push(FieldError::new("spec.privateBaseURL", "", "must not be empty"));
        }
        validate_metrics_methods(&self.metrics, &self.methods, &self.mapping_rules, &mut errors);
        Ok(errors.into_result(SpecErrorKind::Invalid)?)
    }
}

/// Backend status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    /// Remote ID once created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<i64>,

    /// Admin host of the tenant the backend lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_host: Option<String>,

    /// Generation last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default)]
    pub conditions: ConditionSet,
}

impl BackendStatus {
    /// Whether the remote backend matches the spec
    pub fn is_synced(&self) -> bool {
        self.conditions.is_true_for(CONDITION_SYNCED)
    }
}

impl Synchronizable for Backend {
    fn conditions(&self) -> Option<&ConditionSet> {
        self.status.as_ref().map(|s| &s.conditions)
    }
}

impl ProviderAccountScoped for Backend {
    fn provider_account_ref(&self) -> Option<&LocalSecretRef> {
        self.spec.provider_account_ref.as_ref()
    }
}

/// Reference from a product to a backend, mounted at a path
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendUsageSpec {
    /// Path prefix the backend is mounted at
    pub path: String,
}

/// Application plan declared on a product
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPlanSpec {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether applications need approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_requires_approval: Option<bool>,
    /// Trial period length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_period: Option<i64>,
    /// One-off setup fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_fee: Option<String>,
    /// Monthly fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_month: Option<String>,
    /// Whether the plan is published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// API product exposed to developers
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "capabilities.3scale.net",
    version = "v1beta1",
    kind = "Product",
    namespaced,
    status = "ProductStatus",
    printcolumn = r#"{"name":"SystemName","type":"string","jsonPath":".spec.systemName"}"#,
    printcolumn = r#"{"name":"ID","type":"integer","jsonPath":".status.productId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProductSpec {
    /// Display name
    pub name: String,

    /// Unique system name within the tenant
    pub system_name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Metrics keyed by system name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, MetricSpec>,

    /// Methods keyed by system name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<String, MethodSpec>,

    /// Ordered mapping rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping_rules: Vec<MappingRuleSpec>,

    /// Backends keyed by backend system name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backend_usages: BTreeMap<String, BackendUsageSpec>,

    /// Application plans keyed by plan system name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub application_plans: BTreeMap<String, ApplicationPlanSpec>,

    /// Secret holding tenant credentials; resolved by convention when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_ref: Option<LocalSecretRef>,
}

impl ProductSpec {
    /// Validate the spec, accumulating every field error
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrorList::new();
        if self.system_name.is_empty() {
            errors.push(FieldError::new("spec.systemName", "", "must not be empty"));
        }
        validate_metrics_methods(&self.metrics, &self.methods, &self.mapping_rules, &mut errors);

        let mut paths: BTreeMap<&str, &str> = BTreeMap::new();
        for (backend, usage) in &self.backend_usages {
            if let Some(other) = paths.insert(usage.path.as_str(), backend.as_str()) {
                errors.push(FieldError::new(
                    format!("spec.backendUsages.{backend}.path"),
                    &usage.path,
                    format!("path already used by backend {other}"),
                ));
            }
        }
        Ok(errors.into_result(SpecErrorKind::Invalid)?)
    }
}

/// Product status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductStatus {
    /// Remote ID once created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,

    /// Admin host of the tenant the product lives in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_host: Option<String>,

    /// Generation last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default)]
    pub conditions: ConditionSet,
}

impl Synchronizable for Product {
    fn conditions(&self) -> Option<&ConditionSet> {
        self.status.as_ref().map(|s| &s.conditions)
    }
}

impl ProviderAccountScoped for Product {
    fn provider_account_ref(&self) -> Option<&LocalSecretRef> {
        self.spec.provider_account_ref.as_ref()
    }
}
