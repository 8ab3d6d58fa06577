//! Portal wire types
//!
//! The admin API wraps every element in an envelope named after its kind
//! (`{"backend_api": {...}}`) and every list in a plural envelope
//! (`{"backend_apis": [...]}`). The client strips envelopes; these types are
//! the bare elements. Fields the portal may omit default to zero values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Form parameters for create/update calls
pub type Params = BTreeMap<String, String>;

/// Build [`Params`] from key/value pairs
pub fn params<const N: usize>(pairs: [(&str, String); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Backend API element
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackendApiItem {
    /// Remote ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Unique system name
    pub system_name: String,
    /// Free-form description
    pub description: String,
    /// Upstream URL
    pub private_endpoint: String,
    /// Owning account
    pub account_id: i64,
}

/// Product (service) element
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProductItem {
    /// Remote ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Unique system name
    pub system_name: String,
    /// Free-form description
    pub description: String,
    /// Lifecycle state
    pub state: String,
    /// Gateway deployment option (e.g., "hosted", "self_managed")
    pub deployment_option: String,
    /// Authentication mode ("1", "2", "oidc")
    pub backend_version: String,
}

/// Metric element
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricItem {
    /// Remote ID
    pub id: i64,
    /// Display name
    #[serde(rename = "friendly_name")]
    pub name: String,
    /// System name
    pub system_name: String,
    /// Free-form description
    pub description: String,
    /// Measurement unit
    pub unit: String,
}

/// Method element (a child metric of hits)
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MethodItem {
    /// Remote ID
    pub id: i64,
    /// Display name
    #[serde(rename = "friendly_name")]
    pub name: String,
    /// System name
    pub system_name: String,
    /// Free-form description
    pub description: String,
    /// ID of the parent metric
    pub parent_id: i64,
}

/// Mapping rule element
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MappingRuleItem {
    /// Remote ID
    pub id: i64,
    /// Metric or method incremented on match
    pub metric_id: i64,
    /// Request path pattern
    pub pattern: String,
    /// HTTP verb
    pub http_method: String,
    /// Increment amount
    pub delta: i64,
    /// Evaluation order
    pub position: i64,
    /// Stop evaluating after a match
    pub last: bool,
}

/// Backend usage element (backend mounted on a product)
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackendUsageItem {
    /// Remote ID
    pub id: i64,
    /// Mount path
    pub path: String,
    /// Owning product
    #[serde(rename = "service_id")]
    pub product_id: i64,
    /// Mounted backend
    pub backend_id: i64,
}

/// Product proxy (gateway) configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyItem {
    /// Owning product
    pub service_id: i64,
    /// Production public endpoint
    pub endpoint: String,
    /// Staging public endpoint
    pub sandbox_endpoint: String,
    /// Where credentials are read from ("headers", "query", "authorization")
    pub credentials_location: String,
    /// Parameter name of the application key
    pub auth_app_key: String,
    /// Parameter name of the application id
    pub auth_app_id: String,
    /// Parameter name of the user key
    pub auth_user_key: String,
    /// Body returned on auth failure
    pub error_auth_failed: String,
    /// Status returned on auth failure
    pub error_status_auth_failed: i64,
    /// Content type returned on auth failure
    pub error_headers_auth_failed: String,
    /// Body returned on missing credentials
    pub error_auth_missing: String,
    /// Status returned on missing credentials
    pub error_status_auth_missing: i64,
    /// Content type returned on missing credentials
    pub error_headers_auth_missing: String,
    /// Body returned when no mapping rule matches
    pub error_no_match: String,
    /// Status returned when no mapping rule matches
    pub error_status_no_match: i64,
    /// Content type returned when no mapping rule matches
    pub error_headers_no_match: String,
    /// Body returned when usage limits are exceeded
    pub error_limits_exceeded: String,
    /// Status returned when usage limits are exceeded
    pub error_status_limits_exceeded: i64,
    /// Content type returned when usage limits are exceeded
    pub error_headers_limits_exceeded: String,
    /// Token sent to upstream to prove the request came from the gateway
    pub secret_token: String,
    /// Host header override for upstream
    pub hostname_rewrite: String,
    /// OIDC issuer
    pub oidc_issuer_endpoint: String,
    /// Optimistic-lock version
    pub lock_version: i64,
}

/// Application plan element
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApplicationPlanItem {
    /// Remote ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// System name
    pub system_name: String,
    /// "published" or "hidden"
    pub state: String,
    /// One-off fee
    pub setup_fee: f64,
    /// Monthly fee
    pub cost_per_month: f64,
    /// Trial length
    pub trial_period_days: i64,
    /// Cancellation notice period
    pub cancellation_period: i64,
    /// Applications need approval
    pub approval_required: bool,
    /// Default plan of the product
    pub default: bool,
    /// Custom (per-application) plan
    pub custom: bool,
}

/// Usage limit on one metric of a plan
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitItem {
    /// Remote ID
    pub id: i64,
    /// Time window ("minute", "hour", "day", ...)
    pub period: String,
    /// Maximum value in the window
    pub value: i64,
    /// Limited metric
    pub metric_id: i64,
    /// Owning plan
    pub plan_id: i64,
}

/// Pricing rule on one metric of a plan
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PricingRuleItem {
    /// Remote ID
    pub id: i64,
    /// Priced metric
    pub metric_id: i64,
    /// Price per unit as a decimal string
    pub cost_per_unit: String,
    /// Lower bound of the usage range
    pub min: i64,
    /// Upper bound of the usage range
    pub max: i64,
}

/// Developer application element
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApplicationItem {
    /// Remote ID
    pub id: i64,
    /// "live", "suspended" or "pending"
    pub state: String,
    /// Owning developer account
    pub user_account_id: String,
    /// Product the application subscribes to
    pub service_id: i64,
    /// Current plan
    pub plan_id: i64,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// API key, for user-key products
    pub user_key: String,
}

/// Validation error body returned with HTTP 422
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct UnprocessableBody {
    #[serde(default)]
    pub errors: BTreeMap<String, serde_json::Value>,
}

impl UnprocessableBody {
    /// Render `{"field": ["msg", ...]}` as `field: msg; ...`
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|(field, msgs)| match msgs {
                serde_json::Value::Array(list) => {
                    let joined = list
                        .iter()
                        .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{field}: {joined}")
                }
                other => format!("{field}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
