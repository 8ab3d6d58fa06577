//! APIManager: the in-cluster management installation
//!
//! Only the fields needed to synthesize a tenant admin URL are modelled. A
//! namespace holds at most one APIManager; when several exist the first
//! listed wins.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tenant name used when the installation does not override it
pub const DEFAULT_TENANT_NAME: &str = "3scale";

fn default_tenant_name() -> Option<String> {
    Some(DEFAULT_TENANT_NAME.to_string())
}

/// APIManager describes one management installation
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "apps.3scale.net",
    version = "v1alpha1",
    kind = "APIManager",
    root = "ApiManager",
    plural = "apimanagers",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ApiManagerSpec {
    /// Wildcard DNS domain all installation routes hang off
    pub wildcard_domain: String,

    /// Name of the default tenant
    #[serde(default = "default_tenant_name", skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

impl ApiManagerSpec {
    /// Admin portal URL of the default tenant, if a tenant name is set
    pub fn tenant_admin_url(&self) -> Option<String> {
        self.tenant_name
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|tenant| format!("https://{}-admin.{}", tenant, self.wildcard_domain))
    }
}
