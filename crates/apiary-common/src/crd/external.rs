//! Third-party kinds reconciled alongside core Kubernetes objects
//!
//! These CRDs are owned by other projects. Only the fields apiary mutates
//! are modelled; unknown fields are preserved through `extra`.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source an image stream tag points at
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    /// Kind of the source (e.g., "DockerImage")
    pub kind: String,
    /// Source name (e.g., "quay.io/3scale/apicast:latest")
    pub name: String,
}

/// How often and whether a tag is re-imported
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagImportPolicy {
    /// Whether insecure registries are allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    /// Whether the tag is periodically re-imported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<bool>,
}

/// One named tag of an image stream
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamTag {
    /// Tag name
    pub name: String,
    /// Image the tag resolves to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TagReference>,
    /// Re-import policy
    #[serde(default)]
    pub import_policy: TagImportPolicy,
    /// Tag annotations, not reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// OpenShift image stream
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "image.openshift.io",
    version = "v1",
    kind = "ImageStream",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamSpec {
    /// Named tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<ImageStreamTag>,
}

/// Grafana dashboard managed by the grafana operator
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "integreatly.org",
    version = "v1alpha1",
    kind = "GrafanaDashboard",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaDashboardSpec {
    /// Dashboard JSON document
    #[serde(default)]
    pub json: String,

    /// Dashboard file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Fields apiary does not reconcile
    #[serde(flatten)]
    #[schemars(skip)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
