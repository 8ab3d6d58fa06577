//! Shared Kubernetes utilities using kube-rs
//!
//! Deletion tagging, object identity for logs, and API resource helpers used
//! by the kind registry.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PropagationPolicy;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use tracing::{info, warn};

// =============================================================================
// Deletion Tagging
// =============================================================================
//
// A desired object carrying `DELETE_TAG_ANNOTATION: "true"` means "this object
// must not exist". Tagging is distinct from absence: a tagged object that is
// already gone is a successful no-op, not an error.
// =============================================================================

/// Annotation marking a desired object for deletion
pub const DELETE_TAG_ANNOTATION: &str = "apps.3scale.net/delete";

/// Annotation selecting the propagation policy used when deleting
pub const DELETE_PROPAGATION_POLICY_ANNOTATION: &str = "apps.3scale.net/delete-propagation-policy";

const TAG_TRUE: &str = "true";

fn annotations_mut(meta: &mut ObjectMeta) -> &mut BTreeMap<String, String> {
    meta.annotations.get_or_insert_with(BTreeMap::new)
}

/// Mark an object as "should not exist"
pub fn tag_object_to_delete<K: Resource>(obj: &mut K) {
    annotations_mut(obj.meta_mut()).insert(DELETE_TAG_ANNOTATION.to_string(), TAG_TRUE.to_string());
}

/// Mark an object for deletion with an explicit propagation policy
pub fn tag_object_to_delete_with_propagation_policy<K: Resource>(
    obj: &mut K,
    policy: PropagationPolicy,
) {
    tag_object_to_delete(obj);
    annotations_mut(obj.meta_mut()).insert(
        DELETE_PROPAGATION_POLICY_ANNOTATION.to_string(),
        propagation_policy_str(&policy).to_string(),
    );
}

/// Whether an object is tagged for deletion
///
/// Only the exact value `"true"` counts as a tag.
pub fn is_object_tagged_to_delete<K: Resource>(obj: &K) -> bool {
    obj.annotations()
        .get(DELETE_TAG_ANNOTATION)
        .is_some_and(|v| v == TAG_TRUE)
}

/// Propagation policy requested by annotation
///
/// Unknown values are ignored with a warning and the store default applies.
pub fn delete_propagation_policy<K: Resource>(obj: &K) -> Option<PropagationPolicy>
where
    K::DynamicType: Default,
{
    let value = obj.annotations().get(DELETE_PROPAGATION_POLICY_ANNOTATION)?;
    match value.as_str() {
        "Foreground" => Some(PropagationPolicy::Foreground),
        "Background" => Some(PropagationPolicy::Background),
        "Orphan" => Some(PropagationPolicy::Orphan),
        other => {
            warn!(
                policy = %other,
                object = %object_info(obj),
                "ignoring unknown delete propagation policy"
            );
            None
        }
    }
}

fn propagation_policy_str(policy: &PropagationPolicy) -> &'static str {
    match policy {
        PropagationPolicy::Foreground => "Foreground",
        PropagationPolicy::Background => "Background",
        PropagationPolicy::Orphan => "Orphan",
    }
}

// =============================================================================
// Object Identity
// =============================================================================

/// Short identity for logs: `Kind/name`
pub fn object_info<K: Resource>(obj: &K) -> String
where
    K::DynamicType: Default,
{
    format!("{}/{}", K::kind(&K::DynamicType::default()), obj.name_any())
}

/// Namespaced key for logs: `namespace/name`
pub fn object_key<K: Resource>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{}/{}", ns, obj.name_any()),
        None => obj.name_any(),
    }
}

// =============================================================================
// ApiResource helpers
// =============================================================================

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use apiary_common::kube_utils::parse_api_version;
///
/// let (group, version) = parse_api_version("image.openshift.io/v1");
/// assert_eq!(group, "image.openshift.io");
/// assert_eq!(version, "v1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from a known apiVersion and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Look up a resource in pre-computed API discovery results.
///
/// Returns `None` if the CRD is not installed (not an error).
pub fn find_discovered_resource(
    discovery: &kube::discovery::Discovery,
    group: &str,
    kind: &str,
) -> Option<ApiResource> {
    for api_group in discovery.groups() {
        if api_group.name() != group {
            continue;
        }
        for (ar, _caps) in api_group.resources_by_stability() {
            if ar.kind == kind {
                info!(
                    group = %group,
                    kind = %kind,
                    api_version = %ar.api_version,
                    "discovered CRD version"
                );
                return Some(ar);
            }
        }
    }
    warn!(group = %group, kind = %kind, "CRD not found in API discovery");
    None
}

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("apps".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn untagged_object_is_not_marked() {
        assert!(!is_object_tagged_to_delete(&config_map("a")));
    }

    #[test]
    fn tagging_marks_object() {
        let mut cm = config_map("a");
        tag_object_to_delete(&mut cm);
        assert!(is_object_tagged_to_delete(&cm));
        assert!(delete_propagation_policy(&cm).is_none());
    }

    #[test]
    fn only_exact_true_counts_as_tag() {
        let mut cm = config_map("a");
        cm.metadata.annotations = Some(BTreeMap::from([(
            DELETE_TAG_ANNOTATION.to_string(),
            "yes".to_string(),
        )]));
        assert!(!is_object_tagged_to_delete(&cm));
    }

    #[test]
    fn propagation_policy_round_trips_through_annotation() {
        let mut cm = config_map("a");
        tag_object_to_delete_with_propagation_policy(&mut cm, PropagationPolicy::Foreground);
        assert!(is_object_tagged_to_delete(&cm));
        assert!(matches!(
            delete_propagation_policy(&cm),
            Some(PropagationPolicy::Foreground)
        ));
    }

    #[test]
    fn unknown_propagation_policy_is_ignored() {
        let mut cm = config_map("a");
        cm.metadata.annotations = Some(BTreeMap::from([(
            DELETE_PROPAGATION_POLICY_ANNOTATION.to_string(),
            "Sideways".to_string(),
        )]));
        assert!(delete_propagation_policy(&cm).is_none());
    }

    #[test]
    fn propagation_policy_on_custom_resource() {
        let mut am = crate::crd::ApiManager::new(
            "3scale",
            crate::crd::ApiManagerSpec {
                wildcard_domain: "example.com".to_string(),
                tenant_name: None,
            },
        );
        tag_object_to_delete_with_propagation_policy(&mut am, PropagationPolicy::Background);
        assert!(matches!(
            delete_propagation_policy(&am),
            Some(PropagationPolicy::Background)
        ));
        assert_eq!(object_info(&am), "APIManager/3scale");
    }

    #[test]
    fn object_info_uses_kind_and_name() {
        assert_eq!(object_info(&config_map("system-environment")), "ConfigMap/system-environment");
        assert_eq!(object_key(&config_map("x")), "apps/x");
    }

    #[test]
    fn pluralize_known_shapes() {
        assert_eq!(pluralize_kind("ImageStream"), "imagestreams");
        assert_eq!(pluralize_kind("PodMonitor"), "podmonitors");
        assert_eq!(pluralize_kind("GrafanaDashboard"), "grafanadashboards");
        assert_eq!(pluralize_kind("Policy"), "policies");
    }

    #[test]
    fn build_api_resource_splits_group() {
        let ar = build_api_resource("monitoring.coreos.com/v1", "PrometheusRule");
        assert_eq!(ar.group, "monitoring.coreos.com");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.plural, "prometheusrules");
    }
}
