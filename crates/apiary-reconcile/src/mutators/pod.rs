//! Pod template mutators
//!
//! Workload kinds expose their pod template through [`PodTemplateOwner`], so
//! each mutator is written once and applies to Deployments, StatefulSets and
//! DaemonSets alike. Ordered lists and structs (tolerations, affinity,
//! probes, args) are compared structurally and replaced as a whole.

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::Resource;
use tracing::{debug, info};

use apiary_common::kube_utils::object_info;
use apiary_common::Error;

use super::meta::{annotations, merge_map};
use super::storage::quantities_equal;
use crate::mutator::MutatorChain;
use crate::Result;

// =============================================================================
// Capability
// =============================================================================

/// Object kinds that carry a pod template
pub trait PodTemplateOwner: Resource<DynamicType = ()> {
    /// The pod template, if the spec is set
    fn pod_template(&self) -> Option<&PodTemplateSpec>;

    /// The pod template, creating an empty spec if needed
    fn pod_template_mut(&mut self) -> &mut PodTemplateSpec;
}

impl PodTemplateOwner for Deployment {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplateOwner for StatefulSet {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplateOwner for DaemonSet {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

/// Pod spec of a workload, if set
pub fn pod_spec<K: PodTemplateOwner>(obj: &K) -> Option<&PodSpec> {
    obj.pod_template().and_then(|t| t.spec.as_ref())
}

/// Pod spec of a workload, created empty if missing
pub fn pod_spec_mut<K: PodTemplateOwner>(obj: &mut K) -> &mut PodSpec {
    obj.pod_template_mut()
        .spec
        .get_or_insert_with(Default::default)
}

/// Containers of a workload (empty if unset)
pub fn containers<K: PodTemplateOwner>(obj: &K) -> &[Container] {
    pod_spec(obj)
        .map(|s| s.containers.as_slice())
        .unwrap_or_default()
}

/// Init containers of a workload (empty if unset)
pub fn init_containers<K: PodTemplateOwner>(obj: &K) -> &[Container] {
    pod_spec(obj)
        .and_then(|s| s.init_containers.as_deref())
        .unwrap_or_default()
}

// =============================================================================
// Helpers
// =============================================================================

/// Replace one pod spec field when it differs
fn sync_pod_field<K, T>(
    desired: &K,
    existing: &mut K,
    field: &'static str,
    get: impl Fn(&PodSpec) -> &T,
    get_mut: impl Fn(&mut PodSpec) -> &mut T,
) -> bool
where
    K: PodTemplateOwner,
    T: PartialEq + Clone,
{
    let empty = PodSpec::default();
    let want = get(pod_spec(desired).unwrap_or(&empty));
    let have = get(pod_spec(existing).unwrap_or(&empty));
    if want == have {
        return false;
    }

    info!(
        object = %object_info(desired),
        field,
        "spec.template.spec field changed"
    );
    *get_mut(pod_spec_mut(existing)) = want.clone();
    true
}

/// Replace one container field, index by index, over the shared prefix
fn sync_container_field<T: PartialEq + Clone>(
    desired: &[Container],
    existing: &mut [Container],
    get: impl Fn(&Container) -> &T,
    get_mut: impl Fn(&mut Container) -> &mut T,
) -> bool {
    let mut changed = false;
    for (want, have) in desired.iter().zip(existing.iter_mut()) {
        if get(want) != get(have) {
            *get_mut(have) = get(want).clone();
            changed = true;
        }
    }
    changed
}

/// Apply `sync_container_field` to regular containers if any differ
fn sync_containers<K, T>(
    desired: &K,
    existing: &mut K,
    get: impl Fn(&Container) -> &T,
    get_mut: impl Fn(&mut Container) -> &mut T,
) -> bool
where
    K: PodTemplateOwner,
    T: PartialEq + Clone,
{
    let differs = containers(desired)
        .iter()
        .zip(containers(existing))
        .any(|(d, e)| get(d) != get(e));
    if !differs {
        return false;
    }
    sync_container_field(
        containers(desired),
        &mut pod_spec_mut(existing).containers,
        get,
        get_mut,
    )
}

// =============================================================================
// Scheduling and placement
// =============================================================================

/// Pod affinity, replaced as a whole
pub fn affinity<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    Ok(sync_pod_field(desired, existing, "affinity", |s| &s.affinity, |s| &mut s.affinity))
}

/// Tolerations, replaced as a whole
pub fn tolerations<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    Ok(sync_pod_field(
        desired,
        existing,
        "tolerations",
        |s| &s.tolerations,
        |s| &mut s.tolerations,
    ))
}

/// Priority class name
pub fn priority_class<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    Ok(sync_pod_field(
        desired,
        existing,
        "priorityClassName",
        |s| &s.priority_class_name,
        |s| &mut s.priority_class_name,
    ))
}

/// Topology spread constraints, replaced as a whole
pub fn topology_spread_constraints<K: PodTemplateOwner>(
    desired: &K,
    existing: &mut K,
) -> Result<bool> {
    Ok(sync_pod_field(
        desired,
        existing,
        "topologySpreadConstraints",
        |s| &s.topology_spread_constraints,
        |s| &mut s.topology_spread_constraints,
    ))
}

// =============================================================================
// Pod template metadata
// =============================================================================

/// Additive merge of pod template labels
pub fn pod_template_labels<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let want = desired
        .pod_template()
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.labels.as_ref());
    let Some(want) = want.filter(|w| !w.is_empty()) else {
        return Ok(false);
    };
    let have = existing
        .pod_template()
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.labels.as_ref());
    if have.is_some_and(|h| want.iter().all(|(k, v)| h.get(k) == Some(v))) {
        return Ok(false);
    }

    let meta = existing
        .pod_template_mut()
        .metadata
        .get_or_insert_with(Default::default);
    Ok(merge_map(&mut meta.labels, Some(want)))
}

/// Additive merge of pod template annotations
pub fn pod_template_annotations<K: PodTemplateOwner>(
    desired: &K,
    existing: &mut K,
) -> Result<bool> {
    let want = desired
        .pod_template()
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.annotations.as_ref());
    let Some(want) = want.filter(|w| !w.is_empty()) else {
        return Ok(false);
    };
    let have = existing
        .pod_template()
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.annotations.as_ref());
    if have.is_some_and(|h| want.iter().all(|(k, v)| h.get(k) == Some(v))) {
        return Ok(false);
    }

    let meta = existing
        .pod_template_mut()
        .metadata
        .get_or_insert_with(Default::default);
    Ok(merge_map(&mut meta.annotations, Some(want)))
}

// =============================================================================
// Containers
// =============================================================================

/// Resource requirements of the single workload container
///
/// Desired must have exactly one container; anything else is a hard error.
/// If existing does not have exactly one, its containers are replaced.
pub fn container_resources<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let info = object_info(desired);
    let [want] = containers(desired) else {
        return Err(Error::precondition(
            info,
            format!(
                "desired spec.template.spec.containers length is {}, should be 1",
                containers(desired).len()
            ),
        ));
    };

    let mut changed = false;
    if containers(existing).len() != 1 {
        info!(
            object = %info,
            count = containers(existing).len(),
            "spec.template.spec.containers length changed, replacing containers"
        );
        pod_spec_mut(existing).containers = containers(desired).to_vec();
        changed = true;
    }

    if containers(existing)
        .first()
        .is_some_and(|have| !resources_equal(have.resources.as_ref(), want.resources.as_ref()))
    {
        info!(object = %info, "spec.template.spec.containers[0].resources changed");
        if let Some(have) = pod_spec_mut(existing).containers.first_mut() {
            have.resources = want.resources.clone();
        }
        changed = true;
    }
    Ok(changed)
}

fn quantity_maps_equal(
    a: Option<&BTreeMap<String, Quantity>>,
    b: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let (a, b) = (a.unwrap_or(&empty), b.unwrap_or(&empty));
    a.len() == b.len()
        && a.iter()
            .all(|(name, qa)| b.get(name).is_some_and(|qb| quantities_equal(qa, qb)))
}

/// Limits and requests compared by amount, not by spelling
fn resources_equal(a: Option<&ResourceRequirements>, b: Option<&ResourceRequirements>) -> bool {
    let default = ResourceRequirements::default();
    let (a, b) = (a.unwrap_or(&default), b.unwrap_or(&default));
    a.claims == b.claims
        && quantity_maps_equal(a.limits.as_ref(), b.limits.as_ref())
        && quantity_maps_equal(a.requests.as_ref(), b.requests.as_ref())
}

/// Container args, per container
pub fn args<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    Ok(sync_containers(desired, existing, |c| &c.args, |c| &mut c.args))
}

/// Liveness and readiness probes, per container
pub fn probes<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let liveness = sync_containers(
        desired,
        existing,
        |c| &c.liveness_probe,
        |c| &mut c.liveness_probe,
    );
    let readiness = sync_containers(
        desired,
        existing,
        |c| &c.readiness_probe,
        |c| &mut c.readiness_probe,
    );
    Ok(liveness || readiness)
}

/// Container images, per container
pub fn container_images<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    Ok(sync_containers(desired, existing, |c| &c.image, |c| &mut c.image))
}

/// Init container images; missing init containers are appended
pub fn init_container_images<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let want = init_containers(desired);
    let have = init_containers(existing);
    let differs = want.len() > have.len()
        || want.iter().zip(have).any(|(d, e)| d.image != e.image);
    if !differs {
        return Ok(false);
    }

    let target = pod_spec_mut(existing)
        .init_containers
        .get_or_insert_with(Vec::new);
    for (idx, container) in want.iter().enumerate() {
        match target.get_mut(idx) {
            Some(have) => have.image.clone_from(&container.image),
            None => {
                debug!(container = %container.name, "adding missing init container");
                target.push(container.clone());
            }
        }
    }
    Ok(true)
}

/// Init containers as a whole: extras trimmed, missing appended, drift replaced
pub fn pod_init_containers<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let want = init_containers(desired);
    if want == init_containers(existing) {
        return Ok(false);
    }
    let want = want.to_vec();
    let target = &mut pod_spec_mut(existing).init_containers;
    *target = if want.is_empty() { None } else { Some(want) };
    Ok(true)
}

/// The conventional pod template chain
///
/// annotations, resources, affinity, tolerations, template labels, priority,
/// spread constraints, template annotations, args, probes, images.
pub fn pod_template_mutator<K: PodTemplateOwner + 'static>() -> MutatorChain<K> {
    MutatorChain::new()
        .with("annotations", annotations::<K>)
        .with("container_resources", container_resources::<K>)
        .with("affinity", affinity::<K>)
        .with("tolerations", tolerations::<K>)
        .with("pod_template_labels", pod_template_labels::<K>)
        .with("priority_class", priority_class::<K>)
        .with("topology_spread_constraints", topology_spread_constraints::<K>)
        .with("pod_template_annotations", pod_template_annotations::<K>)
        .with("args", args::<K>)
        .with("probes", probes::<K>)
        .with("container_images", container_images::<K>)
        .with("init_container_images", init_container_images::<K>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{
        Affinity, NodeAffinity, Probe, ResourceRequirements, TCPSocketAction, Toleration,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    // =========================================================================
    // Test Fixtures
    // =========================================================================

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Default::default()
        }
    }

    fn deployment(containers: Vec<Container>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("apicast-production".to_string()),
                namespace: Some("apps".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta::default()),
                    spec: Some(PodSpec {
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn limits(cpu: &str) -> Option<ResourceRequirements> {
        Some(ResourceRequirements {
            limits: Some(BTreeMap::from([("cpu".to_string(), Quantity(cpu.to_string()))])),
            ..Default::default()
        })
    }

    fn tcp_probe(port: i32) -> Option<Probe> {
        Some(Probe {
            tcp_socket: Some(TCPSocketAction {
                port: IntOrString::Int(port),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn rich_deployment() -> Deployment {
        let mut c = container("apicast", "quay.io/3scale/apicast:2.15");
        c.args = Some(vec!["--verbose".to_string()]);
        c.resources = limits("1");
        c.liveness_probe = tcp_probe(8090);
        c.readiness_probe = tcp_probe(8090);
        let mut d = deployment(vec![c]);
        let spec = pod_spec_mut(&mut d);
        spec.tolerations = Some(vec![Toleration {
            key: Some("dedicated".to_string()),
            operator: Some("Exists".to_string()),
            ..Default::default()
        }]);
        spec.priority_class_name = Some("high".to_string());
        spec.affinity = Some(Affinity {
            node_affinity: Some(NodeAffinity::default()),
            ..Default::default()
        });
        spec.init_containers = Some(vec![container("init", "busybox:1")]);
        d.metadata.annotations = Some(BTreeMap::from([("a".to_string(), "b".to_string())]));
        d.spec.as_mut().unwrap().template.metadata = Some(ObjectMeta {
            labels: Some(BTreeMap::from([("app".to_string(), "apicast".to_string())])),
            annotations: Some(BTreeMap::from([("p".to_string(), "q".to_string())])),
            ..Default::default()
        });
        d
    }

    // =========================================================================
    // Laws
    // =========================================================================

    #[test]
    fn chain_on_identical_copy_reports_no_change() {
        let desired = rich_deployment();
        let mut existing = desired.clone();
        let chain = pod_template_mutator::<Deployment>();

        assert!(!chain.apply(&desired, &mut existing).unwrap());
        assert_eq!(existing, desired);
    }

    #[test]
    fn chain_converges_then_is_idempotent() {
        let desired = rich_deployment();
        let mut existing = deployment(vec![container("apicast", "quay.io/3scale/apicast:2.14")]);
        let chain = pod_template_mutator::<Deployment>();

        assert!(chain.apply(&desired, &mut existing).unwrap());
        assert!(!chain.apply(&desired, &mut existing).unwrap());
        assert_eq!(pod_spec(&existing), pod_spec(&desired));
    }

    #[test]
    fn chain_keeps_conventional_order() {
        let names = pod_template_mutator::<Deployment>().names();
        assert_eq!(names.first(), Some(&"annotations"));
        assert_eq!(names.last(), Some(&"init_container_images"));
        assert_eq!(names.len(), 12);
    }

    // =========================================================================
    // Individual Mutators
    // =========================================================================

    #[test]
    fn resources_require_single_desired_container() {
        let desired = deployment(vec![container("a", "x"), container("b", "y")]);
        let mut existing = deployment(vec![container("a", "x")]);

        let err = container_resources(&desired, &mut existing).unwrap_err();
        assert!(err.to_string().contains("should be 1"));
    }

    #[test]
    fn resources_replace_containers_when_existing_count_differs() {
        let mut c = container("a", "x");
        c.resources = limits("2");
        let desired = deployment(vec![c]);
        let mut existing = deployment(vec![container("a", "x"), container("sidecar", "y")]);

        assert!(container_resources(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing).len(), 1);
        assert_eq!(containers(&existing)[0].resources, limits("2"));
    }

    #[test]
    fn resources_update_in_place() {
        let mut want = container("a", "x");
        want.resources = limits("2");
        let desired = deployment(vec![want]);
        let mut have = container("a", "x");
        have.resources = limits("1");
        have.args = Some(vec!["keep".to_string()]);
        let mut existing = deployment(vec![have]);

        assert!(container_resources(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing)[0].resources, limits("2"));
        assert_eq!(containers(&existing)[0].args, Some(vec!["keep".to_string()]));
    }

    #[test]
    fn resources_compare_quantities_by_amount() {
        let mut want = container("a", "x");
        want.resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("1000m".to_string())),
                ("memory".to_string(), Quantity("512Mi".to_string())),
            ])),
            ..Default::default()
        });
        let desired = deployment(vec![want]);
        let mut have = container("a", "x");
        have.resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("1".to_string())),
                ("memory".to_string(), Quantity("536870912".to_string())),
            ])),
            ..Default::default()
        });
        let mut existing = deployment(vec![have.clone()]);

        assert!(!container_resources(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing)[0].resources, have.resources);
    }

    #[test]
    fn resources_missing_key_is_a_change() {
        let mut want = container("a", "x");
        want.resources = limits("1");
        let desired = deployment(vec![want]);
        let mut existing = deployment(vec![container("a", "x")]);

        assert!(container_resources(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing)[0].resources, limits("1"));
    }

    #[test]
    fn tolerations_are_replaced_atomically() {
        let desired = rich_deployment();
        let mut existing = rich_deployment();
        pod_spec_mut(&mut existing).tolerations = None;

        assert!(tolerations(&desired, &mut existing).unwrap());
        assert_eq!(
            pod_spec(&existing).unwrap().tolerations,
            pod_spec(&desired).unwrap().tolerations
        );
    }

    #[test]
    fn args_tolerate_container_count_mismatch() {
        let mut want = container("a", "x");
        want.args = Some(vec!["--new".to_string()]);
        let desired = deployment(vec![want, container("b", "y")]);
        let mut existing = deployment(vec![container("a", "x")]);

        assert!(args(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing).len(), 1);
        assert_eq!(containers(&existing)[0].args, Some(vec!["--new".to_string()]));
    }

    #[test]
    fn probes_cover_liveness_and_readiness() {
        let mut want = container("a", "x");
        want.readiness_probe = tcp_probe(8080);
        let desired = deployment(vec![want]);
        let mut existing = deployment(vec![container("a", "x")]);

        assert!(probes(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing)[0].readiness_probe, tcp_probe(8080));
        assert!(containers(&existing)[0].liveness_probe.is_none());
    }

    #[test]
    fn init_container_images_append_missing() {
        let mut desired = deployment(vec![]);
        pod_spec_mut(&mut desired).init_containers =
            Some(vec![container("one", "img:2"), container("two", "img:1")]);
        let mut existing = deployment(vec![]);
        pod_spec_mut(&mut existing).init_containers = Some(vec![container("one", "img:1")]);

        assert!(init_container_images(&desired, &mut existing).unwrap());
        let inits = init_containers(&existing);
        assert_eq!(inits.len(), 2);
        assert_eq!(inits[0].image.as_deref(), Some("img:2"));
        assert_eq!(inits[1].name, "two");
    }

    #[test]
    fn pod_init_containers_trim_extras() {
        let mut desired = deployment(vec![]);
        pod_spec_mut(&mut desired).init_containers = Some(vec![container("one", "img:1")]);
        let mut existing = deployment(vec![]);
        pod_spec_mut(&mut existing).init_containers =
            Some(vec![container("one", "img:1"), container("stale", "img:0")]);

        assert!(pod_init_containers(&desired, &mut existing).unwrap());
        assert_eq!(init_containers(&existing).len(), 1);
        assert!(!pod_init_containers(&desired, &mut existing).unwrap());
    }

    #[test]
    fn pod_template_labels_are_additive() {
        let desired = rich_deployment();
        let mut existing = deployment(vec![]);
        existing.spec.as_mut().unwrap().template.metadata = Some(ObjectMeta {
            labels: Some(BTreeMap::from([("user".to_string(), "kept".to_string())])),
            ..Default::default()
        });

        assert!(pod_template_labels(&desired, &mut existing).unwrap());
        let labels = existing
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap();
        assert_eq!(labels.get("user").map(String::as_str), Some("kept"));
        assert_eq!(labels.get("app").map(String::as_str), Some("apicast"));
    }

    #[test]
    fn mutators_work_on_statefulsets() {
        let mut desired = StatefulSet::default();
        pod_spec_mut(&mut desired).priority_class_name = Some("critical".to_string());
        let mut existing = StatefulSet::default();

        assert!(priority_class(&desired, &mut existing).unwrap());
        assert_eq!(
            pod_spec(&existing).unwrap().priority_class_name.as_deref(),
            Some("critical")
        );
    }

    #[test]
    fn unchanged_field_does_not_materialize_spec() {
        let desired = StatefulSet::default();
        let mut existing = StatefulSet::default();
        assert!(!affinity(&desired, &mut existing).unwrap());
        assert!(existing.spec.is_none());
    }
}
