//! Volume and volume mount mutators
//!
//! Three flavours: `*_union` only adds by name, `strict_*` replaces on any
//! difference, and `weak_*` reconciles a caller-chosen set of names while
//! leaving every other entry alone.

use k8s_openapi::api::core::v1::{Container, Volume, VolumeMount};
use tracing::{info, warn};

use apiary_common::kube_utils::object_info;

use super::pod::{containers, init_containers, pod_spec, pod_spec_mut, PodTemplateOwner};
use crate::mutator::{sync_named, Mutator};
use crate::Result;

fn volumes<K: PodTemplateOwner>(obj: &K) -> &[Volume] {
    pod_spec(obj)
        .and_then(|s| s.volumes.as_deref())
        .unwrap_or_default()
}

fn mounts(container: &Container) -> &[VolumeMount] {
    container.volume_mounts.as_deref().unwrap_or_default()
}

fn volume_name(v: &Volume) -> &str {
    &v.name
}

fn mount_name(m: &VolumeMount) -> &str {
    &m.name
}

fn sorted_by_name<T: Clone>(items: &[T], key: impl Fn(&T) -> &str) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| key(a).cmp(key(b)));
    sorted
}

/// Append mounts missing by name in each paired container
fn union_mounts(desired: &[Container], existing: &mut [Container]) -> bool {
    let mut changed = false;
    for (want, have) in desired.iter().zip(existing.iter_mut()) {
        for mount in mounts(want) {
            if !mounts(have).iter().any(|m| m.name == mount.name) {
                have.volume_mounts
                    .get_or_insert_with(Vec::new)
                    .push(mount.clone());
                changed = true;
            }
        }
    }
    changed
}

fn missing_mounts(desired: &[Container], existing: &[Container]) -> bool {
    desired.iter().zip(existing).any(|(want, have)| {
        mounts(want)
            .iter()
            .any(|m| !mounts(have).iter().any(|h| h.name == m.name))
    })
}

// =============================================================================
// Union
// =============================================================================

/// Add desired volumes missing by name; existing volumes are untouched
pub fn volumes_union<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let missing: Vec<Volume> = volumes(desired)
        .iter()
        .filter(|v| !volumes(existing).iter().any(|e| e.name == v.name))
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(false);
    }

    info!(
        object = %object_info(desired),
        count = missing.len(),
        "adding missing volumes"
    );
    pod_spec_mut(existing)
        .volumes
        .get_or_insert_with(Vec::new)
        .extend(missing);
    Ok(true)
}

/// Add desired mounts missing by name, in containers and init containers
pub fn volume_mounts_union<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let containers_missing = missing_mounts(containers(desired), containers(existing));
    let inits_missing = missing_mounts(init_containers(desired), init_containers(existing));
    if !containers_missing && !inits_missing {
        return Ok(false);
    }

    let desired_spec = pod_spec(desired);
    let spec = pod_spec_mut(existing);
    let mut changed = false;
    if let Some(want) = desired_spec {
        changed |= union_mounts(&want.containers, &mut spec.containers);
        if let (Some(want), Some(have)) = (
            want.init_containers.as_deref(),
            spec.init_containers.as_mut(),
        ) {
            changed |= union_mounts(want, have);
        }
    }
    Ok(changed)
}

// =============================================================================
// Strict
// =============================================================================

/// Replace the volume list when it differs (order-insensitive)
pub fn strict_volumes<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let want = volumes(desired);
    let have = volumes(existing);
    if want.len() == have.len()
        && sorted_by_name(want, volume_name) == sorted_by_name(have, volume_name)
    {
        return Ok(false);
    }

    info!(object = %object_info(desired), "spec.template.spec.volumes changed");
    let want = pod_spec(desired).and_then(|s| s.volumes.clone());
    pod_spec_mut(existing).volumes = want;
    Ok(true)
}

fn strict_container_mounts(
    object: &str,
    desired: &[Container],
    existing: &mut [Container],
) -> bool {
    if desired.len() != existing.len() {
        warn!(
            object,
            reason = "existing and desired do not have same number of containers",
            "not reconciling volume mounts"
        );
        return false;
    }

    let mut changed = false;
    for (want, have) in desired.iter().zip(existing.iter_mut()) {
        if sorted_by_name(mounts(want), mount_name) != sorted_by_name(mounts(have), mount_name) {
            have.volume_mounts = want.volume_mounts.clone();
            changed = true;
        }
    }
    changed
}

/// Replace mounts of each container and init container that differ
///
/// Skipped (with a warning) when container counts differ.
pub fn strict_volume_mounts<K: PodTemplateOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let object = object_info(desired);
    let mut scratch_containers = containers(existing).to_vec();
    let mut scratch_inits = init_containers(existing).to_vec();

    let inits_changed = strict_container_mounts(&object, init_containers(desired), &mut scratch_inits);
    let containers_changed =
        strict_container_mounts(&object, containers(desired), &mut scratch_containers);
    if !inits_changed && !containers_changed {
        return Ok(false);
    }

    let spec = pod_spec_mut(existing);
    if inits_changed {
        spec.init_containers = Some(scratch_inits);
    }
    if containers_changed {
        spec.containers = scratch_containers;
    }
    Ok(true)
}

// =============================================================================
// Weak
// =============================================================================

/// Reconcile only the named volumes: add, update or remove each by name
pub fn weak_volumes<K, I, S>(names: I) -> Mutator<K>
where
    K: PodTemplateOwner + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Box::new(move |desired: &K, existing: &mut K| {
        let want = volumes(desired);
        let mut scratch = pod_spec(existing).and_then(|s| s.volumes.clone());
        let mut changed = false;
        for name in &names {
            changed |= sync_named(want, &mut scratch, name, volume_name);
        }
        if changed {
            pod_spec_mut(existing).volumes = scratch;
        }
        Ok(changed)
    })
}

fn weak_container_mounts(
    object: &str,
    desired: &[Container],
    existing: &mut [Container],
    names: &[String],
) -> bool {
    if desired.len() != existing.len() {
        warn!(
            object,
            reason = "existing and desired do not have same number of containers",
            "not reconciling volume mounts"
        );
        return false;
    }

    let mut changed = false;
    for (want, have) in desired.iter().zip(existing.iter_mut()) {
        for name in names {
            changed |= sync_named(mounts(want), &mut have.volume_mounts, name, mount_name);
        }
    }
    changed
}

/// Reconcile only the named mounts in every container and init container
pub fn weak_volume_mounts<K, I, S>(names: I) -> Mutator<K>
where
    K: PodTemplateOwner + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Box::new(move |desired: &K, existing: &mut K| {
        let object = object_info(desired);
        let mut scratch_containers = containers(existing).to_vec();
        let mut scratch_inits = init_containers(existing).to_vec();

        let inits_changed =
            weak_container_mounts(&object, init_containers(desired), &mut scratch_inits, &names);
        let containers_changed = weak_container_mounts(
            &object,
            containers(desired),
            &mut scratch_containers,
            &names,
        );
        if !inits_changed && !containers_changed {
            return Ok(false);
        }

        let spec = pod_spec_mut(existing);
        if inits_changed {
            spec.init_containers = Some(scratch_inits);
        }
        if containers_changed {
            spec.containers = scratch_containers;
        }
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{
        ConfigMapVolumeSource, PodSpec, PodTemplateSpec, SecretVolumeSource,
    };

    fn secret_volume(name: &str, secret: &str) -> Volume {
        Volume {
            name: name.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn config_volume(name: &str) -> Volume {
        Volume {
            name: name.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn mount(name: &str, path: &str) -> VolumeMount {
        VolumeMount {
            name: name.to_string(),
            mount_path: path.to_string(),
            ..Default::default()
        }
    }

    fn container(mounts: Vec<VolumeMount>) -> Container {
        Container {
            name: "system".to_string(),
            volume_mounts: Some(mounts),
            ..Default::default()
        }
    }

    fn deployment(volumes: Vec<Volume>, containers: Vec<Container>) -> Deployment {
        Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        volumes: Some(volumes),
                        containers,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn union_adds_missing_and_keeps_existing() {
        let desired = deployment(
            vec![config_volume("a"), secret_volume("b", "new")],
            vec![container(vec![mount("a", "/a")])],
        );
        let mut existing = deployment(
            vec![secret_volume("b", "old"), config_volume("user")],
            vec![container(vec![mount("user", "/u")])],
        );

        assert!(volumes_union(&desired, &mut existing).unwrap());
        let names: Vec<_> = volumes(&existing).iter().map(|v| v.name.clone()).collect();
        assert_eq!(names, vec!["b", "user", "a"]);
        assert_eq!(volumes(&existing)[0], secret_volume("b", "old"));

        assert!(volume_mounts_union(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing)[0].volume_mounts.as_ref().unwrap().len(), 2);

        assert!(!volumes_union(&desired, &mut existing).unwrap());
        assert!(!volume_mounts_union(&desired, &mut existing).unwrap());
    }

    #[test]
    fn strict_volumes_ignore_order() {
        let desired = deployment(vec![config_volume("a"), config_volume("b")], vec![]);
        let mut existing = deployment(vec![config_volume("b"), config_volume("a")], vec![]);
        assert!(!strict_volumes(&desired, &mut existing).unwrap());
    }

    #[test]
    fn strict_volumes_drop_manual_additions() {
        let desired = deployment(vec![config_volume("a")], vec![]);
        let mut existing = deployment(vec![config_volume("a"), config_volume("manual")], vec![]);
        assert!(strict_volumes(&desired, &mut existing).unwrap());
        assert_eq!(volumes(&existing), volumes(&desired));
    }

    #[test]
    fn strict_mounts_replace_and_skip_on_mismatch() {
        let desired = deployment(vec![], vec![container(vec![mount("a", "/a")])]);
        let mut existing = deployment(vec![], vec![container(vec![mount("a", "/old")])]);
        assert!(strict_volume_mounts(&desired, &mut existing).unwrap());
        assert_eq!(containers(&existing)[0].volume_mounts, Some(vec![mount("a", "/a")]));

        let mut two = deployment(vec![], vec![container(vec![]), container(vec![])]);
        let before = two.clone();
        assert!(!strict_volume_mounts(&desired, &mut two).unwrap());
        assert_eq!(two, before);
    }

    #[test]
    fn weak_volumes_touch_only_named_entries() {
        let desired = deployment(vec![secret_volume("tls", "cert")], vec![]);
        let mut existing = deployment(
            vec![config_volume("user"), secret_volume("stale", "x")],
            vec![],
        );
        let mutate = weak_volumes::<Deployment, _, _>(["tls", "stale"]);

        assert!(mutate(&desired, &mut existing).unwrap());
        let names: Vec<_> = volumes(&existing).iter().map(|v| v.name.clone()).collect();
        assert_eq!(names, vec!["user", "tls"]);
        assert!(!mutate(&desired, &mut existing).unwrap());
    }

    #[test]
    fn weak_mounts_update_by_name() {
        let desired = deployment(vec![], vec![container(vec![mount("tls", "/tls")])]);
        let mut existing = deployment(
            vec![],
            vec![container(vec![mount("tls", "/old"), mount("user", "/u")])],
        );
        let mutate = weak_volume_mounts::<Deployment, _, _>(["tls"]);

        assert!(mutate(&desired, &mut existing).unwrap());
        assert_eq!(
            containers(&existing)[0].volume_mounts,
            Some(vec![mount("tls", "/tls"), mount("user", "/u")])
        );
    }

    #[test]
    fn all_flavours_are_noop_on_copy() {
        let desired = deployment(
            vec![config_volume("a"), secret_volume("b", "s")],
            vec![container(vec![mount("a", "/a"), mount("b", "/b")])],
        );
        let mut existing = desired.clone();
        assert!(!volumes_union(&desired, &mut existing).unwrap());
        assert!(!volume_mounts_union(&desired, &mut existing).unwrap());
        assert!(!strict_volumes(&desired, &mut existing).unwrap());
        assert!(!strict_volume_mounts(&desired, &mut existing).unwrap());
        assert!(!weak_volumes::<Deployment, _, _>(["a", "b"])(&desired, &mut existing).unwrap());
        assert!(!weak_volume_mounts::<Deployment, _, _>(["a"])(&desired, &mut existing).unwrap());
        assert_eq!(existing, desired);
    }
}
