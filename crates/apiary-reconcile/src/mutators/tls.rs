//! TLS secret volume toggles
//!
//! A TLS volume projects keys of a secret into every container at a fixed
//! path. Enabling is idempotent: if the volume or any mount of it is already
//! present the object is left as is. Disabling strips the volume and all of
//! its mounts.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, KeyToPath, SecretVolumeSource, Volume, VolumeMount};
use tracing::info;

use apiary_common::kube_utils::object_info;

use super::pod::{containers, init_containers, pod_spec, pod_spec_mut, PodTemplateOwner};
use crate::mutator::Mutator;

/// A secret-backed volume mounted read-only into every container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsVolumeSpec {
    /// Volume and mount name
    pub volume_name: String,
    /// Path inside each container
    pub mount_path: String,
    /// Source secret
    pub secret_name: String,
    /// Secret key to file path
    pub items: BTreeMap<String, String>,
}

impl TlsVolumeSpec {
    fn volume(&self) -> Volume {
        let items = (!self.items.is_empty()).then(|| {
            self.items
                .iter()
                .map(|(key, path)| KeyToPath {
                    key: key.clone(),
                    path: path.clone(),
                    mode: None,
                })
                .collect()
        });
        Volume {
            name: self.volume_name.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(self.secret_name.clone()),
                items,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn mount(&self) -> VolumeMount {
        VolumeMount {
            name: self.volume_name.clone(),
            mount_path: self.mount_path.clone(),
            read_only: Some(true),
            ..Default::default()
        }
    }
}

fn mounts_volume(container: &Container, name: &str) -> bool {
    container
        .volume_mounts
        .as_deref()
        .is_some_and(|mounts| mounts.iter().any(|m| m.name == name))
}

fn has_volume<K: PodTemplateOwner>(obj: &K, name: &str) -> bool {
    pod_spec(obj)
        .and_then(|s| s.volumes.as_deref())
        .is_some_and(|volumes| volumes.iter().any(|v| v.name == name))
}

/// Add the TLS volume and a mount in every container
///
/// No-op when the volume or any container or init container mount of it
/// already exists.
pub fn add_tls_volume<K: PodTemplateOwner>(existing: &mut K, tls: &TlsVolumeSpec) -> bool {
    let mounted = containers(existing)
        .iter()
        .chain(init_containers(existing))
        .any(|c| mounts_volume(c, &tls.volume_name));
    if mounted || has_volume(existing, &tls.volume_name) {
        return false;
    }

    info!(object = %object_info(existing), volume = %tls.volume_name, "adding TLS volume");
    let spec = pod_spec_mut(existing);
    spec.volumes.get_or_insert_with(Vec::new).push(tls.volume());
    for container in &mut spec.containers {
        container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .push(tls.mount());
    }
    true
}

/// Remove the named volume and every mount of it
pub fn remove_tls_volume<K: PodTemplateOwner>(existing: &mut K, volume_name: &str) -> bool {
    let mounted = containers(existing)
        .iter()
        .chain(init_containers(existing))
        .any(|c| mounts_volume(c, volume_name));
    if !mounted && !has_volume(existing, volume_name) {
        return false;
    }

    info!(object = %object_info(existing), volume = %volume_name, "removing TLS volume");
    let spec = pod_spec_mut(existing);
    if let Some(volumes) = spec.volumes.as_mut() {
        volumes.retain(|v| v.name != volume_name);
    }
    let inits = spec.init_containers.iter_mut().flatten();
    for container in spec.containers.iter_mut().chain(inits) {
        if let Some(mounts) = container.volume_mounts.as_mut() {
            mounts.retain(|m| m.name != volume_name);
        }
    }
    true
}

/// Mutator enabling or disabling a TLS volume
///
/// `desired` is not consulted; the toggle alone decides the target state.
pub fn tls_volume_toggle<K: PodTemplateOwner + 'static>(
    tls: TlsVolumeSpec,
    enabled: bool,
) -> Mutator<K> {
    Box::new(move |_desired: &K, existing: &mut K| {
        Ok(if enabled {
            add_tls_volume(existing, &tls)
        } else {
            remove_tls_volume(existing, &tls.volume_name)
        })
    })
}
