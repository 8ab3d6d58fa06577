//! Environment variable helpers and mutators

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, EnvVar, EnvVarSource, SecretKeySelector,
};
use tracing::warn;

use apiary_common::kube_utils::object_info;

use super::pod::{containers, init_containers, pod_spec, pod_spec_mut, PodTemplateOwner};
use crate::mutator::{sync_named, Mutator};
use crate::Result;

// =============================================================================
// Constructors
// =============================================================================

/// Plain `name=value` variable
pub fn env_var_from_value(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

/// Variable read from a secret key
pub fn env_var_from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    secret_ref(name, secret, key, None)
}

/// Variable read from a secret key that may be absent
pub fn env_var_from_secret_optional(name: &str, secret: &str, key: &str) -> EnvVar {
    secret_ref(name, secret, key, Some(true))
}

/// Variable read from a config map key
pub fn env_var_from_config_map(name: &str, config_map: &str, key: &str) -> EnvVar {
    config_map_ref(name, config_map, key, None)
}

/// Variable read from a config map key that may be absent
pub fn env_var_from_config_map_optional(name: &str, config_map: &str, key: &str) -> EnvVar {
    config_map_ref(name, config_map, key, Some(true))
}

fn secret_ref(name: &str, secret: &str, key: &str, optional: Option<bool>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional,
            }),
            ..Default::default()
        }),
    }
}

fn config_map_ref(name: &str, config_map: &str, key: &str, optional: Option<bool>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: config_map.to_string(),
                key: key.to_string(),
                optional,
            }),
            ..Default::default()
        }),
    }
}

// =============================================================================
// List operations
// =============================================================================

/// Index of the first variable called `name`
pub fn find_env_var(vars: &[EnvVar], name: &str) -> Option<usize> {
    vars.iter().position(|v| v.name == name)
}

/// Add `desired` or replace the first variable with its name
pub fn ensure_env_var(desired: &EnvVar, existing: &mut Vec<EnvVar>) -> bool {
    match find_env_var(existing, &desired.name) {
        Some(idx) if existing[idx] == *desired => false,
        Some(idx) => {
            existing[idx] = desired.clone();
            true
        }
        None => {
            existing.push(desired.clone());
            true
        }
    }
}

/// Drop later duplicates by name, keeping first occurrences in order
pub fn dedup_env_vars(vars: &mut Vec<EnvVar>) -> bool {
    let before = vars.len();
    let mut seen = BTreeSet::new();
    vars.retain(|v| seen.insert(v.name.clone()));
    vars.len() != before
}

fn reconcile_containers_env(desired: &[Container], existing: &mut [Container], name: &str) -> bool {
    let mut changed = false;
    for (want, have) in desired.iter().zip(existing.iter_mut()) {
        changed |= sync_named(
            want.env.as_deref().unwrap_or_default(),
            &mut have.env,
            name,
            |v| v.name.as_str(),
        );
    }
    changed
}

// =============================================================================
// Mutators
// =============================================================================

/// Reconcile the variable `name` across every container and init container
///
/// Both objects must have the same number of containers and init
/// containers; otherwise nothing is touched and a warning is logged.
pub fn env_var_reconciler<K: PodTemplateOwner>(desired: &K, existing: &mut K, name: &str) -> bool {
    if containers(desired).len() != containers(existing).len() {
        warn!(
            object = %object_info(desired),
            reason = "existing and desired do not have same number of containers",
            "not reconciling env var {name}"
        );
        return false;
    }
    if init_containers(desired).len() != init_containers(existing).len() {
        warn!(
            object = %object_info(desired),
            reason = "existing and desired do not have same number of init containers",
            "not reconciling env var {name}"
        );
        return false;
    }
    if pod_spec(existing).is_none() {
        return false;
    }

    let desired_spec = pod_spec(desired);
    let desired_containers = desired_spec.map(|s| s.containers.as_slice()).unwrap_or_default();
    let desired_inits = desired_spec
        .and_then(|s| s.init_containers.as_deref())
        .unwrap_or_default();

    let spec = pod_spec_mut(existing);
    let mut changed = false;
    if let Some(inits) = spec.init_containers.as_mut() {
        changed |= reconcile_containers_env(desired_inits, inits, name);
    }
    changed |= reconcile_containers_env(desired_containers, &mut spec.containers, name);
    changed
}

/// Mutator reconciling a fixed list of variable names
pub fn env_vars_mutator<K, I, S>(names: I) -> Mutator<K>
where
    K: PodTemplateOwner + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Box::new(move |desired: &K, existing: &mut K| {
        let mut changed = false;
        for name in &names {
            changed |= env_var_reconciler(desired, existing, name);
        }
        Ok(changed)
    })
}

/// Remove duplicated variables (by name) from every existing container
pub fn remove_duplicate_env_vars<K: PodTemplateOwner>(_desired: &K, existing: &mut K) -> Result<bool> {
    let has_duplicates = |c: &Container| {
        let vars = c.env.as_deref().unwrap_or_default();
        let mut seen = BTreeSet::new();
        !vars.iter().all(|v| seen.insert(v.name.as_str()))
    };
    if !containers(existing).iter().any(has_duplicates) {
        return Ok(false);
    }

    let mut changed = false;
    for container in &mut pod_spec_mut(existing).containers {
        if let Some(vars) = container.env.as_mut() {
            changed |= dedup_env_vars(vars);
        }
    }
    Ok(changed)
}
