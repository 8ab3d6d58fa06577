//! ServiceAccount image pull secrets

use k8s_openapi::api::core::v1::{LocalObjectReference, ServiceAccount};
use kube::ResourceExt;
use tracing::info;

use apiary_common::kube_utils::object_info;

use crate::Result;

/// Whether a pull secret was generated by the cluster for this account
fn is_generated(account: &str, secret: &LocalObjectReference) -> bool {
    secret.name.starts_with(&format!("{account}-dockercfg-"))
        || secret.name.starts_with(&format!("{account}-token-"))
}

fn sorted(mut secrets: Vec<LocalObjectReference>) -> Vec<LocalObjectReference> {
    secrets.sort_by(|a, b| a.name.cmp(&b.name));
    secrets
}

/// Reconcile `imagePullSecrets` as a set
///
/// Pull secrets the cluster generates for the account (`<sa>-dockercfg-*`,
/// `<sa>-token-*`) are kept even though desired never lists them. The
/// written list is sorted by name, so ordering alone never causes a write.
pub fn image_pull_secrets(desired: &ServiceAccount, existing: &mut ServiceAccount) -> Result<bool> {
    let account = existing.name_any();
    let have = sorted(existing.image_pull_secrets.clone().unwrap_or_default());

    let mut want = desired.image_pull_secrets.clone().unwrap_or_default();
    for secret in have.iter().filter(|s| is_generated(&account, s)) {
        if !want.iter().any(|w| w.name == secret.name) {
            want.push(secret.clone());
        }
    }
    let want = sorted(want);

    if want == have {
        return Ok(false);
    }
    info!(object = %object_info(desired), "imagePullSecrets changed");
    existing.image_pull_secrets = (!want.is_empty()).then_some(want);
    Ok(true)
}
