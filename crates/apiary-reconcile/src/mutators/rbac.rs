//! Role and RoleBinding mutators

use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use tracing::info;

use apiary_common::kube_utils::object_info;

use crate::mutator::sync_value;
use crate::Result;

/// Role rules, replaced as a whole
pub fn role_rules(desired: &Role, existing: &mut Role) -> Result<bool> {
    let changed = sync_value(&desired.rules, &mut existing.rules);
    if changed {
        info!(object = %object_info(desired), "role rules changed");
    }
    Ok(changed)
}

/// Binding subjects and role reference
pub fn role_binding_subjects_and_ref(desired: &RoleBinding, existing: &mut RoleBinding) -> Result<bool> {
    let subjects = sync_value(&desired.subjects, &mut existing.subjects);
    let role_ref = sync_value(&desired.role_ref, &mut existing.role_ref);
    if subjects || role_ref {
        info!(object = %object_info(desired), subjects, role_ref, "role binding changed");
    }
    Ok(subjects || role_ref)
}
