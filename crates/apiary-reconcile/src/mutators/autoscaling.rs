//! HorizontalPodAutoscaler and PodDisruptionBudget mutators
//!
//! A disabled PDB or HPA is expressed by deletion-tagging the desired object
//! (see `apiary_common::kube_utils::tag_object_to_delete`), not by a mutator.

use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use tracing::info;

use apiary_common::kube_utils::object_info;

use crate::Result;

/// HPA min/max replicas, metrics and behavior
pub fn hpa_spec(desired: &HorizontalPodAutoscaler, existing: &mut HorizontalPodAutoscaler) -> Result<bool> {
    let Some(want) = desired.spec.as_ref() else {
        return Ok(false);
    };
    let have = existing.spec.get_or_insert_with(Default::default);

    let mut changed = false;
    if have.min_replicas != want.min_replicas {
        have.min_replicas = want.min_replicas;
        changed = true;
    }
    if have.max_replicas != want.max_replicas {
        have.max_replicas = want.max_replicas;
        changed = true;
    }
    if have.metrics != want.metrics {
        have.metrics = want.metrics.clone();
        changed = true;
    }
    if have.behavior != want.behavior {
        have.behavior = want.behavior.clone();
        changed = true;
    }
    if changed {
        info!(object = %object_info(desired), "hpa spec changed");
    }
    Ok(changed)
}

/// PDB spec, replaced as a whole
pub fn pdb_spec(desired: &PodDisruptionBudget, existing: &mut PodDisruptionBudget) -> Result<bool> {
    if desired.spec == existing.spec {
        return Ok(false);
    }
    info!(object = %object_info(desired), "pdb spec changed");
    existing.spec = desired.spec.clone();
    Ok(true)
}
