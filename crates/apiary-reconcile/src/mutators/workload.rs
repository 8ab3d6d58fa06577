//! Workload-level mutators (outside the pod template)

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::Resource;
use tracing::info;

use apiary_common::kube_utils::object_info;

use crate::mutator::sync_value;
use crate::Result;

/// Object kinds with a replica count
pub trait ReplicaOwner: Resource<DynamicType = ()> {
    /// Requested replicas, if set
    fn replicas(&self) -> Option<i32>;

    /// Set the requested replicas
    fn set_replicas(&mut self, replicas: Option<i32>);
}

impl ReplicaOwner for Deployment {
    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn set_replicas(&mut self, replicas: Option<i32>) {
        self.spec.get_or_insert_with(Default::default).replicas = replicas;
    }
}

impl ReplicaOwner for StatefulSet {
    fn replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn set_replicas(&mut self, replicas: Option<i32>) {
        self.spec.get_or_insert_with(Default::default).replicas = replicas;
    }
}

/// Replica count
pub fn replicas<K: ReplicaOwner>(desired: &K, existing: &mut K) -> Result<bool> {
    let want = desired.replicas();
    if want == existing.replicas() {
        return Ok(false);
    }
    info!(
        object = %object_info(desired),
        from = ?existing.replicas(),
        to = ?want,
        "spec.replicas changed"
    );
    existing.set_replicas(want);
    Ok(true)
}

/// Deployment rollout strategy, replaced as a whole
pub fn strategy(desired: &Deployment, existing: &mut Deployment) -> Result<bool> {
    let want = desired.spec.as_ref().and_then(|s| s.strategy.as_ref());
    let have = existing.spec.as_ref().and_then(|s| s.strategy.as_ref());
    if want == have {
        return Ok(false);
    }
    let want = want.cloned();
    let spec = existing.spec.get_or_insert_with(Default::default);
    Ok(sync_value(&want, &mut spec.strategy))
}
