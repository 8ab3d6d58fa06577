//! ConfigMap and GrafanaDashboard content

use k8s_openapi::api::core::v1::ConfigMap;
use tracing::info;

use apiary_common::crd::GrafanaDashboard;
use apiary_common::kube_utils::object_info;

use crate::mutator::sync_value;
use crate::Result;

/// ConfigMap `data`, replaced as a whole
pub fn config_map_data(desired: &ConfigMap, existing: &mut ConfigMap) -> Result<bool> {
    let changed = sync_value(&desired.data, &mut existing.data);
    if changed {
        info!(object = %object_info(desired), "config map data changed");
    }
    Ok(changed)
}

/// Dashboard JSON and name; other spec fields are left alone
pub fn dashboard_spec(desired: &GrafanaDashboard, existing: &mut GrafanaDashboard) -> Result<bool> {
    let json = sync_value(&desired.spec.json, &mut existing.spec.json);
    let name = sync_value(&desired.spec.name, &mut existing.spec.name);
    if json || name {
        info!(object = %object_info(desired), "dashboard spec changed");
    }
    Ok(json || name)
}
