//! Service mutators

use k8s_openapi::api::core::v1::Service;

use crate::mutator::sync_value;
use crate::Result;

/// Service ports, replaced as a whole
pub fn service_ports(desired: &Service, existing: &mut Service) -> Result<bool> {
    let want = desired.spec.as_ref().and_then(|s| s.ports.clone());
    if existing.spec.as_ref().and_then(|s| s.ports.as_ref()) == want.as_ref() {
        return Ok(false);
    }
    let spec = existing.spec.get_or_insert_with(Default::default);
    Ok(sync_value(&want, &mut spec.ports))
}

/// Service selector, replaced as a whole
pub fn service_selector(desired: &Service, existing: &mut Service) -> Result<bool> {
    let want = desired.spec.as_ref().and_then(|s| s.selector.clone());
    if existing.spec.as_ref().and_then(|s| s.selector.as_ref()) == want.as_ref() {
        return Ok(false);
    }
    let spec = existing.spec.get_or_insert_with(Default::default);
    Ok(sync_value(&want, &mut spec.selector))
}
