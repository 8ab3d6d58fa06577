//! PersistentVolumeClaim mutators

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::{info, warn};

use apiary_common::kube_utils::object_info;

use crate::Result;

const STORAGE: &str = "storage";

/// Parse a resource quantity into its base unit (bytes, cores)
///
/// Supports plain numbers plus the milli (`m`), decimal (`k`, `M`, `G`, `T`,
/// `P`, `E`) and binary (`Ki` .. `Ei`) suffixes. Fractions are allowed
/// ("1.5Gi").
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);
    let value: f64 = number.parse().ok()?;
    let multiplier = match suffix {
        "m" => return Some(value / 1000.0),
        "" => 1.0,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024f64,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => return None,
    };
    Some(value * multiplier)
}

/// Whether two quantities denote the same amount
///
/// "1" equals "1000m" and "512Mi" equals "536870912". Unparseable
/// quantities fall back to text equality.
pub fn quantities_equal(a: &Quantity, b: &Quantity) -> bool {
    match (parse_quantity(&a.0), parse_quantity(&b.0)) {
        (Some(x), Some(y)) => (x - y).abs() <= f64::EPSILON * x.abs().max(y.abs()),
        _ => a.0 == b.0,
    }
}

fn storage_request(pvc: &PersistentVolumeClaim) -> Option<&Quantity> {
    pvc.spec
        .as_ref()
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get(STORAGE))
}

/// Storage requests only grow; a smaller desired size is ignored
pub fn pvc_resources(desired: &PersistentVolumeClaim, existing: &mut PersistentVolumeClaim) -> Result<bool> {
    let Some(want) = storage_request(desired) else {
        return Ok(false);
    };
    let grow = match storage_request(existing) {
        None => true,
        Some(have) => match (parse_quantity(&want.0), parse_quantity(&have.0)) {
            (Some(w), Some(h)) => w > h,
            _ => {
                warn!(
                    object = %object_info(desired),
                    desired = %want.0,
                    existing = %have.0,
                    "unparseable storage request, not reconciling"
                );
                false
            }
        },
    };
    if !grow {
        return Ok(false);
    }

    info!(object = %object_info(desired), size = %want.0, "growing storage request");
    existing
        .spec
        .get_or_insert_with(Default::default)
        .resources
        .get_or_insert_with(Default::default)
        .requests
        .get_or_insert_with(Default::default)
        .insert(STORAGE.to_string(), want.clone());
    Ok(true)
}
