//! Secret data mutators
//!
//! Desired secrets are built with `stringData`; the API server folds it into
//! `data` on write. Comparisons therefore read the existing value from
//! `stringData` first and fall back to decoded `data`.

use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

use crate::mutator::Mutator;
use crate::Result;

/// Effective string value of `key` on an existing secret
fn current_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(value) = secret.string_data.as_ref().and_then(|d| d.get(key)) {
        return Some(value.clone());
    }
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
}

fn set_string(existing: &mut Secret, key: &str, value: &str) {
    existing
        .string_data
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
}

/// Reconcile one key: written when missing or different
pub fn reconcile_secret_field(desired: &Secret, existing: &mut Secret, key: &str) -> bool {
    let Some(want) = desired.string_data.as_ref().and_then(|d| d.get(key)) else {
        return false;
    };
    if current_value(existing, key).as_ref() == Some(want) {
        return false;
    }
    debug!(key, "secret field changed");
    set_string(existing, key, want);
    true
}

/// Every desired key whose value is missing or different
pub fn secret_string_data(desired: &Secret, existing: &mut Secret) -> Result<bool> {
    let mut changed = false;
    for key in desired.string_data.iter().flat_map(|d| d.keys()) {
        changed |= reconcile_secret_field(desired, existing, key);
    }
    Ok(changed)
}

/// Only desired keys that are missing; present values are never overwritten
pub fn secret_defaults_only(desired: &Secret, existing: &mut Secret) -> Result<bool> {
    let mut changed = false;
    for (key, value) in desired.string_data.iter().flatten() {
        if current_value(existing, key).is_none() {
            set_string(existing, key, value);
            changed = true;
        }
    }
    Ok(changed)
}

/// Mutator for a single secret key
pub fn secret_reconcile_field(key: impl Into<String>) -> Mutator<Secret> {
    let key = key.into();
    Box::new(move |desired: &Secret, existing: &mut Secret| {
        Ok(reconcile_secret_field(desired, existing, &key))
    })
}
