//! Object metadata mutators
//!
//! Labels and annotations are merged additively: keys from desired are added
//! or overwritten, keys only present on the existing object are kept. Other
//! controllers and users annotate the same objects, and removing their keys
//! would fight them.

use std::collections::BTreeMap;

use kube::Resource;

use crate::Result;

/// Merge `desired` into `existing`, adding and overwriting keys only
///
/// Returns whether `existing` changed. An empty or missing desired map never
/// changes anything.
pub fn merge_map(
    existing: &mut Option<BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> bool {
    let Some(desired) = desired.filter(|d| !d.is_empty()) else {
        return false;
    };

    let needs_update = match existing.as_ref() {
        Some(current) => desired.iter().any(|(k, v)| current.get(k) != Some(v)),
        None => true,
    };
    if !needs_update {
        return false;
    }

    let target = existing.get_or_insert_with(BTreeMap::new);
    for (k, v) in desired {
        target.insert(k.clone(), v.clone());
    }
    true
}

/// Additive merge of `metadata.labels`
pub fn labels<K: Resource>(desired: &K, existing: &mut K) -> Result<bool> {
    let desired = desired.meta().labels.as_ref();
    Ok(merge_map(&mut existing.meta_mut().labels, desired))
}

/// Additive merge of `metadata.annotations`
pub fn annotations<K: Resource>(desired: &K, existing: &mut K) -> Result<bool> {
    let desired = desired.meta().annotations.as_ref();
    Ok(merge_map(&mut existing.meta_mut().annotations, desired))
}

/// Labels and annotations together
pub fn object_meta_merger<K: Resource>(desired: &K, existing: &mut K) -> Result<bool> {
    let labels_changed = labels(desired, existing)?;
    let annotations_changed = annotations(desired, existing)?;
    Ok(labels_changed || annotations_changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn with_labels(pairs: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                labels: Some(map(pairs)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn adds_and_overwrites_but_never_removes() {
        let desired = map(&[("app", "apicast"), ("tier", "gateway")]);
        let mut existing = Some(map(&[("app", "old"), ("owner", "ops")]));

        assert!(merge_map(&mut existing, Some(&desired)));
        let result = existing.unwrap();
        assert_eq!(result.get("app").map(String::as_str), Some("apicast"));
        assert_eq!(result.get("tier").map(String::as_str), Some("gateway"));
        assert_eq!(result.get("owner").map(String::as_str), Some("ops"));
    }

    #[test]
    fn subset_reports_no_change() {
        let desired = map(&[("app", "apicast")]);
        let mut existing = Some(map(&[("app", "apicast"), ("owner", "ops")]));
        assert!(!merge_map(&mut existing, Some(&desired)));
    }

    #[test]
    fn empty_desired_leaves_missing_map_missing() {
        let mut existing = None;
        assert!(!merge_map(&mut existing, Some(&BTreeMap::new())));
        assert!(!merge_map(&mut existing, None));
        assert!(existing.is_none());
    }

    #[test]
    fn missing_existing_map_is_created() {
        let desired = map(&[("a", "1")]);
        let mut existing = None;
        assert!(merge_map(&mut existing, Some(&desired)));
        assert_eq!(existing, Some(desired));
    }

    #[test]
    fn additive_law_holds_for_mixed_maps() {
        let cases = [
            (vec![("a", "1")], vec![("b", "2")]),
            (vec![("a", "1"), ("b", "2")], vec![("b", "3"), ("c", "4")]),
            (vec![], vec![("x", "y")]),
            (vec![("x", "y")], vec![]),
        ];
        for (desired, existing) in cases {
            let desired = map(&desired);
            let original = map(&existing);
            let mut merged = Some(original.clone());
            merge_map(&mut merged, Some(&desired));
            let merged = merged.unwrap_or_default();

            for (k, v) in &desired {
                assert_eq!(merged.get(k), Some(v));
            }
            for (k, v) in original.iter().filter(|(k, _)| !desired.contains_key(*k)) {
                assert_eq!(merged.get(k), Some(v));
            }
        }
    }

    #[test]
    fn label_mutator_operates_on_metadata() {
        let desired = with_labels(&[("app", "system")]);
        let mut existing = with_labels(&[("extra", "kept")]);

        assert!(labels(&desired, &mut existing).unwrap());
        assert!(!labels(&desired, &mut existing).unwrap());
        assert_eq!(existing.metadata.labels.unwrap().len(), 2);
    }

    #[test]
    fn object_meta_merger_is_noop_on_copy() {
        let mut desired = with_labels(&[("app", "system")]);
        desired.metadata.annotations = Some(map(&[("note", "x")]));
        let mut existing = desired.clone();
        assert!(!object_meta_merger(&desired, &mut existing).unwrap());
    }
}
