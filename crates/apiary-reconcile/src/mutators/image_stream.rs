//! ImageStream tag reconciliation

use tracing::info;

use apiary_common::crd::ImageStream;
use apiary_common::kube_utils::object_info;

use crate::Result;

/// Merge desired tags by name
///
/// Missing tags are appended. For tags present on both sides only `from`
/// and `importPolicy` are reconciled; annotations and extra tags set by
/// others are left alone.
pub fn image_stream_tags(desired: &ImageStream, existing: &mut ImageStream) -> Result<bool> {
    let mut changed = false;
    for want in &desired.spec.tags {
        match existing.spec.tags.iter_mut().find(|t| t.name == want.name) {
            Some(have) => {
                if have.from != want.from {
                    have.from = want.from.clone();
                    changed = true;
                }
                if have.import_policy != want.import_policy {
                    have.import_policy = want.import_policy.clone();
                    changed = true;
                }
            }
            None => {
                existing.spec.tags.push(want.clone());
                changed = true;
            }
        }
    }
    if changed {
        info!(object = %object_info(desired), "image stream tags changed");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use apiary_common::crd::{ImageStreamSpec, ImageStreamTag, TagImportPolicy, TagReference};

    fn tag(name: &str, image: &str) -> ImageStreamTag {
        ImageStreamTag {
            name: name.to_string(),
            from: Some(TagReference {
                kind: "DockerImage".to_string(),
                name: image.to_string(),
            }),
            import_policy: TagImportPolicy {
                insecure: Some(false),
                scheduled: None,
            },
            annotations: None,
        }
    }

    fn stream(tags: Vec<ImageStreamTag>) -> ImageStream {
        ImageStream::new("amp-apicast", ImageStreamSpec { tags })
    }

    #[test]
    fn from_and_import_policy_are_reconciled() {
        let desired = stream(vec![tag("latest", "quay.io/3scale/apicast:2.15")]);
        let mut stale = tag("latest", "quay.io/3scale/apicast:2.14");
        stale.annotations = Some(BTreeMap::from([("user".to_string(), "x".to_string())]));
        stale.import_policy.insecure = Some(true);
        let mut existing = stream(vec![stale]);

        assert!(image_stream_tags(&desired, &mut existing).unwrap());
        let merged = &existing.spec.tags[0];
        assert_eq!(merged.from, desired.spec.tags[0].from);
        assert_eq!(merged.import_policy.insecure, Some(false));
        assert!(merged.annotations.is_some());
    }

    #[test]
    fn missing_tags_are_appended_and_extra_kept() {
        let desired = stream(vec![tag("2.15", "img:2.15")]);
        let mut existing = stream(vec![tag("custom", "img:custom")]);

        assert!(image_stream_tags(&desired, &mut existing).unwrap());
        let names: Vec<_> = existing.spec.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["custom", "2.15"]);
        assert!(!image_stream_tags(&desired, &mut existing).unwrap());
    }
}
