//! Field mutators by object kind
//!
//! Every mutator has the shape `fn(&desired, &mut existing) -> Result<bool>`
//! and owns one concern. Parameterized mutators (env names, weak volume
//! names, TLS toggles, single secret keys) are built as boxed closures.

mod autoscaling;
mod config;
mod env;
mod image_stream;
mod meta;
mod pod;
mod rbac;
mod secret;
mod service;
mod service_account;
mod storage;
mod tls;
mod volumes;
mod workload;

pub use autoscaling::{hpa_spec, pdb_spec};
pub use config::{config_map_data, dashboard_spec};
pub use env::{
    dedup_env_vars, ensure_env_var, env_var_from_config_map, env_var_from_config_map_optional,
    env_var_from_secret, env_var_from_secret_optional, env_var_from_value, env_var_reconciler,
    env_vars_mutator, find_env_var, remove_duplicate_env_vars,
};
pub use image_stream::image_stream_tags;
pub use meta::{annotations, labels, merge_map, object_meta_merger};
pub use pod::{
    affinity, args, container_images, container_resources, containers, init_container_images,
    init_containers, pod_init_containers, pod_spec, pod_spec_mut, pod_template_annotations,
    pod_template_labels, pod_template_mutator, priority_class, probes, tolerations,
    topology_spread_constraints, PodTemplateOwner,
};
pub use rbac::{role_binding_subjects_and_ref, role_rules};
pub use secret::{reconcile_secret_field, secret_defaults_only, secret_reconcile_field, secret_string_data};
pub use service::{service_ports, service_selector};
pub use service_account::image_pull_secrets;
pub use storage::{parse_quantity, pvc_resources, quantities_equal};
pub use tls::{add_tls_volume, remove_tls_volume, tls_volume_toggle, TlsVolumeSpec};
pub use volumes::{
    strict_volume_mounts, strict_volumes, volume_mounts_union, volumes_union, weak_volume_mounts,
    weak_volumes,
};
pub use workload::{replicas, strategy, ReplicaOwner};
