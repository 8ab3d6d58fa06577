//! Portal-side capabilities for apiary
//!
//! - [`client`]: the [`PortalApi`] seam and its reqwest implementation
//! - [`types`]: portal wire elements
//! - [`cache`]: the invalidatable [`CachedCell`]
//! - [`index`]: per-attempt index of backends and products
//! - [`backend`], [`product`], [`plan`], [`application`]: remote entity wrappers
//! - [`account`]: provider account resolution
//! - [`filters`]: namespace list filters
//! - [`config`]: client settings from the environment

#![deny(missing_docs)]

pub mod account;
pub mod application;
pub mod backend;
pub mod cache;
mod catalog;
pub mod client;
pub mod config;
pub mod filters;
pub mod index;
pub mod plan;
pub mod product;
pub mod types;

pub use account::{
    AccountLookup, ApiManagerLookup, DefaultSecretLookup, ExplicitSecretLookup, KubeSecretSource,
    ProviderAccount, ProviderAccountResolver, SecretSource,
};
pub use application::{find_application_by_id, ApplicationEntity};
pub use backend::BackendEntity;
pub use cache::CachedCell;
pub use catalog::sanitize_backend_system_name;
pub use client::{ApiScope, HttpPortalClient, PortalApi};
pub use config::{EnvConfig, OsEnvConfig, PortalClientConfig};
pub use filters::{
    backend_list, find_backend_by_system_name, find_product_by_system_name, list_and_filter,
    product_list, ObjectFilter, ProviderAccountFilter, SyncedFilter,
};
pub use index::{BackendIndex, IndexedEntity, ProductIndex, RemoteIndex};
pub use plan::ApplicationPlanEntity;
pub use product::ProductEntity;

pub use apiary_common::{Error, Result};
