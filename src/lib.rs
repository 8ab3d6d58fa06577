//! Apiary - reconciliation core for API-management control planes on Kubernetes
//!
//! Apiary converges declarative objects (Products, Backends, and the
//! workloads of an APIManager installation) against two remote systems: the
//! Kubernetes API and a tenant's API-management admin portal.
//!
//! # Crates
//!
//! - [`common`] - Object types, errors, conditions and logging setup
//! - [`reconcile`] - Generic desired-vs-existing engine and field mutators
//! - [`capabilities`] - Portal client, remote entity index, provider account
//!   resolution and list filters
//!
//! [`Context`] wires the three together for a controller.

#![deny(missing_docs)]

use std::sync::Arc;

use kube::{Client, ResourceExt};
use tracing::info;

pub use apiary_capabilities as capabilities;
pub use apiary_common as common;
pub use apiary_reconcile as reconcile;

pub use apiary_common::{Error, KindRegistry, Result};

use apiary_capabilities::{
    BackendIndex, HttpPortalClient, KubeSecretSource, OsEnvConfig, PortalApi, PortalClientConfig,
    ProductIndex, ProviderAccount, ProviderAccountResolver,
};
use apiary_common::crd::ProviderAccountScoped;
use apiary_reconcile::{KubeStore, ResourceReconciler};

/// Shared state for controllers built on apiary
pub struct Context {
    store: KubeStore,
    registry: Arc<KindRegistry>,
    resolver: Arc<ProviderAccountResolver>,
    portal_config: PortalClientConfig,
}

impl Context {
    /// Discover optional kinds and build a context
    pub async fn new(client: Client) -> Self {
        let registry = Arc::new(KindRegistry::discover(client.clone()).await);
        Self::with_registry(client, registry)
    }

    /// Build a context around an existing kind registry
    ///
    /// Portal client settings are read from the process environment.
    pub fn with_registry(client: Client, registry: Arc<KindRegistry>) -> Self {
        let store = KubeStore::new(client);
        let source = Arc::new(KubeSecretSource::new(store.clone()));
        let resolver = Arc::new(ProviderAccountResolver::new(source));
        let portal_config = PortalClientConfig::from_env(&OsEnvConfig);

        info!(
            strategies = ?resolver.strategy_names(),
            insecure_skip_verify = portal_config.insecure_skip_verify,
            "apiary context ready"
        );

        Self {
            store,
            registry,
            resolver,
            portal_config,
        }
    }

    /// Object store used for every Kubernetes read and write
    pub fn store(&self) -> &KubeStore {
        &self.store
    }

    /// Optional kind registry
    pub fn registry(&self) -> Arc<KindRegistry> {
        Arc::clone(&self.registry)
    }

    /// Provider account resolver
    pub fn resolver(&self) -> Arc<ProviderAccountResolver> {
        Arc::clone(&self.resolver)
    }

    /// Reconciler writing through this context's store
    pub fn reconciler(&self) -> ResourceReconciler<KubeStore> {
        ResourceReconciler::new(self.store.clone(), Arc::clone(&self.registry))
    }

    /// Resolve the provider account an object belongs to
    pub async fn provider_account<K>(&self, obj: &K) -> Result<ProviderAccount>
    where
        K: ProviderAccountScoped + ResourceExt,
    {
        self.resolver.resolve_for(obj).await
    }

    /// Portal client for the tenant an object belongs to
    pub async fn portal_client<K>(&self, obj: &K) -> Result<Arc<dyn PortalApi>>
    where
        K: ProviderAccountScoped + ResourceExt,
    {
        let account = self.provider_account(obj).await?;
        let client = HttpPortalClient::new(&account, &self.portal_config)?;
        Ok(Arc::new(client))
    }

    /// Load the backend index of the object's tenant
    pub async fn backend_index<K>(&self, obj: &K) -> Result<BackendIndex>
    where
        K: ProviderAccountScoped + ResourceExt,
    {
        BackendIndex::load(self.portal_client(obj).await?).await
    }

    /// Load the product index of the object's tenant
    pub async fn product_index<K>(&self, obj: &K) -> Result<ProductIndex>
    where
        K: ProviderAccountScoped + ResourceExt,
    {
        ProductIndex::load(self.portal_client(obj).await?).await
    }
}
