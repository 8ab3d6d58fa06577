//! Namespace list filters
//!
//! Other controllers need "the synced products of this tenant" and similar
//! views. A list is fetched once and every object must pass every filter;
//! the first filter error aborts the whole list.

use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::debug;

use apiary_common::crd::{Backend, Product, ProviderAccountScoped, Synchronizable};
use apiary_reconcile::ObjectStore;

use crate::account::ProviderAccountResolver;
use crate::Result;

/// Predicate over listed objects
#[async_trait]
pub trait ObjectFilter<K>: Send + Sync {
    /// Whether the object passes
    async fn matches(&self, obj: &K) -> Result<bool>;
}

/// List a namespace and keep objects passing every filter
pub async fn list_and_filter<K, S>(
    store: &S,
    namespace: &str,
    filters: &[&dyn ObjectFilter<K>],
) -> Result<Vec<K>>
where
    K: Clone + Send + Sync + 'static,
    S: ObjectStore<K> + ?Sized,
{
    let listed = store.list(namespace).await?;
    let total = listed.len();

    let mut kept = Vec::with_capacity(total);
    'objects: for obj in listed {
        for filter in filters {
            if !filter.matches(&obj).await? {
                continue 'objects;
            }
        }
        kept.push(obj);
    }

    debug!(namespace = %namespace, total, kept = kept.len(), "filtered list");
    Ok(kept)
}

/// Keeps objects whose `Synced` condition is true
pub struct SyncedFilter;

#[async_trait]
impl<K> ObjectFilter<K> for SyncedFilter
where
    K: Synchronizable + Send + Sync,
{
    async fn matches(&self, obj: &K) -> Result<bool> {
        Ok(obj.is_synced())
    }
}

/// Keeps objects that resolve to the given tenant
pub struct ProviderAccountFilter {
    resolver: Arc<ProviderAccountResolver>,
    admin_url: String,
}

impl ProviderAccountFilter {
    /// Filter for objects of the tenant at `admin_url`
    pub fn new(resolver: Arc<ProviderAccountResolver>, admin_url: impl Into<String>) -> Self {
        Self {
            resolver,
            admin_url: admin_url.into(),
        }
    }
}

#[async_trait]
impl<K> ObjectFilter<K> for ProviderAccountFilter
where
    K: ProviderAccountScoped + ResourceExt + Send + Sync,
{
    async fn matches(&self, obj: &K) -> Result<bool> {
        let account = self.resolver.resolve_for(obj).await?;
        Ok(account.same_tenant(&self.admin_url))
    }
}

/// Synced products of one tenant
pub async fn product_list<S>(
    store: &S,
    resolver: Arc<ProviderAccountResolver>,
    namespace: &str,
    admin_url: &str,
) -> Result<Vec<Product>>
where
    S: ObjectStore<Product> + ?Sized,
{
    let tenant = ProviderAccountFilter::new(resolver, admin_url);
    let filters: [&dyn ObjectFilter<Product>; 2] = [&SyncedFilter, &tenant];
    list_and_filter(store, namespace, &filters).await
}

/// Synced backends of one tenant
pub async fn backend_list<S>(
    store: &S,
    resolver: Arc<ProviderAccountResolver>,
    namespace: &str,
    admin_url: &str,
) -> Result<Vec<Backend>>
where
    S: ObjectStore<Backend> + ?Sized,
{
    let tenant = ProviderAccountFilter::new(resolver, admin_url);
    let filters: [&dyn ObjectFilter<Backend>; 2] = [&SyncedFilter, &tenant];
    list_and_filter(store, namespace, &filters).await
}

/// Product with this system name
pub fn find_product_by_system_name<'a>(products: &'a [Product], system_name: &str) -> Option<&'a Product> {
    products.iter().find(|p| p.spec.system_name == system_name)
}

/// Backend with this system name
pub fn find_backend_by_system_name<'a>(backends: &'a [Backend], system_name: &str) -> Option<&'a Backend> {
    backends.iter().find(|b| b.spec.system_name == system_name)
}
