//! Backing declarative object store
//!
//! [`ObjectStore`] is the seam between the reconciliation engine and the
//! cluster. The engine consumes `get`/`create`/`update`/`delete`; list filters
//! and status writers use `list` and `patch_status`. "Not found" on `get` is
//! modelled as `Ok(None)` so callers branch on it instead of matching errors.

use std::fmt::Debug;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::{Client, Resource, ResourceExt};
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

use apiary_common::{Error, FIELD_MANAGER};

use crate::Result;

/// Typed access to one kind of declarative object
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Clone + Send + Sync + 'static,
{
    /// Fetch an object by key; `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// Create a new object
    async fn create(&self, obj: &K) -> Result<()>;

    /// Replace an existing object (optimistic concurrency via resourceVersion)
    async fn update(&self, obj: &K) -> Result<()>;

    /// Delete an object, optionally with a propagation policy
    async fn delete(&self, obj: &K, propagation: Option<PropagationPolicy>) -> Result<()>;

    /// List all objects of this kind in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<K>>;

    /// Write the status subresource from `obj.status`
    async fn patch_status(&self, obj: &K) -> Result<()>;
}

/// Object store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    /// Create a store using the default field manager
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: FIELD_MANAGER.to_string(),
        }
    }

    /// Override the field manager recorded on writes
    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    fn api_for<K>(&self, obj: &K) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let ns = obj.namespace().ok_or_else(|| {
            Error::internal_with_context(
                "object_store",
                format!("{} {} has no namespace", K::kind(&()), obj.name_any()),
            )
        })?;
        Ok(Api::namespaced(self.client.clone(), &ns))
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    #[instrument(skip(self), fields(kind = %K::kind(&())))]
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, obj: &K) -> Result<()> {
        let api = self.api_for(obj)?;
        debug!(kind = %K::kind(&()), name = %obj.name_any(), "creating object");
        api.create(&self.post_params(), obj).await?;
        Ok(())
    }

    async fn update(&self, obj: &K) -> Result<()> {
        let api = self.api_for(obj)?;
        debug!(kind = %K::kind(&()), name = %obj.name_any(), "replacing object");
        api.replace(&obj.name_any(), &self.post_params(), obj).await?;
        Ok(())
    }

    async fn delete(&self, obj: &K, propagation: Option<PropagationPolicy>) -> Result<()> {
        let api = self.api_for(obj)?;
        let params = DeleteParams {
            propagation_policy: propagation,
            ..Default::default()
        };
        match api.delete(&obj.name_any(), &params).await {
            Ok(_) => Ok(()),
            // Already gone: deleting is idempotent
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn patch_status(&self, obj: &K) -> Result<()> {
        let api = self.api_for(obj)?;
        let value = serde_json::to_value(obj)?;
        let status = value.get("status").cloned().unwrap_or(serde_json::Value::Null);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            &obj.name_any(),
            &PatchParams {
                field_manager: Some(self.field_manager.clone()),
                ..Default::default()
            },
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}
