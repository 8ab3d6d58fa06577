//! In-memory index of a tenant's remote entities
//!
//! One list call per reconcile attempt loads every backend (or product) into
//! two maps keyed by remote ID and by system name. Lookups hand out the
//! entity wrapper so its child caches survive across lookups within the
//! attempt. Creates go through the index so the new entity is findable
//! immediately.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::BackendEntity;
use crate::client::PortalApi;
use crate::product::ProductEntity;
use crate::types::Params;
use crate::Result;

/// Entity addressable by remote ID and system name
pub trait IndexedEntity {
    /// Remote ID
    fn id(&self) -> i64;

    /// System name
    fn system_name(&self) -> &str;
}

impl IndexedEntity for BackendEntity {
    fn id(&self) -> i64 {
        BackendEntity::id(self)
    }

    fn system_name(&self) -> &str {
        BackendEntity::system_name(self)
    }
}

impl IndexedEntity for ProductEntity {
    fn id(&self) -> i64 {
        ProductEntity::id(self)
    }

    fn system_name(&self) -> &str {
        ProductEntity::system_name(self)
    }
}

/// Entities keyed by ID, with a secondary system-name index
pub struct RemoteIndex<E> {
    by_id: HashMap<i64, E>,
    by_system_name: HashMap<String, i64>,
}

impl<E> Default for RemoteIndex<E> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_system_name: HashMap::new(),
        }
    }
}

impl<E: IndexedEntity> RemoteIndex<E> {
    /// Build both maps from a list of entities
    pub fn from_entities(entities: impl IntoIterator<Item = E>) -> Self {
        let mut index = Self::default();
        for entity in entities {
            index.insert(entity);
        }
        index
    }

    /// Add or replace an entity
    pub fn insert(&mut self, entity: E) {
        let id = entity.id();
        if let Some(previous) = self.by_id.get(&id) {
            self.by_system_name.remove(previous.system_name());
        }
        self.by_system_name
            .insert(entity.system_name().to_string(), id);
        self.by_id.insert(id, entity);
    }

    /// Entity with this remote ID
    pub fn find_by_id(&mut self, id: i64) -> Option<&mut E> {
        self.by_id.get_mut(&id)
    }

    /// Entity with this system name
    pub fn find_by_system_name(&mut self, system_name: &str) -> Option<&mut E> {
        let id = *self.by_system_name.get(system_name)?;
        self.by_id.get_mut(&id)
    }

    /// Re-key an entity under its current system name
    ///
    /// Needed after an in-place update renamed the entity.
    pub fn reindex(&mut self, id: i64) {
        let Some(entity) = self.by_id.get(&id) else {
            return;
        };
        self.by_system_name.retain(|_, indexed| *indexed != id);
        self.by_system_name
            .insert(entity.system_name().to_string(), id);
    }

    /// Remove an entity, returning it
    pub fn remove(&mut self, id: i64) -> Option<E> {
        let entity = self.by_id.remove(&id)?;
        self.by_system_name.remove(entity.system_name());
        Some(entity)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All remote IDs
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.by_id.keys().copied()
    }
}

/// Index of the tenant's backends
pub struct BackendIndex {
    api: Arc<dyn PortalApi>,
    index: RemoteIndex<BackendEntity>,
}

impl BackendIndex {
    /// Load every backend with one list call
    pub async fn load(api: Arc<dyn PortalApi>) -> Result<Self> {
        let items = api
            .list_backend_apis()
            .await
            .map_err(|e| e.with_context("list backends"))?;
        debug!(count = items.len(), "loaded backend index");
        let index = RemoteIndex::from_entities(
            items
                .into_iter()
                .map(|item| BackendEntity::new(Arc::clone(&api), item)),
        );
        Ok(Self { api, index })
    }

    /// Create a backend and index it
    pub async fn create(&mut self, params: &Params) -> Result<&mut BackendEntity> {
        let item = self
            .api
            .create_backend_api(params)
            .await
            .map_err(|e| e.with_context("create backend"))?;
        info!(backend = %item.system_name, id = item.id, "backend created");
        let id = item.id;
        self.index.insert(BackendEntity::new(Arc::clone(&self.api), item));
        self.index
            .find_by_id(id)
            .ok_or_else(|| apiary_common::Error::internal_with_context("backend index", "created backend not indexed"))
    }

    /// Update a backend in place and re-key it under its new system name
    pub async fn update(&mut self, id: i64, params: &Params) -> Result<&mut BackendEntity> {
        let entity = self
            .index
            .find_by_id(id)
            .ok_or_else(|| apiary_common::Error::not_found("Backend", id.to_string()))?;
        entity.update(params).await?;
        self.index.reindex(id);
        self.index
            .find_by_id(id)
            .ok_or_else(|| apiary_common::Error::not_found("Backend", id.to_string()))
    }

    /// Backend with this remote ID
    pub fn find_by_id(&mut self, id: i64) -> Option<&mut BackendEntity> {
        self.index.find_by_id(id)
    }

    /// Backend with this system name
    pub fn find_by_system_name(&mut self, system_name: &str) -> Option<&mut BackendEntity> {
        self.index.find_by_system_name(system_name)
    }

    /// Underlying index
    pub fn index(&self) -> &RemoteIndex<BackendEntity> {
        &self.index
    }
}

/// Index of the tenant's products
pub struct ProductIndex {
    api: Arc<dyn PortalApi>,
    index: RemoteIndex<ProductEntity>,
}

impl ProductIndex {
    /// Load every product with one list call
    pub async fn load(api: Arc<dyn PortalApi>) -> Result<Self> {
        let items = api
            .list_products()
            .await
            .map_err(|e| e.with_context("list products"))?;
        debug!(count = items.len(), "loaded product index");
        let index = RemoteIndex::from_entities(
            items
                .into_iter()
                .map(|item| ProductEntity::new(Arc::clone(&api), item)),
        );
        Ok(Self { api, index })
    }

    /// Create a product and index it
    pub async fn create(&mut self, params: &Params) -> Result<&mut ProductEntity> {
        let item = self
            .api
            .create_product(params)
            .await
            .map_err(|e| e.with_context("create product"))?;
        info!(product = %item.system_name, id = item.id, "product created");
        let id = item.id;
        self.index.insert(ProductEntity::new(Arc::clone(&self.api), item));
        self.index
            .find_by_id(id)
            .ok_or_else(|| apiary_common::Error::internal_with_context("product index", "created product not indexed"))
    }

    /// Update a product in place and re-key it under its new system name
    pub async fn update(&mut self, id: i64, params: &Params) -> Result<&mut ProductEntity> {
        let entity = self
            .index
            .find_by_id(id)
            .ok_or_else(|| apiary_common::Error::not_found("Product", id.to_string()))?;
        entity.update(params).await?;
        self.index.reindex(id);
        self.index
            .find_by_id(id)
            .ok_or_else(|| apiary_common::Error::not_found("Product", id.to_string()))
    }

    /// Product with this remote ID
    pub fn find_by_id(&mut self, id: i64) -> Option<&mut ProductEntity> {
        self.index.find_by_id(id)
    }

    /// Product with this system name
    pub fn find_by_system_name(&mut self, system_name: &str) -> Option<&mut ProductEntity> {
        self.index.find_by_system_name(system_name)
    }

    /// Underlying index
    pub fn index(&self) -> &RemoteIndex<ProductEntity> {
        &self.index
    }
}
