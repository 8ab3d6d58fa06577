//! Remote developer application wrapper

use std::sync::Arc;

use tracing::info;

use crate::client::PortalApi;
use crate::types::{ApplicationItem, Params};
use crate::Result;

/// Application state after a suspend
const SUSPENDED_STATE: &str = "suspended";

/// A developer application owned by one developer account
pub struct ApplicationEntity {
    api: Arc<dyn PortalApi>,
    account_id: i64,
    item: ApplicationItem,
}

/// Look up an application; `None` when the portal reports it missing
pub async fn find_application_by_id(
    api: Arc<dyn PortalApi>,
    account_id: i64,
    id: i64,
) -> Result<Option<ApplicationEntity>> {
    match api.read_application(account_id, id).await {
        Ok(item) => Ok(Some(ApplicationEntity::new(api, account_id, item))),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.with_context(format!("account [{account_id}] get application [{id}]"))),
    }
}

impl ApplicationEntity {
    /// Wrap an application element
    pub fn new(api: Arc<dyn PortalApi>, account_id: i64, item: ApplicationItem) -> Self {
        Self {
            api,
            account_id,
            item,
        }
    }

    /// Remote ID
    pub fn id(&self) -> i64 {
        self.item.id
    }

    /// Owning developer account
    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// Lifecycle state
    pub fn state(&self) -> &str {
        &self.item.state
    }

    /// Whether the application is suspended
    pub fn is_suspended(&self) -> bool {
        self.item.state == SUSPENDED_STATE
    }

    /// Current plan
    pub fn plan_id(&self) -> i64 {
        self.item.plan_id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.item.name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.item.description
    }

    /// API key, for user-key products
    pub fn user_key(&self) -> &str {
        &self.item.user_key
    }

    fn context(&self, op: &str) -> String {
        format!("application [{}] {op}", self.item.id)
    }

    /// Update name/description and other attributes
    pub async fn update(&mut self, params: &Params) -> Result<()> {
        self.item = self
            .api
            .update_application(self.account_id, self.item.id, params)
            .await
            .map_err(|e| e.with_context(self.context("update")))?;
        Ok(())
    }

    /// Suspend the application
    pub async fn suspend(&mut self) -> Result<()> {
        self.item = self
            .api
            .suspend_application(self.account_id, self.item.id)
            .await
            .map_err(|e| e.with_context(self.context("suspend")))?;
        info!(application = self.item.id, "application suspended");
        Ok(())
    }

    /// Resume a suspended application
    pub async fn resume(&mut self) -> Result<()> {
        self.item = self
            .api
            .resume_application(self.account_id, self.item.id)
            .await
            .map_err(|e| e.with_context(self.context("resume")))?;
        info!(application = self.item.id, "application resumed");
        Ok(())
    }

    /// Move the application to another plan
    pub async fn change_plan(&mut self, plan_id: i64) -> Result<()> {
        self.item = self
            .api
            .change_application_plan(self.account_id, self.item.id, plan_id)
            .await
            .map_err(|e| e.with_context(self.context("change plan")))?;
        Ok(())
    }

    /// Delete the application
    pub async fn delete(self) -> Result<()> {
        self.api
            .delete_application(self.account_id, self.item.id)
            .await
            .map_err(|e| e.with_context(self.context("delete")))
    }
}
