//! Lazily filled, explicitly invalidated cache cell
//!
//! Entity wrappers keep one cell per child collection. A read fills the cell
//! on first use; every write that could change the collection invalidates it
//! so the next read refetches.

use std::future::Future;

use crate::Result;

/// A value fetched once and reused until invalidated
#[derive(Clone, Debug)]
pub struct CachedCell<T> {
    value: Option<T>,
}

impl<T> Default for CachedCell<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> CachedCell<T> {
    /// Create an empty cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, fetching it first if the cell is empty
    ///
    /// A failed fetch leaves the cell empty.
    pub async fn get_or_try_fetch<F, Fut>(&mut self, fetch: F) -> Result<&T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = match self.value.take() {
            Some(value) => value,
            None => fetch().await?,
        };
        Ok(self.value.insert(value))
    }

    /// Store a value obtained elsewhere (e.g., returned by a write)
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Drop the cached value
    pub fn invalidate(&mut self) {
        self.value = None;
    }

    /// Whether a value is cached
    pub fn is_cached(&self) -> bool {
        self.value.is_some()
    }

    /// Cached value without fetching
    pub fn peek(&self) -> Option<&T> {
        self.value.as_ref()
    }
}
