//! Store trait, selectors and errors

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Kind, Object, ObjectKey};

/// Label equality selector; an empty selector matches everything
pub type LabelSelector = BTreeMap<String, String>;

pub fn selector(pairs: &[(&str, &str)]) -> LabelSelector {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn matches_selector(obj: &Object, selector: &LabelSelector) -> bool {
    selector
        .iter()
        .all(|(k, v)| obj.meta.labels.get(k).map(|actual| actual == v).unwrap_or(false))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Remove immediately, ignoring finalizers
    pub force: bool,
}

impl DeleteOptions {
    pub fn force() -> Self {
        Self { force: true }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ObjectKey),

    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),

    /// Optimistic-concurrency check failed
    #[error("conflict on {key}: expected resource version {expected}, found {actual}")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// CRUD and list access to platform objects
///
/// `update` writes metadata and spec; status payloads only change through
/// `update_status`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError>;

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, StoreError>;

    async fn create(&self, obj: Object) -> Result<Object, StoreError>;

    async fn update(&self, obj: Object) -> Result<Object, StoreError>;

    async fn update_status(&self, obj: Object) -> Result<Object, StoreError>;

    async fn delete(&self, key: &ObjectKey, options: DeleteOptions) -> Result<(), StoreError>;
}

/// Read-only view of a store handed to transformers
#[derive(Clone)]
pub struct ReadonlyClient {
    inner: Arc<dyn ObjectStore>,
}

impl ReadonlyClient {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError> {
        self.inner.get(key).await
    }

    /// Like `get`, mapping NotFound to None
    pub async fn find(&self, key: &ObjectKey) -> Result<Option<Object>, StoreError> {
        match self.inner.get(key).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, StoreError> {
        self.inner.list(kind, namespace, selector).await
    }
}
