//! In-memory object store
//!
//! Mimics the platform semantics the engine relies on: resource versions
//! for optimistic concurrency, generation bumps on spec changes, a status
//! subresource, and finalizer-gated deletion.

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::client::{matches_selector, DeleteOptions, LabelSelector, ObjectStore, StoreError};
use crate::model::{Kind, Object, ObjectData, ObjectKey};

#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<ObjectKey, Object>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object as-is, bypassing every check
    ///
    /// Stands in for objects created by other controllers.
    pub async fn seed(&self, obj: Object) {
        self.objects.write().await.insert(obj.key(), obj);
    }

    /// All stored objects, sorted by key
    pub async fn objects(&self) -> Vec<Object> {
        let mut all: Vec<Object> = self.objects.read().await.values().cloned().collect();
        all.sort_by_key(|o| o.key());
        all
    }

    pub async fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

/// True when the spec part of a payload differs
fn spec_changed(old: &ObjectData, new: &ObjectData) -> bool {
    match (old, new) {
        (ObjectData::Cluster(a), ObjectData::Cluster(b)) => a.spec != b.spec,
        (ObjectData::Workload(a), ObjectData::Workload(b)) => a.spec != b.spec,
        (ObjectData::Pod(_), ObjectData::Pod(_)) => false,
        (a, b) => a != b,
    }
}

/// Replace everything but the status part of `stored` with `incoming`
fn merge_spec(stored: &Object, incoming: Object) -> Object {
    let mut merged = incoming;
    match (&stored.data, &mut merged.data) {
        (ObjectData::Cluster(old), ObjectData::Cluster(new)) => new.status = old.status.clone(),
        (ObjectData::Workload(old), ObjectData::Workload(new)) => new.status = old.status.clone(),
        (ObjectData::Pod(old), ObjectData::Pod(new)) => *new = old.clone(),
        _ => {}
    }
    merged
}

/// Replace only the status part of `stored` with the one from `incoming`
fn merge_status(stored: &Object, incoming: &Object) -> Object {
    let mut merged = stored.clone();
    match (&mut merged.data, &incoming.data) {
        (ObjectData::Cluster(old), ObjectData::Cluster(new)) => old.status = new.status.clone(),
        (ObjectData::Workload(old), ObjectData::Workload(new)) => old.status = new.status.clone(),
        (ObjectData::Pod(old), ObjectData::Pod(new)) => *old = new.clone(),
        (ObjectData::VolumeClaim(old), ObjectData::VolumeClaim(new)) => {
            old.capacity_bytes = new.capacity_bytes
        }
        _ => {}
    }
    merged
}

fn check_version(stored: &Object, incoming: &Object) -> Result<(), StoreError> {
    // A zero resource version means an unconditional write.
    if incoming.meta.resource_version != 0
        && incoming.meta.resource_version != stored.meta.resource_version
    {
        return Err(StoreError::Conflict {
            key: stored.key(),
            expected: incoming.meta.resource_version,
            actual: stored.meta.resource_version,
        });
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Object, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, StoreError> {
        let objects = self.objects.read().await;
        let mut found: Vec<Object> = objects
            .values()
            .filter(|o| o.kind == kind && o.meta.namespace == namespace)
            .filter(|o| matches_selector(o, selector))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        Ok(found)
    }

    async fn create(&self, mut obj: Object) -> Result<Object, StoreError> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        if obj.meta.uid.is_empty() {
            obj.meta.uid = Uuid::new_v4().to_string();
        }
        obj.meta.resource_version = 1;
        obj.meta.generation = 1;
        obj.meta.creation_timestamp.get_or_insert_with(SystemTime::now);
        obj.meta.deletion_timestamp = None;
        objects.insert(key, obj.clone());
        Ok(obj)
    }

    async fn update(&self, obj: Object) -> Result<Object, StoreError> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        let stored = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        check_version(stored, &obj)?;

        let mut updated = merge_spec(stored, obj);
        updated.meta.uid = stored.meta.uid.clone();
        updated.meta.creation_timestamp = stored.meta.creation_timestamp;
        updated.meta.deletion_timestamp = stored.meta.deletion_timestamp;
        updated.meta.resource_version = stored.meta.resource_version + 1;
        updated.meta.generation = if spec_changed(&stored.data, &updated.data) {
            stored.meta.generation + 1
        } else {
            stored.meta.generation
        };

        if updated.meta.is_deleting() && updated.meta.finalizers.is_empty() {
            objects.remove(&key);
        } else {
            objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(&self, obj: Object) -> Result<Object, StoreError> {
        let key = obj.key();
        let mut objects = self.objects.write().await;
        let stored = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        check_version(stored, &obj)?;

        let mut updated = merge_status(stored, &obj);
        updated.meta.resource_version = stored.meta.resource_version + 1;
        objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey, options: DeleteOptions) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        let stored = objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if options.force || stored.meta.finalizers.is_empty() {
            objects.remove(key);
        } else if stored.meta.deletion_timestamp.is_none() {
            stored.meta.deletion_timestamp = Some(SystemTime::now());
            stored.meta.resource_version += 1;
        }
        Ok(())
    }
}
