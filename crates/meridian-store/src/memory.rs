//! In-memory reference store
//!
//! State is an immutable [`StoreState`] behind an `Arc`; snapshots clone the
//! `Arc` and never block writers. Writes build the next state under the write
//! lock and swap it in, so an envelope either commits completely or not at all.

use crate::error::{StoreError, StoreResult};
use crate::traits::{ResourceStore, StoreSnapshot, StoredVersion, WriteOperation, WriteResult};
use async_trait::async_trait;
use meridian_core::{NaturalKey, NaturalKeys, Resource, ResourceType, SearchQuery};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

type Key = (ResourceType, String);

#[derive(Debug, Clone)]
struct Entry {
    current: Resource,
    deleted: bool,
    history: Vec<Resource>,
}

/// Immutable store contents
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    resources: BTreeMap<Key, Entry>,
    unique: HashMap<NaturalKey, Key>,
}

impl StoreState {
    /// Number of non-deleted resources
    pub fn live_count(&self) -> usize {
        self.resources.values().filter(|e| !e.deleted).count()
    }

    fn claim_keys(&mut self, keys: Vec<NaturalKey>, owner: &Key) -> StoreResult<()> {
        for key in &keys {
            if let Some(holder) = self.unique.get(key) {
                if holder != owner {
                    return Err(StoreError::UniqueConstraintViolation {
                        key: key.to_string(),
                    });
                }
            }
        }
        for key in keys {
            self.unique.insert(key, owner.clone());
        }
        Ok(())
    }

    fn release_keys(&mut self, owner: &Key) {
        self.unique.retain(|_, holder| holder != owner);
    }

    fn apply(&mut self, keys: &NaturalKeys, op: WriteOperation) -> StoreResult<WriteResult> {
        match op {
            WriteOperation::Create(mut resource) => {
                let id = resource
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let key = (resource.resource_type(), id.clone());
                if self.resources.contains_key(&key) {
                    return Err(StoreError::invalid(format!(
                        "{}/{id} already exists",
                        key.0
                    )));
                }

                resource.id = Some(id);
                resource.version = Some(1);
                self.claim_keys(keys.keys(&resource), &key)?;
                self.resources.insert(
                    key,
                    Entry {
                        current: resource.clone(),
                        deleted: false,
                        history: Vec::new(),
                    },
                );
                Ok(WriteResult::Created(resource))
            }

            WriteOperation::Update(mut resource) => {
                let id = resource
                    .id
                    .clone()
                    .ok_or_else(|| StoreError::invalid("update requires an id"))?;
                let key = (resource.resource_type(), id);
                let version = match self.resources.get(&key) {
                    Some(entry) if !entry.deleted => entry.current.version.unwrap_or_default(),
                    _ => return Err(StoreError::not_found(key.0, key.1)),
                };

                resource.version = Some(version + 1);
                self.release_keys(&key);
                self.claim_keys(keys.keys(&resource), &key)?;
                if let Some(entry) = self.resources.get_mut(&key) {
                    let previous = std::mem::replace(&mut entry.current, resource.clone());
                    entry.history.push(previous);
                }
                Ok(WriteResult::Updated(resource))
            }

            WriteOperation::Delete { resource_type, id } => {
                let key = (resource_type, id);
                match self.resources.get_mut(&key) {
                    Some(entry) if !entry.deleted => {
                        entry.deleted = true;
                        let next = entry.current.version.unwrap_or_default() + 1;
                        entry.history.push(entry.current.clone());
                        entry.current.version = Some(next);
                    }
                    _ => return Err(StoreError::not_found(key.0, key.1)),
                }
                self.release_keys(&key);
                Ok(WriteResult::Deleted {
                    resource_type: key.0,
                    id: key.1,
                })
            }

            WriteOperation::PermanentDelete { resource_type, id } => {
                let key = (resource_type, id);
                if self.resources.remove(&key).is_none() {
                    return Err(StoreError::not_found(key.0, key.1));
                }
                self.release_keys(&key);
                Ok(WriteResult::PermanentlyDeleted {
                    resource_type: key.0,
                    id: key.1,
                })
            }
        }
    }
}

/// Snapshot over one immutable state
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    state: Arc<StoreState>,
}

#[async_trait]
impl StoreSnapshot for MemorySnapshot {
    async fn read(&self, resource_type: ResourceType, id: &str) -> StoreResult<Option<StoredVersion>> {
        Ok(self
            .state
            .resources
            .get(&(resource_type, id.to_string()))
            .map(|entry| StoredVersion {
                resource: entry.current.clone(),
                deleted: entry.deleted,
            }))
    }

    async fn search(&self, query: &SearchQuery) -> StoreResult<Vec<Resource>> {
        let unsupported = query.unsupported_parameters();
        if !unsupported.is_empty() {
            return Err(StoreError::UnsupportedQuery {
                resource_type: query.resource_type,
                parameters: unsupported,
            });
        }

        Ok(self
            .state
            .resources
            .range((query.resource_type, String::new())..)
            .take_while(|((rt, _), _)| *rt == query.resource_type)
            .filter(|(_, entry)| !entry.deleted && query.matches(&entry.current))
            .map(|(_, entry)| entry.current.clone())
            .collect())
    }
}

/// In-memory resource store with natural-key uniqueness
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<Arc<StoreState>>,
    keys: NaturalKeys,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store using the default task identifier system
    pub fn new() -> Self {
        Self::with_keys(NaturalKeys::default())
    }

    /// Empty store deriving uniqueness from `keys`
    pub fn with_keys(keys: NaturalKeys) -> Self {
        Self {
            state: RwLock::new(Arc::new(StoreState::default())),
            keys,
            available: AtomicBool::new(true),
        }
    }

    /// Insert `resources` in one envelope
    pub fn seed(&self, resources: impl IntoIterator<Item = Resource>) -> StoreResult<Vec<Resource>> {
        let operations = resources.into_iter().map(WriteOperation::Create).collect();
        Ok(self
            .commit(operations)?
            .into_iter()
            .filter_map(|result| match result {
                WriteResult::Created(resource) => Some(resource),
                _ => None,
            })
            .collect())
    }

    /// Insert resources from a JSON array
    pub fn seed_json(&self, json: &str) -> StoreResult<Vec<Resource>> {
        let resources: Vec<Resource> = serde_json::from_str(json)
            .map_err(|e| StoreError::invalid(format!("seed is not a resource array: {e}")))?;
        self.seed(resources)
    }

    /// Simulate an infrastructure outage; every operation fails while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current state
    pub fn state(&self) -> Arc<StoreState> {
        self.state.read().clone()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store marked unavailable"))
        }
    }

    fn commit(&self, operations: Vec<WriteOperation>) -> StoreResult<Vec<WriteResult>> {
        self.ensure_available()?;

        let mut guard = self.state.write();
        let mut next = StoreState::clone(&guard);
        let mut results = Vec::with_capacity(operations.len());
        for op in operations {
            results.push(next.apply(&self.keys, op)?);
        }
        *guard = Arc::new(next);

        debug!(writes = results.len(), "Committed store envelope");
        Ok(results)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn snapshot(&self) -> StoreResult<Box<dyn StoreSnapshot>> {
        self.ensure_available()?;
        Ok(Box::new(MemorySnapshot {
            state: self.state(),
        }))
    }

    async fn read(&self, resource_type: ResourceType, id: &str) -> StoreResult<Option<StoredVersion>> {
        self.ensure_available()?;
        MemorySnapshot {
            state: self.state(),
        }
        .read(resource_type, id)
        .await
    }

    async fn apply_atomically(&self, operations: Vec<WriteOperation>) -> StoreResult<Vec<WriteResult>> {
        self.commit(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::resource::{Identifier, NamingSystem, ResourceBody};

    fn naming_system(name: &str) -> Resource {
        Resource::new(ResourceBody::NamingSystem(NamingSystem {
            name: Some(name.to_string()),
            ..NamingSystem::default()
        }))
    }

    #[tokio::test]
    async fn failed_envelope_leaves_state_untouched() {
        let store = MemoryStore::new();
        store.seed([naming_system("a")]).unwrap();

        let result = store
            .apply_atomically(vec![
                WriteOperation::Create(naming_system("b")),
                WriteOperation::Create(naming_system("a")),
            ])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::UniqueConstraintViolation { .. })
        ));
        assert_eq!(store.state().live_count(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_later_writes() {
        let store = MemoryStore::new();
        let snapshot = store.snapshot().await.unwrap();
        store.create(naming_system("late")).await.unwrap();

        let query = SearchQuery::new(ResourceType::NamingSystem).param("name", "late");
        assert!(!snapshot.exists(&query).await.unwrap());
        assert!(store.snapshot().await.unwrap().exists(&query).await.unwrap());
    }

    #[tokio::test]
    async fn soft_delete_frees_natural_keys() {
        let store = MemoryStore::new();
        let created = store.create(naming_system("n")).await.unwrap();
        let id = created.id.clone().unwrap();

        store.delete(ResourceType::NamingSystem, &id).await.unwrap();
        let stored = store.read(ResourceType::NamingSystem, &id).await.unwrap().unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.resource.version, Some(2));

        store.create(naming_system("n")).await.unwrap();
    }

    #[tokio::test]
    async fn update_keeps_own_keys_and_bumps_version() {
        let store = MemoryStore::new();
        let created = store.create(naming_system("n")).await.unwrap();
        let updated = store.update(created.clone()).await.unwrap();
        assert_eq!(updated.version, Some(2));

        let other = store.create(naming_system("m")).await.unwrap();
        let mut clash = other;
        clash.body = naming_system("n").body;
        assert!(matches!(
            store.update(clash).await,
            Err(StoreError::UniqueConstraintViolation { .. })
        ));
    }

    #[tokio::test]
    async fn unsupported_parameters_are_rejected() {
        let store = MemoryStore::new();
        let snapshot = store.snapshot().await.unwrap();
        let query = SearchQuery::new(ResourceType::Patient).param("color", "blue");
        assert!(matches!(
            snapshot.search(&query).await,
            Err(StoreError::UnsupportedQuery { .. })
        ));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(store.snapshot().await.is_err());
        assert!(store.create(naming_system("x")).await.is_err());

        store.set_available(true);
        let identifier = Identifier::new("sys", "v");
        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot
            .organization_by_identifier(&identifier)
            .await
            .unwrap()
            .is_none());
    }
}
