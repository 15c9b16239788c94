//! Mock store implementation for testing.
//!
//! Provides [`MockCollectionStore`] for unit testing without filesystem access.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::metadata::CollectionMetadata;
use crate::store::{
    Collection, CollectionStore, PendingTransition, StoreError, StoreErrorKind,
};

const BACKEND: &str = "Mock";

type Key = (String, String);

fn key(workflow: &str, id: &str) -> Key {
    (workflow.to_owned(), id.to_owned())
}

/// Mock collection store for testing.
///
/// Holds collections in memory. Paths follow the filesystem layout under a
/// virtual `/mock` root so path-based assertions read naturally.
///
/// # Example
///
/// ```ignore
/// use docket_store::{CollectionMetadata, CollectionStore, MockCollectionStore, now};
///
/// let store = MockCollectionStore::new()
///     .with_collection(CollectionMetadata::new("job", "acme", "active", now()));
///
/// let collection = store.get("job", "acme").unwrap();
/// assert_eq!(collection.path, std::path::Path::new("/mock/job/active/acme"));
/// ```
#[derive(Debug, Default)]
pub struct MockCollectionStore {
    collections: RwLock<BTreeMap<Key, Collection>>,
    journal: RwLock<BTreeMap<Key, PendingTransition>>,
    persist_count: AtomicUsize,
    relocate_count: AtomicUsize,
    fail_persist: AtomicBool,
}

impl MockCollectionStore {
    /// Create a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path a collection occupies while in `status`.
    #[must_use]
    pub fn path_for(workflow: &str, status: &str, id: &str) -> PathBuf {
        PathBuf::from("/mock").join(workflow).join(status).join(id)
    }

    /// Add a collection located under its metadata status.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_collection(self, metadata: CollectionMetadata) -> Self {
        let path = Self::path_for(&metadata.workflow, &metadata.status, &metadata.collection_id);
        self.with_collection_at(metadata, path, Vec::new())
    }

    /// Add a collection at an explicit path with the given artifacts.
    ///
    /// Use a path whose parent differs from the metadata status to simulate
    /// an interrupted transition.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_collection_at(
        self,
        metadata: CollectionMetadata,
        path: impl Into<PathBuf>,
        artifacts: Vec<String>,
    ) -> Self {
        let collection = Collection {
            metadata,
            artifacts,
            path: path.into(),
        };
        self.collections.write().unwrap().insert(
            key(collection.workflow(), collection.id()),
            collection,
        );
        self
    }

    /// Add a pending transition record.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_pending(self, pending: PendingTransition) -> Self {
        self.journal.write().unwrap().insert(
            key(&pending.workflow, &pending.collection_id),
            pending,
        );
        self
    }

    /// Make every subsequent `persist` call fail.
    pub fn fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `persist` calls.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }

    /// Number of `relocate` calls that moved a collection.
    #[must_use]
    pub fn relocate_count(&self) -> usize {
        self.relocate_count.load(Ordering::SeqCst)
    }

    /// Stored state of a collection, bypassing `get`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn stored(&self, workflow: &str, id: &str) -> Option<Collection> {
        self.collections
            .read()
            .unwrap()
            .get(&key(workflow, id))
            .cloned()
    }
}

impl CollectionStore for MockCollectionStore {
    fn get(&self, workflow: &str, id: &str) -> Result<Collection, StoreError> {
        self.stored(workflow, id).ok_or_else(|| {
            StoreError::not_found(PathBuf::from("/mock").join(workflow).join(id))
                .with_backend(BACKEND)
        })
    }

    fn list(&self, workflow: &str) -> Result<Vec<Collection>, StoreError> {
        Ok(self
            .collections
            .read()
            .unwrap()
            .values()
            .filter(|c| c.workflow() == workflow)
            .cloned()
            .collect())
    }

    fn persist(&self, collection: &Collection) -> Result<(), StoreError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreErrorKind::Other)
                .with_backend(BACKEND)
                .with_path(collection.metadata_path())
                .with_message("persist disabled"));
        }

        let mut collections = self.collections.write().unwrap();
        let stored = collections
            .get_mut(&key(collection.workflow(), collection.id()))
            .ok_or_else(|| StoreError::not_found(&collection.path).with_backend(BACKEND))?;
        stored.metadata = collection.metadata.clone();
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create(&self, metadata: CollectionMetadata) -> Result<Collection, StoreError> {
        let mut collections = self.collections.write().unwrap();
        let k = key(&metadata.workflow, &metadata.collection_id);
        if let Some(existing) = collections.get(&k) {
            return Err(StoreError::new(StoreErrorKind::AlreadyExists)
                .with_backend(BACKEND)
                .with_path(&existing.path));
        }

        let collection = Collection {
            path: Self::path_for(&metadata.workflow, &metadata.status, &metadata.collection_id),
            metadata,
            artifacts: Vec::new(),
        };
        collections.insert(k, collection.clone());
        Ok(collection)
    }

    fn relocate(&self, collection: &mut Collection, status: &str) -> Result<(), StoreError> {
        let target = Self::path_for(collection.workflow(), status, collection.id());
        if target == collection.path {
            return Ok(());
        }

        let mut collections = self.collections.write().unwrap();
        let stored = collections
            .get_mut(&key(collection.workflow(), collection.id()))
            .ok_or_else(|| StoreError::not_found(&collection.path).with_backend(BACKEND))?;
        stored.path.clone_from(&target);
        collection.path = target;
        self.relocate_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn refresh_artifacts(&self, collection: &mut Collection) -> Result<(), StoreError> {
        if let Some(stored) = self.stored(collection.workflow(), collection.id()) {
            collection.artifacts = stored.artifacts;
        }
        Ok(())
    }

    fn begin_transition(&self, pending: &PendingTransition) -> Result<(), StoreError> {
        self.journal.write().unwrap().insert(
            key(&pending.workflow, &pending.collection_id),
            pending.clone(),
        );
        Ok(())
    }

    fn end_transition(&self, workflow: &str, id: &str) -> Result<(), StoreError> {
        self.journal.write().unwrap().remove(&key(workflow, id));
        Ok(())
    }

    fn pending_transitions(&self, workflow: &str) -> Result<Vec<PendingTransition>, StoreError> {
        Ok(self
            .journal
            .read()
            .unwrap()
            .values()
            .filter(|p| p.workflow == workflow)
            .cloned()
            .collect())
    }
}
