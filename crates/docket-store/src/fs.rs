//! Filesystem collection store.
//!
//! Provides [`FsCollectionStore`], which keeps each collection in a directory
//! whose parent is named after the collection's current stage:
//!
//! ```text
//! {collections_dir}/
//! +-- job/                       # workflow
//!     +-- .transitions/          # journal of in-flight stage changes
//!     +-- active/                # stage
//!     |   +-- acme-backend/      # collection
//!     |       +-- collection.yml
//!     |       +-- cover_letter.md
//!     +-- submitted/
//! ```
//!
//! Hidden entries (leading `.`) are never treated as stages, collections or
//! artifacts.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::metadata::CollectionMetadata;
use crate::store::{
    Collection, CollectionStore, METADATA_FILE, PendingTransition, StoreError, StoreErrorKind,
};
use crate::yaml::{parse_metadata, serialize_metadata};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Per-workflow directory holding pending transition records.
const JOURNAL_DIR: &str = ".transitions";

fn io_error(err: std::io::Error, path: &Path) -> StoreError {
    StoreError::io(err, Some(path.to_path_buf())).with_backend(BACKEND)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Filesystem storage for collections.
///
/// # Example
///
/// ```ignore
/// use docket_store::{CollectionStore, FsCollectionStore};
///
/// let store = FsCollectionStore::new("collections".into());
/// for collection in store.list("job")? {
///     println!("{} [{}]", collection.id(), collection.status());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FsCollectionStore {
    /// Root directory holding one subdirectory per workflow.
    collections_dir: PathBuf,
}

impl FsCollectionStore {
    /// Create a store rooted at `collections_dir`.
    #[must_use]
    pub fn new(collections_dir: PathBuf) -> Self {
        Self { collections_dir }
    }

    /// Root directory of this store.
    #[must_use]
    pub fn collections_dir(&self) -> &Path {
        &self.collections_dir
    }

    /// Directory a collection occupies while in `status`.
    #[must_use]
    pub fn collection_dir(&self, workflow: &str, status: &str, id: &str) -> PathBuf {
        self.workflow_dir(workflow).join(status).join(id)
    }

    fn workflow_dir(&self, workflow: &str) -> PathBuf {
        self.collections_dir.join(workflow)
    }

    fn journal_path(&self, workflow: &str, id: &str) -> PathBuf {
        self.workflow_dir(workflow)
            .join(JOURNAL_DIR)
            .join(format!("{id}.json"))
    }

    /// Reject names that would escape or alias the directory layout.
    ///
    /// Workflow names, stage names and collection ids all become single path
    /// segments.
    fn validate_segment(segment: &str, what: &str) -> Result<(), StoreError> {
        let valid = !segment.is_empty()
            && !is_hidden(segment)
            && !segment.contains(['/', '\\'])
            && segment.trim() == segment;

        if valid {
            Ok(())
        } else {
            Err(StoreError::new(StoreErrorKind::InvalidPath)
                .with_backend(BACKEND)
                .with_message(format!("invalid {what} '{segment}'")))
        }
    }

    /// Stage directories of a workflow, sorted by name.
    ///
    /// Returns `None` if the workflow directory does not exist.
    fn status_dirs(&self, workflow: &str) -> Result<Option<Vec<PathBuf>>, StoreError> {
        let dir = self.workflow_dir(workflow);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e, &dir)),
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter(|e| !is_hidden(&e.file_name().to_string_lossy()))
            .map(|e| e.path())
            .collect();
        dirs.sort();
        Ok(Some(dirs))
    }

    /// Find the directory currently holding collection `id`.
    fn locate(&self, workflow: &str, id: &str) -> Result<Option<PathBuf>, StoreError> {
        let Some(status_dirs) = self.status_dirs(workflow)? else {
            return Ok(None);
        };

        let mut found = status_dirs
            .into_iter()
            .map(|status_dir| status_dir.join(id))
            .filter(|dir| dir.join(METADATA_FILE).is_file());

        let first = found.next();
        if let Some(extra) = found.next() {
            tracing::warn!(
                collection = id,
                used = %first.as_deref().unwrap_or(Path::new("")).display(),
                ignored = %extra.display(),
                "collection found under more than one stage"
            );
        }
        Ok(first)
    }

    /// Read a collection from its directory.
    fn load(workflow: &str, dir: &Path) -> Result<Collection, StoreError> {
        let meta_path = dir.join(METADATA_FILE);
        let content = fs::read_to_string(&meta_path).map_err(|e| io_error(e, &meta_path))?;
        let metadata = parse_metadata(&content)
            .map_err(|msg| StoreError::invalid(&meta_path, msg).with_backend(BACKEND))?;

        let dir_name = dir.file_name().map(|n| n.to_string_lossy());
        if dir_name.as_deref() != Some(metadata.collection_id.as_str()) {
            return Err(StoreError::invalid(
                &meta_path,
                format!(
                    "collection_id '{}' does not match directory name",
                    metadata.collection_id
                ),
            )
            .with_backend(BACKEND));
        }
        if metadata.workflow != workflow {
            return Err(StoreError::invalid(
                &meta_path,
                format!(
                    "workflow '{}' does not match '{workflow}'",
                    metadata.workflow
                ),
            )
            .with_backend(BACKEND));
        }

        let collection = Collection {
            metadata,
            artifacts: Self::list_artifacts(dir)?,
            path: dir.to_path_buf(),
        };

        if let Some(location) = collection.location_status()
            && location != collection.status()
        {
            tracing::warn!(
                collection = collection.id(),
                metadata_status = collection.status(),
                directory_status = location,
                "collection directory and metadata disagree on status; run recovery"
            );
        }

        Ok(collection)
    }

    /// Non-hidden regular files in a collection directory, excluding metadata.
    fn list_artifacts(dir: &Path) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(dir).map_err(|e| io_error(e, dir))?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !is_hidden(name) && name != METADATA_FILE)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Write `collection.yml` via a temporary file and rename.
    fn write_metadata(dir: &Path, metadata: &CollectionMetadata) -> Result<(), StoreError> {
        let path = dir.join(METADATA_FILE);
        let yaml = serialize_metadata(metadata).map_err(|e| {
            StoreError::new(StoreErrorKind::Other)
                .with_backend(BACKEND)
                .with_path(&path)
                .with_source(e)
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(e, dir))?;
        tmp.write_all(yaml.as_bytes())
            .map_err(|e| io_error(e, tmp.path()))?;
        tmp.persist(&path).map_err(|e| io_error(e.error, &path))?;
        Ok(())
    }
}

impl CollectionStore for FsCollectionStore {
    fn get(&self, workflow: &str, id: &str) -> Result<Collection, StoreError> {
        Self::validate_segment(workflow, "workflow name")?;
        Self::validate_segment(id, "collection id")?;

        let dir = self.locate(workflow, id)?.ok_or_else(|| {
            StoreError::not_found(self.workflow_dir(workflow).join("*").join(id))
                .with_backend(BACKEND)
                .with_message(format!("no collection '{id}' in workflow '{workflow}'"))
        })?;

        Self::load(workflow, &dir)
    }

    fn list(&self, workflow: &str) -> Result<Vec<Collection>, StoreError> {
        Self::validate_segment(workflow, "workflow name")?;

        let Some(status_dirs) = self.status_dirs(workflow)? else {
            return Ok(Vec::new());
        };

        let mut collections = Vec::new();
        for status_dir in status_dirs {
            let entries = fs::read_dir(&status_dir).map_err(|e| io_error(e, &status_dir))?;
            for entry in entries.filter_map(Result::ok) {
                let name = entry.file_name();
                if is_hidden(&name.to_string_lossy())
                    || !entry.file_type().is_ok_and(|t| t.is_dir())
                {
                    continue;
                }
                let dir = entry.path();
                if !dir.join(METADATA_FILE).is_file() {
                    continue;
                }
                match Self::load(workflow, &dir) {
                    Ok(collection) => collections.push(collection),
                    Err(err) => {
                        tracing::warn!(path = %dir.display(), error = %err, "skipping collection");
                    }
                }
            }
        }

        Ok(collections)
    }

    fn persist(&self, collection: &Collection) -> Result<(), StoreError> {
        Self::write_metadata(&collection.path, &collection.metadata)?;
        tracing::debug!(
            collection = collection.id(),
            path = %collection.path.display(),
            "persisted metadata"
        );
        Ok(())
    }

    fn create(&self, metadata: CollectionMetadata) -> Result<Collection, StoreError> {
        Self::validate_segment(&metadata.workflow, "workflow name")?;
        Self::validate_segment(&metadata.status, "stage name")?;
        Self::validate_segment(&metadata.collection_id, "collection id")?;
        metadata
            .validate()
            .map_err(|msg| StoreError::new(StoreErrorKind::Invalid).with_message(msg))?;

        if let Some(existing) = self.locate(&metadata.workflow, &metadata.collection_id)? {
            return Err(StoreError::new(StoreErrorKind::AlreadyExists)
                .with_backend(BACKEND)
                .with_path(existing));
        }

        let dir = self.collection_dir(
            &metadata.workflow,
            &metadata.status,
            &metadata.collection_id,
        );
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(e, parent))?;
        }
        fs::create_dir(&dir).map_err(|e| io_error(e, &dir))?;
        Self::write_metadata(&dir, &metadata)?;

        tracing::info!(
            collection = %metadata.collection_id,
            path = %dir.display(),
            "created collection"
        );

        Self::load(&metadata.workflow, &dir)
    }

    fn relocate(&self, collection: &mut Collection, status: &str) -> Result<(), StoreError> {
        Self::validate_segment(status, "stage name")?;

        let target = self.collection_dir(collection.workflow(), status, collection.id());
        if target == collection.path {
            return Ok(());
        }
        if target.exists() {
            return Err(StoreError::new(StoreErrorKind::AlreadyExists)
                .with_backend(BACKEND)
                .with_path(target));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(e, parent))?;
        }
        fs::rename(&collection.path, &target).map_err(|e| io_error(e, &collection.path))?;

        tracing::info!(
            collection = collection.id(),
            from = %collection.path.display(),
            to = %target.display(),
            "moved collection"
        );

        collection.path = target;
        self.refresh_artifacts(collection)
    }

    fn refresh_artifacts(&self, collection: &mut Collection) -> Result<(), StoreError> {
        collection.artifacts = Self::list_artifacts(&collection.path)?;
        Ok(())
    }

    fn begin_transition(&self, pending: &PendingTransition) -> Result<(), StoreError> {
        let path = self.journal_path(&pending.workflow, &pending.collection_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(e, parent))?;
        }
        let json = serde_json::to_vec_pretty(pending).map_err(|e| {
            StoreError::new(StoreErrorKind::Other)
                .with_backend(BACKEND)
                .with_path(&path)
                .with_source(e)
        })?;
        fs::write(&path, json).map_err(|e| io_error(e, &path))
    }

    fn end_transition(&self, workflow: &str, id: &str) -> Result<(), StoreError> {
        let path = self.journal_path(workflow, id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(e, &path)),
        }
        // Only succeeds once the journal is empty
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    fn pending_transitions(&self, workflow: &str) -> Result<Vec<PendingTransition>, StoreError> {
        let dir = self.workflow_dir(workflow).join(JOURNAL_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(e, &dir)),
        };

        let mut pending = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<PendingTransition>(&bytes).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(record) => pending.push(record),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "ignoring unreadable transition record");
                }
            }
        }
        pending.sort_by(|a, b| a.collection_id.cmp(&b.collection_id));
        Ok(pending)
    }
}
