//! Store trait, collection type and error types.
//!
//! Provides the [`CollectionStore`] trait for abstracting where collections
//! live, along with [`StoreError`] for unified error handling across backends.
//!
//! # Logical vs physical state
//!
//! The logical stage of a collection is `metadata.status`. Backends decide how
//! that is laid out physically (the filesystem backend encodes it as a path
//! segment). Only the status state machine calls [`CollectionStore::relocate`]
//! and the transition journal methods.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::CollectionMetadata;

/// Metadata file name inside every collection directory.
pub const METADATA_FILE: &str = "collection.yml";

/// A collection: metadata, on-disk location and artifact names.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Metadata as last read or mutated in memory.
    pub metadata: CollectionMetadata,
    /// Non-hidden file names in the collection directory, sorted.
    ///
    /// Recomputed on every read; stale after any mutation until refreshed.
    pub artifacts: Vec<String>,
    /// Current collection directory.
    pub path: PathBuf,
}

impl Collection {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.collection_id
    }

    #[must_use]
    pub fn workflow(&self) -> &str {
        &self.metadata.workflow
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.metadata.status
    }

    /// Path of `collection.yml`.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    /// Status encoded in the directory layout (the parent directory name).
    ///
    /// Differs from [`status`](Self::status) only after an interrupted transition.
    #[must_use]
    pub fn location_status(&self) -> Option<&str> {
        self.path.parent()?.file_name()?.to_str()
    }

    /// Markdown artifacts, in name order.
    pub fn markdown_files(&self) -> impl Iterator<Item = &str> {
        self.artifacts
            .iter()
            .map(String::as_str)
            .filter(|name| Path::new(name).extension().is_some_and(|e| e == "md"))
    }
}

/// A stage change that has been started but not yet confirmed complete.
///
/// Written before the physical move and removed after metadata is persisted,
/// so an interruption between the two steps can be detected and repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub collection_id: String,
    pub workflow: String,
    pub from: String,
    pub to: String,
    pub date: DateTime<Utc>,
}

/// Semantic error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// Workflow or collection does not exist.
    NotFound,
    /// Metadata exists but is malformed or inconsistent.
    Invalid,
    /// Collection already exists (for create and move operations).
    AlreadyExists,
    /// Invalid path or identifier.
    InvalidPath,
    /// Other/unknown error category.
    Other,
}

/// Store error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StoreError {
    /// Semantic error category.
    pub kind: StoreErrorKind,
    /// Path context (if applicable).
    pub path: Option<PathBuf>,
    /// Backend identifier (e.g., "Fs", "Mock").
    pub backend: Option<&'static str>,
    /// Human-readable detail.
    pub message: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    /// Create a new store error.
    #[must_use]
    pub fn new(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            path: None,
            backend: None,
            message: None,
            source: None,
        }
    }

    /// Attach path context.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error with path.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreErrorKind::NotFound).with_path(path)
    }

    /// Create an invalid-metadata error with path and message.
    #[must_use]
    pub fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Invalid)
            .with_path(path)
            .with_message(message)
    }

    /// Create a store error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, path: Option<PathBuf>) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StoreErrorKind::NotFound,
            std::io::ErrorKind::AlreadyExists => StoreErrorKind::AlreadyExists,
            _ => StoreErrorKind::Other,
        };
        let mut error = Self::new(kind).with_source(err);
        if let Some(p) = path {
            error = error.with_path(p);
        }
        error
    }

    /// Whether this error means "absent" rather than "broken".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message: source (path: /foo/bar)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StoreErrorKind::NotFound => "Not found",
            StoreErrorKind::Invalid => "Invalid metadata",
            StoreErrorKind::AlreadyExists => "Already exists",
            StoreErrorKind::InvalidPath => "Invalid path",
            StoreErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }

        Ok(())
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Storage abstraction for collections.
///
/// Provides a unified interface for reading and writing collections regardless
/// of backend. Implementations own the physical layout; callers only deal in
/// workflow names, collection ids and stage names.
pub trait CollectionStore: Send + Sync {
    /// Load a collection, discovering which stage it currently occupies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreErrorKind::NotFound`] if no stage holds `id`, and
    /// [`StoreErrorKind::Invalid`] if its metadata is malformed.
    fn get(&self, workflow: &str, id: &str) -> Result<Collection, StoreError>;

    /// Load every collection of a workflow, in unspecified order.
    ///
    /// Collections with malformed metadata are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the workflow's collections cannot be enumerated.
    fn list(&self, workflow: &str) -> Result<Vec<Collection>, StoreError>;

    /// Overwrite the metadata at the collection's current location.
    ///
    /// Never moves the collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the metadata cannot be written.
    fn persist(&self, collection: &Collection) -> Result<(), StoreError>;

    /// Create a new collection in the stage named by `metadata.status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreErrorKind::AlreadyExists`] if any stage already holds
    /// the id, or [`StoreErrorKind::InvalidPath`] for unusable ids.
    fn create(&self, metadata: CollectionMetadata) -> Result<Collection, StoreError>;

    /// Move the collection so its physical location encodes `status`.
    ///
    /// Does not touch metadata. A no-op when the collection already sits
    /// under `status`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the move fails.
    fn relocate(&self, collection: &mut Collection, status: &str) -> Result<(), StoreError>;

    /// Recompute `collection.artifacts` from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the collection cannot be enumerated.
    fn refresh_artifacts(&self, collection: &mut Collection) -> Result<(), StoreError>;

    /// Record that a transition is about to start.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be written.
    fn begin_transition(&self, pending: &PendingTransition) -> Result<(), StoreError>;

    /// Clear the record written by [`begin_transition`](Self::begin_transition).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be removed.
    fn end_transition(&self, workflow: &str, id: &str) -> Result<(), StoreError>;

    /// Transitions begun but never ended, for recovery.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the records cannot be read.
    fn pending_transitions(&self, workflow: &str) -> Result<Vec<PendingTransition>, StoreError>;
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::TimeZone;

    use super::*;

    fn collection(path: &str) -> Collection {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        Collection {
            metadata: CollectionMetadata::new("job", "acme", "active", at),
            artifacts: vec![
                "cover_letter.md".to_owned(),
                "job.pdf".to_owned(),
                "resume.md".to_owned(),
            ],
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_collection_accessors() {
        let c = collection("/c/job/active/acme");

        assert_eq!(c.id(), "acme");
        assert_eq!(c.workflow(), "job");
        assert_eq!(c.status(), "active");
        assert_eq!(
            c.metadata_path(),
            PathBuf::from("/c/job/active/acme/collection.yml")
        );
        assert_eq!(c.location_status(), Some("active"));
    }

    #[test]
    fn test_location_status_after_interrupted_move() {
        let c = collection("/c/job/submitted/acme");
        assert_eq!(c.status(), "active");
        assert_eq!(c.location_status(), Some("submitted"));
    }

    #[test]
    fn test_markdown_files() {
        let c = collection("/c/job/active/acme");
        assert_eq!(
            c.markdown_files().collect::<Vec<_>>(),
            vec!["cover_letter.md", "resume.md"]
        );
    }

    #[test]
    fn test_store_error_display_simple() {
        let err = StoreError::new(StoreErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found");
    }

    #[test]
    fn test_store_error_display_full() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StoreError::new(StoreErrorKind::NotFound)
            .with_backend("Fs")
            .with_path("/foo/bar")
            .with_source(io_err);

        assert_eq!(
            err.to_string(),
            "[Fs] Not found: file not found (path: /foo/bar)"
        );
    }

    #[test]
    fn test_store_error_invalid() {
        let err = StoreError::invalid("/c/job/active/acme/collection.yml", "bad yaml");

        assert_eq!(err.kind, StoreErrorKind::Invalid);
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Invalid metadata: bad yaml (path: /c/job/active/acme/collection.yml)"
        );
    }

    #[test]
    fn test_store_error_io_kinds() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StoreError::io(not_found, Some(PathBuf::from("/x")));
        assert!(err.is_not_found());
        assert_eq!(err.path.as_deref(), Some(Path::new("/x")));
        assert!(err.downcast_source::<std::io::Error>().is_some());

        let exists = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "there");
        assert_eq!(
            StoreError::io(exists, None).kind,
            StoreErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_store_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
