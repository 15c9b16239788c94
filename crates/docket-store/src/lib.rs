//! Collection storage for docket.
//!
//! A collection is one instance of a workflow (one job application, one blog
//! post) stored as a directory whose path encodes the current stage:
//!
//! ```text
//! <collections_dir>/<workflow>/<status>/<collection_id>/collection.yml
//! ```
//!
//! This crate provides:
//! - [`CollectionMetadata`] and [`StatusEntry`], the `collection.yml` schema
//! - [`Collection`], metadata plus on-disk location and artifact names
//! - [`CollectionStore`] trait with `get()`, `list()`, `persist()` and the
//!   physical operations the status state machine relies on
//! - [`FsCollectionStore`] for the directory layout above
//! - [`MockCollectionStore`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use docket_store::{CollectionStore, FsCollectionStore};
//!
//! let store = FsCollectionStore::new("collections".into());
//! let collection = store.get("job", "acme-backend")?;
//! println!("{} is {}", collection.id(), collection.status());
//! ```

mod fs;
mod metadata;
#[cfg(feature = "mock")]
mod mock;
mod store;
mod yaml;

pub use fs::FsCollectionStore;
pub use metadata::{CollectionMetadata, StatusEntry, now};
#[cfg(feature = "mock")]
pub use mock::MockCollectionStore;
pub use store::{
    Collection, CollectionStore, METADATA_FILE, PendingTransition, StoreError, StoreErrorKind,
};
