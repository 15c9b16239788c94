//! Collection lifecycle and actions for docket.
//!
//! Ties the store, workflow definitions and the processor pipeline
//! together:
//!
//! - [`StatusStateMachine`]: validated stage transitions that move the
//!   collection directory, append status history and can recover from an
//!   interrupted move
//! - [`ActionDispatcher`]: workflow actions (`format`, `notes`, `add`)
//! - [`CollectionCreator`]: new collections rendered from templates
//! - [`Engine`]: all of the above built from one [`docket_config::Config`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docket_config::Config;
//! use docket_engine::Engine;
//! use docket_processors::SystemCommandRunner;
//! use docket_store::FsCollectionStore;
//!
//! let config = Config::load(None, None)?;
//! let store = Arc::new(FsCollectionStore::new(config.project_resolved.collections_dir.clone()));
//! let engine = Engine::from_config(&config, store, Arc::new(SystemCommandRunner))?;
//!
//! engine.status().transition("job", "acme-backend", "submitted")?;
//! ```

mod actions;
mod create;
mod engine;
mod error;
mod format;
mod lookup;
mod pipeline;
mod status;
mod template;

pub use actions::{Action, ActionDispatcher, ActionOutcome, ActionParams};
pub use create::{CollectionCreator, validate_id};
pub use engine::Engine;
pub use error::EngineError;
pub use format::{DEFAULT_FORMAT_TIMEOUT, DocumentFormatter, FormatRequest, PandocFormatter};
pub use pipeline::build_registry;
pub use status::{Recovery, StatusStateMachine};
pub use template::{
    MiniJinjaRenderer, RenderedTemplate, TemplateLibrary, TemplateRenderer, TemplateVars,
    template_vars,
};
