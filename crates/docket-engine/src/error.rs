//! Engine error type.

use std::path::PathBuf;

use docket_processors::{ProcessorError, RegistryError};
use docket_store::{StoreError, StoreErrorKind};

/// Errors from lifecycle operations and actions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Workflow is not defined in the configuration.
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),
    /// Workflow declares no stages, so collections cannot be created.
    #[error("workflow '{0}' declares no stages")]
    EmptyWorkflow(String),
    /// No stage of the workflow holds the collection.
    #[error("collection '{id}' not found in workflow '{workflow}'")]
    CollectionNotFound { workflow: String, id: String },
    /// Another collection already uses the id.
    #[error("collection '{id}' already exists in workflow '{workflow}'")]
    CollectionExists { workflow: String, id: String },
    /// Collection id is not usable as a directory name.
    #[error("invalid collection id '{id}': {reason}")]
    InvalidCollectionId { id: String, reason: String },
    /// Extra field collides with a metadata key or is malformed.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    /// Status is not a stage of the workflow.
    #[error("unknown status '{status}' for workflow '{workflow}'")]
    UnknownStatus { workflow: String, status: String },
    /// Target stage is not reachable from the current stage.
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },
    /// Action is not declared by the workflow or not implemented.
    #[error("unknown action '{action}' for workflow '{workflow}'")]
    UnknownAction { workflow: String, action: String },
    /// Required action parameter was not supplied.
    #[error("action '{action}' requires parameter '{param}'")]
    MissingParameter { action: String, param: &'static str },
    /// Action parameter has an unusable value.
    #[error("action '{action}': invalid {param}: {reason}")]
    InvalidParameter {
        action: String,
        param: &'static str,
        reason: String,
    },
    /// Collection has no markdown document to work on.
    #[error("collection '{0}' has no markdown documents")]
    NoDocuments(String),
    /// Named file is not part of the collection.
    #[error("file '{file}' not found in collection '{id}'")]
    FileNotFound { id: String, file: String },
    /// Refusing to overwrite an existing file.
    #[error("{} already exists", .0.display())]
    FileExists(PathBuf),
    /// Template is not declared or its file is missing.
    #[error("template '{0}' not found")]
    TemplateNotFound(String),
    /// Template failed to render.
    #[error("template '{name}': {message}")]
    Template { name: String, message: String },
    /// Document conversion failed.
    #[error("cannot format {}: {message}", path.display())]
    Format { path: PathBuf, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pipeline(#[from] ProcessorError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error means something the caller named does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::WorkflowNotFound(_)
            | Self::CollectionNotFound { .. }
            | Self::FileNotFound { .. }
            | Self::TemplateNotFound(_) => true,
            Self::Store(err) => err.kind == StoreErrorKind::NotFound,
            _ => false,
        }
    }
}
