//! Error types for content processing.

use std::path::PathBuf;
use std::time::Duration;

/// Hard pipeline failure.
///
/// Renderer failures are not represented here: they are recovered per block
/// and reported inline in the rewritten document.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// A directory the pipeline writes into could not be created.
    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An artifact could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Pipeline referenced a processor that is not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Registry construction and ordering errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two processors were registered under the same name.
    #[error("processor '{0}' is already registered")]
    Duplicate(String),
    /// A name does not refer to a registered processor.
    #[error("unknown processor '{0}'")]
    Unknown(String),
}

/// External command failure.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Program is not installed or not on `PATH`.
    #[error("{program} not found")]
    NotFound { program: String },
    /// Program did not finish in time and was killed.
    #[error("{program} timed out after {}s", timeout.as_secs_f32())]
    Timeout { program: String, timeout: Duration },
    /// Program could not be started or its pipes failed.
    #[error("{program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
