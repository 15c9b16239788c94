//! CLI error types.

use docket_config::ConfigError;
use docket_engine::EngineError;
use docket_processors::ProcessorError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Pipeline(#[from] ProcessorError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Validation(String),
}
