//! Document conversion (markdown to docx, pdf, html, ...).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docket_processors::{CommandRunner, CommandSpec, absolute_path};

use crate::error::EngineError;

/// Default timeout for one conversion.
pub const DEFAULT_FORMAT_TIMEOUT: Duration = Duration::from_secs(120);

/// One conversion job.
#[derive(Debug, Clone, Copy)]
pub struct FormatRequest<'a> {
    /// Processed markdown.
    pub input: &'a Path,
    pub output: &'a Path,
    /// Target format name (`docx`, `pdf`, `html`, ...).
    pub format: &'a str,
    /// Directory relative image references resolve against.
    pub resource_dir: &'a Path,
}

/// Converts processed markdown into a final document.
pub trait DocumentFormatter: Send + Sync {
    /// Produce `request.output` from `request.input`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Format`] if the conversion fails.
    fn format(&self, request: &FormatRequest<'_>) -> Result<(), EngineError>;
}

/// [`DocumentFormatter`] running pandoc.
pub struct PandocFormatter {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    reference_doc: Option<PathBuf>,
    timeout: Duration,
}

impl PandocFormatter {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
            reference_doc: None,
            timeout: DEFAULT_FORMAT_TIMEOUT,
        }
    }

    /// Style docx/odt output after this reference document.
    #[must_use]
    pub fn reference_doc(mut self, path: Option<PathBuf>) -> Self {
        self.reference_doc = path;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, request: &FormatRequest<'_>) -> CommandSpec {
        let resource_dir = absolute_path(request.resource_dir);
        let mut spec = CommandSpec::new(&self.binary, self.timeout)
            .arg(absolute_path(request.input).display().to_string())
            .arg("-o")
            .arg(absolute_path(request.output).display().to_string())
            .arg("--resource-path")
            .arg(resource_dir.display().to_string());

        if let Some(reference) = &self.reference_doc
            && matches!(request.format, "docx" | "odt")
        {
            spec = spec
                .arg("--reference-doc")
                .arg(absolute_path(reference).display().to_string());
        }
        spec.working_dir(resource_dir)
    }
}

impl DocumentFormatter for PandocFormatter {
    fn format(&self, request: &FormatRequest<'_>) -> Result<(), EngineError> {
        let failed = |message: String| EngineError::Format {
            path: request.output.to_path_buf(),
            message,
        };

        let spec = self.command(request);
        let output = self.runner.run(&spec).map_err(|e| failed(e.to_string()))?;
        if !output.success() {
            return Err(failed(output.failure_reason(&self.binary)));
        }

        tracing::info!(output = %request.output.display(), "formatted document");
        Ok(())
    }
}
