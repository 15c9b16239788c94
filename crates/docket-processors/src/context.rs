//! Pipeline run context and results.

use std::path::{Path, PathBuf};

use crate::consts::{ASSETS_DIR, INTERMEDIATE_DIR};

/// Where one pipeline run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingContext {
    /// Collection directory; relative references resolve against it.
    pub collection_path: PathBuf,
    /// Directory for final generated assets.
    pub assets_dir: PathBuf,
    /// Directory for retained intermediates (one subdirectory per processor).
    pub intermediate_dir: PathBuf,
    /// Target document format (`html`, `docx`, `pdf`, ...).
    pub output_format: String,
}

impl ProcessingContext {
    /// Context with the standard `assets/` and `intermediate/` layout.
    #[must_use]
    pub fn new(collection_path: impl Into<PathBuf>, output_format: impl Into<String>) -> Self {
        let collection_path = absolute_path(&collection_path.into());
        Self {
            assets_dir: collection_path.join(ASSETS_DIR),
            intermediate_dir: collection_path.join(INTERMEDIATE_DIR),
            collection_path,
            output_format: output_format.into(),
        }
    }

    /// Intermediate directory for one processor.
    #[must_use]
    pub fn intermediate_dir_for(&self, processor: &str) -> PathBuf {
        self.intermediate_dir.join(processor)
    }

    /// Image format for diagram assets: vector for HTML, raster otherwise.
    #[must_use]
    pub fn asset_extension(&self) -> &'static str {
        if self.output_format.eq_ignore_ascii_case("html") {
            "svg"
        } else {
            "png"
        }
    }

    /// Path as referenced from a document in the collection directory.
    ///
    /// Falls back to the absolute path when `path` is outside the collection.
    #[must_use]
    pub fn relative_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.collection_path) {
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.display().to_string(),
        }
    }
}

/// `path` resolved against the current directory.
///
/// External tools run inside the collection directory, so paths passed to
/// them must not be relative to the caller's directory.
#[must_use]
pub fn absolute_path(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Role of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Final output referenced from the document.
    Asset,
    /// Derived source retained for debugging.
    Intermediate,
}

/// A file produced during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Block name the file was generated for.
    pub name: String,
    /// Absolute location.
    pub path: PathBuf,
    /// Location as referenced from the rewritten document.
    pub relative_path: String,
    pub kind: ArtifactKind,
}

impl Artifact {
    #[must_use]
    pub fn new(
        ctx: &ProcessingContext,
        name: impl Into<String>,
        path: PathBuf,
        kind: ArtifactKind,
    ) -> Self {
        Self {
            name: name.into(),
            relative_path: ctx.relative_path(&path),
            path,
            kind,
        }
    }
}

/// Outcome of running one processor or the whole chain.
///
/// Blocks that failed to render are counted in `blocks_processed` and
/// `blocks_failed`, and contribute no artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessingResult {
    /// Rewritten document.
    pub processed_content: String,
    pub artifacts: Vec<Artifact>,
    pub blocks_processed: usize,
    pub blocks_failed: usize,
    /// Human-readable diagnostics (unresolved includes, failed renders).
    pub warnings: Vec<String>,
}

impl ProcessingResult {
    /// Result that leaves `content` untouched.
    #[must_use]
    pub fn unchanged(content: &str) -> Self {
        Self {
            processed_content: content.to_owned(),
            ..Self::default()
        }
    }

    /// Whether every processed block rendered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.blocks_failed == 0
    }

    /// Artifacts of one kind.
    pub fn artifacts_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    /// Fold a later stage's result into this one.
    ///
    /// The later stage's content replaces ours; counts, artifacts and
    /// warnings accumulate.
    pub(crate) fn absorb(&mut self, later: Self) {
        self.processed_content = later.processed_content;
        self.artifacts.extend(later.artifacts);
        self.blocks_processed += later.blocks_processed;
        self.blocks_failed += later.blocks_failed;
        self.warnings.extend(later.warnings);
    }
}
