//! Diagram-as-code processor.
//!
//! This module provides [`DiagramProcessor`], which renders tagged diagram
//! fences with a local CLI tool and replaces each fence with an image
//! reference.
//!
//! For a block named `flow` in a `graphviz` fence, one run produces:
//!
//! ```text
//! <collection>/intermediate/graphviz/flow.dot   # prepared source, retained
//! <collection>/assets/flow.png                  # rendered image
//! ```
//!
//! and rewrites the fence to `![flow](assets/flow.png)`. When rendering
//! fails, the fence is kept and preceded by an HTML comment giving the
//! reason.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::block::{ProcessorBlock, detect_fenced_blocks, has_fence};
use crate::consts::{DEFAULT_DPI, DEFAULT_TIMEOUT};
use crate::context::{Artifact, ArtifactKind, ProcessingContext, ProcessingResult};
use crate::error::ProcessorError;
use crate::language::{DiagramFormat, DiagramLanguage, GRAPHVIZ_LAYOUTS};
use crate::plantuml::prepare_diagram_source;
use crate::processor::Processor;
use crate::regen::{MtimePolicy, RegenerationPolicy};
use crate::runner::{CommandRunner, CommandSpec};
use crate::splice::Splice;

/// Renders one diagram language through an external tool.
///
/// # Configuration
///
/// Create the processor for a language, then configure using builder methods:
/// - [`binary`](Self::binary): renderer executable (default per language)
/// - [`include_dirs`](Self::include_dirs): extra `PlantUML` `!include` directories
/// - [`dpi`](Self::dpi): DPI for raster output (default: 192)
/// - [`timeout`](Self::timeout): per-invocation timeout (default: 30 seconds)
/// - [`policy`](Self::policy): staleness check (default: [`MtimePolicy`])
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use docket_processors::{DiagramProcessor, SystemCommandRunner};
///
/// let processor = DiagramProcessor::graphviz(Arc::new(SystemCommandRunner))
///     .binary("/opt/graphviz/bin/dot")
///     .dpi(96);
/// ```
pub struct DiagramProcessor {
    language: DiagramLanguage,
    binary: String,
    runner: Arc<dyn CommandRunner>,
    policy: Arc<dyn RegenerationPolicy>,
    include_dirs: Vec<PathBuf>,
    dpi: u32,
    timeout: Duration,
}

impl std::fmt::Debug for DiagramProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramProcessor")
            .field("language", &self.language)
            .field("binary", &self.binary)
            .field("policy", &self.policy)
            .field("dpi", &self.dpi)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// What happened to one block.
enum BlockOutcome {
    Rendered { intermediate: Artifact, asset: Artifact },
    Failed(String),
}

impl DiagramProcessor {
    /// Create a processor for `language` using its default binary.
    #[must_use]
    pub fn new(language: DiagramLanguage, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            language,
            binary: language.default_binary().to_owned(),
            runner,
            policy: Arc::new(MtimePolicy),
            include_dirs: Vec::new(),
            dpi: DEFAULT_DPI,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Graphviz (`dot`) processor for `graphviz` fences.
    #[must_use]
    pub fn graphviz(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(DiagramLanguage::Graphviz, runner)
    }

    /// `PlantUML` processor for `plantuml` fences.
    #[must_use]
    pub fn plantuml(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(DiagramLanguage::PlantUml, runner)
    }

    /// Mermaid CLI (`mmdc`) processor for `mermaid` fences.
    #[must_use]
    pub fn mermaid(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(DiagramLanguage::Mermaid, runner)
    }

    /// Set the renderer executable.
    #[must_use]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set directories searched for `PlantUML` `!include` files.
    ///
    /// The collection directory is always searched first.
    #[must_use]
    pub fn include_dirs(mut self, dirs: &[PathBuf]) -> Self {
        self.include_dirs = dirs.to_vec();
        self
    }

    /// Set DPI for raster output.
    #[must_use]
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set the timeout for each renderer invocation.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the staleness check deciding whether to re-render.
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn RegenerationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn language(&self) -> DiagramLanguage {
        self.language
    }

    /// Source handed to the renderer.
    fn prepare_source(
        &self,
        block: &ProcessorBlock,
        ctx: &ProcessingContext,
        warnings: &mut Vec<String>,
    ) -> String {
        if self.language != DiagramLanguage::PlantUml {
            return block.content.clone();
        }

        let mut search_dirs = Vec::with_capacity(self.include_dirs.len() + 1);
        search_dirs.push(ctx.collection_path.clone());
        search_dirs.extend(self.include_dirs.iter().cloned());

        let prepared = prepare_diagram_source(&block.content, &search_dirs, self.dpi);
        warnings.extend(
            prepared
                .warnings
                .into_iter()
                .map(|w| format!("plantuml diagram '{}': {w}", block.name)),
        );
        prepared.source
    }

    /// Build the renderer invocation for one block.
    fn command(
        &self,
        block: &ProcessorBlock,
        input: &Path,
        asset: &Path,
        format: DiagramFormat,
        ctx: &ProcessingContext,
        warnings: &mut Vec<String>,
    ) -> CommandSpec {
        let spec =
            CommandSpec::new(&self.binary, self.timeout).working_dir(&ctx.collection_path);

        match self.language {
            DiagramLanguage::Graphviz => {
                let layout = match block.param("layout") {
                    None => "dot",
                    Some(layout) if GRAPHVIZ_LAYOUTS.contains(&layout) => layout,
                    Some(other) => {
                        warnings.push(format!(
                            "graphviz diagram '{}': unknown layout '{other}', using 'dot' (valid: {})",
                            block.name,
                            GRAPHVIZ_LAYOUTS.join(", ")
                        ));
                        "dot"
                    }
                };
                let mut spec = spec
                    .arg(format!("-T{}", format.as_str()))
                    .arg(format!("-K{layout}"));
                if format == DiagramFormat::Png {
                    spec = spec.arg(format!("-Gdpi={}", self.dpi));
                }
                spec.arg("-o")
                    .arg(asset.display().to_string())
                    .arg(input.display().to_string())
            }
            DiagramLanguage::PlantUml => spec
                .arg(format!("-t{}", format.as_str()))
                .arg("-charset")
                .arg("UTF-8")
                .arg("-pipe"),
            DiagramLanguage::Mermaid => {
                let mut spec = spec
                    .arg("-i")
                    .arg(input.display().to_string())
                    .arg("-o")
                    .arg(asset.display().to_string());
                if let Some(theme) = block.param("theme") {
                    spec = spec.arg("-t").arg(theme);
                }
                if let Some(background) = block.param("background") {
                    spec = spec.arg("-b").arg(background);
                }
                spec
            }
        }
    }

    /// Warn about parameters the language does not understand.
    fn check_params(&self, block: &ProcessorBlock, warnings: &mut Vec<String>) {
        let known = self.language.known_params();
        for key in block.metadata.keys() {
            if !known.contains(&key.as_str()) {
                let valid = if known.is_empty() {
                    "none".to_owned()
                } else {
                    known.join(", ")
                };
                warnings.push(format!(
                    "{} diagram '{}': unknown parameter '{key}' ignored (valid: {valid})",
                    self.language.tag(),
                    block.name
                ));
            }
        }
    }

    fn render_block(
        &self,
        block: &ProcessorBlock,
        ctx: &ProcessingContext,
        intermediate_dir: &Path,
        format: DiagramFormat,
        warnings: &mut Vec<String>,
    ) -> Result<BlockOutcome, ProcessorError> {
        self.check_params(block, warnings);

        let source = self.prepare_source(block, ctx, warnings);
        let input = intermediate_dir.join(format!(
            "{}.{}",
            block.name,
            self.language.source_extension()
        ));
        write_if_changed(&input, &source)?;

        let asset = ctx
            .assets_dir
            .join(format!("{}.{}", block.name, format.as_str()));

        if self.policy.needs_regeneration(&asset, &input) {
            let mut spec = self.command(block, &input, &asset, format, ctx, warnings);
            if self.language.renders_to_stdout() {
                spec = spec.stdin(source.as_bytes());
            }
            if let Err(reason) = self.run_renderer(&spec, &asset) {
                // A stale image must not look fresh on the next run
                let _ = fs::remove_file(&asset);
                return Ok(BlockOutcome::Failed(reason));
            }
            tracing::info!(
                processor = self.language.tag(),
                block = %block.name,
                asset = %asset.display(),
                "rendered diagram"
            );
        } else {
            tracing::debug!(
                processor = self.language.tag(),
                block = %block.name,
                "diagram up to date"
            );
        }

        Ok(BlockOutcome::Rendered {
            intermediate: Artifact::new(ctx, &block.name, input, ArtifactKind::Intermediate),
            asset: Artifact::new(ctx, &block.name, asset, ArtifactKind::Asset),
        })
    }

    /// Run the renderer and make sure `asset` exists afterwards.
    ///
    /// Returns the failure reason on error.
    fn run_renderer(&self, spec: &CommandSpec, asset: &Path) -> Result<(), String> {
        let output = self.runner.run(spec).map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(output.failure_reason(&self.binary));
        }

        if self.language.renders_to_stdout() {
            if output.stdout.is_empty() {
                return Err(format!("{} produced no output", self.binary));
            }
            fs::write(asset, &output.stdout)
                .map_err(|e| format!("cannot write {}: {e}", asset.display()))?;
        } else if !asset.exists() {
            return Err(format!("{} did not create {}", self.binary, asset.display()));
        }

        Ok(())
    }
}

impl Processor for DiagramProcessor {
    fn name(&self) -> &str {
        self.language.tag()
    }

    fn can_process(&self, content: &str) -> bool {
        has_fence(content, self.language.tag())
    }

    fn detect_blocks(&self, content: &str) -> Vec<ProcessorBlock> {
        detect_fenced_blocks(content, self.language.tag())
    }

    fn process(
        &self,
        content: &str,
        ctx: &ProcessingContext,
    ) -> Result<ProcessingResult, ProcessorError> {
        let blocks = self.detect_blocks(content);
        if blocks.is_empty() {
            return Ok(ProcessingResult::unchanged(content));
        }

        let tag = self.language.tag();
        let intermediate_dir = ctx.intermediate_dir_for(tag);
        create_dir(&intermediate_dir)?;
        create_dir(&ctx.assets_dir)?;

        let format = DiagramFormat::parse(ctx.asset_extension()).unwrap_or_default();
        let mut result = ProcessingResult::default();
        let mut splice = Splice::new(content);
        let mut seen = HashSet::new();

        for block in &blocks {
            result.blocks_processed += 1;

            let outcome = if seen.insert(block.name.as_str()) {
                self.render_block(block, ctx, &intermediate_dir, format, &mut result.warnings)?
            } else {
                BlockOutcome::Failed("duplicate block name".to_owned())
            };

            let start = stale_comment_start(content, block, tag).unwrap_or(block.start);
            match outcome {
                BlockOutcome::Rendered {
                    intermediate,
                    asset,
                } => {
                    splice.replace(
                        start..block.end,
                        format!("![{}]({})", block.name, asset.relative_path),
                    );
                    result.artifacts.push(intermediate);
                    result.artifacts.push(asset);
                }
                BlockOutcome::Failed(reason) => {
                    tracing::warn!(
                        processor = tag,
                        block = %block.name,
                        %reason,
                        "diagram not rendered"
                    );
                    result.warnings.push(format!(
                        "{tag} diagram '{}' not rendered: {reason}",
                        block.name
                    ));
                    result.blocks_failed += 1;
                    splice.replace(
                        start..block.end,
                        format!(
                            "{}\n{}",
                            failure_comment(tag, &block.name, &reason),
                            block.source(content)
                        ),
                    );
                }
            }
        }

        result.processed_content = splice.apply();
        Ok(result)
    }
}

fn create_dir(path: &Path) -> Result<(), ProcessorError> {
    fs::create_dir_all(path).map_err(|source| ProcessorError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `content` unless the file already holds exactly that.
///
/// Leaves the mtime alone for unchanged sources.
fn write_if_changed(path: &Path, content: &str) -> Result<(), ProcessorError> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == content) {
        return Ok(());
    }
    fs::write(path, content).map_err(|source| ProcessorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn comment_prefix(tag: &str, name: &str) -> String {
    format!("<!-- {tag} diagram '{name}' not rendered:")
}

/// HTML comment explaining why a block was not rendered.
fn failure_comment(tag: &str, name: &str, reason: &str) -> String {
    // Comments cannot contain "--" or span the reason across lines
    let mut reason = reason.replace(['\n', '\r'], " ");
    while reason.contains("--") {
        reason = reason.replace("--", "-");
    }
    format!("{} {} -->", comment_prefix(tag, name), reason.trim())
}

/// Start of a failure comment for `block` on the line right above it.
fn stale_comment_start(content: &str, block: &ProcessorBlock, tag: &str) -> Option<usize> {
    let before = content[..block.start].strip_suffix('\n')?;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line = &before[line_start..];

    (line.starts_with(&comment_prefix(tag, &block.name)) && line.trim_end().ends_with("-->"))
        .then_some(line_start)
}
