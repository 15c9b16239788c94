//! `docket process` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use docket_processors::{ArtifactKind, ProcessingContext, ProcessingResult};

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the process command.
#[derive(Args)]
pub(crate) struct ProcessArgs {
    /// Markdown file to process.
    file: PathBuf,

    /// Directory assets and intermediates are written under
    /// (default: the file's directory).
    #[arg(long)]
    collection: Option<PathBuf>,

    /// Target document format; selects svg (html) or png images.
    #[arg(long)]
    format: Option<String>,

    /// Run only these processors, in the given order.
    #[arg(short, long = "processor", value_name = "NAME")]
    processors: Vec<String>,

    /// Write the processed markdown here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ProcessArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (config, engine) = global.engine()?;

        let content = std::fs::read_to_string(&self.file)?;
        let collection = self
            .collection
            .clone()
            .unwrap_or_else(|| default_collection_dir(&self.file));
        let format = self
            .format
            .as_deref()
            .unwrap_or(config.formatter.default_format.as_str());
        let ctx = ProcessingContext::new(collection, format);

        let result = if self.processors.is_empty() {
            engine.registry().process(&content, &ctx)?
        } else {
            engine
                .registry()
                .process_content(&content, &ctx, &self.processors)?
        };

        match &self.output {
            Some(path) => {
                std::fs::write(path, &result.processed_content)?;
                output.success(&format!("Wrote {}", path.display()));
            }
            None => output.content(&result.processed_content),
        }
        print_summary(&output, &result);
        Ok(())
    }
}

fn default_collection_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_summary(output: &Output, result: &ProcessingResult) {
    for warning in &result.warnings {
        output.warning(warning);
    }
    for asset in result.artifacts_of(ArtifactKind::Asset) {
        output.detail(&format!("  {}", asset.relative_path));
    }

    let summary = format!(
        "{} block(s) processed, {} failed",
        result.blocks_processed, result.blocks_failed
    );
    if result.is_complete() {
        output.info(&summary);
    } else {
        output.warning(&summary);
    }
}
