//! `docket new`, `docket list` and `docket show` command implementations.

use clap::Args;
use docket_engine::{Engine, EngineError};
use docket_store::Collection;

use super::{GlobalArgs, into_map, parse_key_value};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the new command.
#[derive(Args)]
pub(crate) struct NewArgs {
    /// Workflow name.
    workflow: String,

    /// Collection identifier (directory name).
    id: String,

    /// Extra metadata field, available to templates.
    #[arg(short, long = "field", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    fields: Vec<(String, String)>,
}

impl NewArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, engine) = global.engine()?;
        let fields = into_map(self.fields, "field")?;

        let collection = engine.creator().create(&self.workflow, &self.id, &fields)?;

        output.success(&format!(
            "Created {}/{} in '{}'",
            self.workflow,
            collection.id(),
            collection.status()
        ));
        output.info(&format!("Path: {}", collection.path.display()));
        for artifact in &collection.artifacts {
            output.detail(&format!("  {artifact}"));
        }
        Ok(())
    }
}

/// Arguments for the list command.
#[derive(Args)]
pub(crate) struct ListArgs {
    /// Workflow name.
    workflow: String,

    /// Only show collections in this stage.
    #[arg(short, long)]
    status: Option<String>,
}

impl ListArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, engine) = global.engine()?;
        let definition = engine.workflow(&self.workflow)?;
        if !definition.description.is_empty() {
            output.heading(&definition.description);
        }

        let collections: Vec<Collection> = engine
            .list(&self.workflow)?
            .into_iter()
            .filter(|c| self.status.as_deref().is_none_or(|s| c.status() == s))
            .collect();

        if collections.is_empty() {
            output.info(&format!("No collections in workflow '{}'", self.workflow));
            return Ok(());
        }

        let width = collections.iter().map(|c| c.id().len()).max().unwrap_or(0);
        for collection in &collections {
            output.info(&format!(
                "{:width$}  {:12}  {}",
                collection.id(),
                collection.status(),
                collection.metadata.date_modified.format("%Y-%m-%d %H:%M"),
            ));
        }
        output.detail(&format!("{} collection(s)", collections.len()));
        Ok(())
    }
}

/// Arguments for the show command.
#[derive(Args)]
pub(crate) struct ShowArgs {
    /// Workflow name.
    workflow: String,

    /// Collection identifier.
    id: String,
}

impl ShowArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, engine) = global.engine()?;
        let collection = engine.collection(&self.workflow, &self.id)?;

        print_collection(&output, &engine, &collection)
    }
}

fn print_collection(
    output: &Output,
    engine: &Engine,
    collection: &Collection,
) -> Result<(), CliError> {
    let metadata = &collection.metadata;
    output.heading(&format!("{}/{}", metadata.workflow, metadata.collection_id));
    output.info(&format!("Status:   {}", metadata.status));
    output.info(&format!("Path:     {}", collection.path.display()));
    output.info(&format!("Created:  {}", metadata.date_created.to_rfc3339()));
    output.info(&format!("Modified: {}", metadata.date_modified.to_rfc3339()));

    if !metadata.fields.is_empty() {
        output.info("\nFields:");
        for (key, value) in &metadata.fields {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim_end().to_owned())
                    .unwrap_or_default(),
            };
            output.info(&format!("  {key}: {value}"));
        }
    }

    output.info("\nHistory:");
    for entry in &metadata.status_history {
        output.info(&format!(
            "  {}  {}",
            entry.date.format("%Y-%m-%d %H:%M"),
            entry.status
        ));
    }

    if !collection.artifacts.is_empty() {
        output.info("\nFiles:");
        for artifact in &collection.artifacts {
            output.info(&format!("  {artifact}"));
        }
    }

    match engine
        .status()
        .next_stages(&metadata.workflow, &metadata.status)
    {
        Ok(next) if next.is_empty() => output.detail("\nNo further stages"),
        Ok(next) => output.detail(&format!("\nNext stages: {}", next.join(", "))),
        Err(EngineError::UnknownStatus { .. }) => output.warning(&format!(
            "\nStatus '{}' is not declared by workflow '{}'",
            metadata.status, metadata.workflow
        )),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
