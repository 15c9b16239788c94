//! `docket action` command implementation.

use clap::Args;
use docket_engine::Action;

use super::{GlobalArgs, into_map, parse_key_value};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the action command.
#[derive(Args)]
pub(crate) struct ActionArgs {
    /// Workflow name.
    workflow: String,

    /// Collection identifier.
    id: String,

    /// Action name (must be declared by the workflow).
    action: String,

    /// Action parameter, e.g. `-p format=pdf` or `-p note_type=interview`.
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

impl ActionArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, engine) = global.engine()?;
        let params = into_map(self.params, "parameter")?;

        let mut collection = engine.collection(&self.workflow, &self.id)?;
        if Action::parse(&self.action).is_some() {
            output.info(&format!("Running {} on {}...", self.action, self.id));
        }
        let outcome = engine
            .actions()
            .execute(&self.workflow, &mut collection, &self.action, &params)?;

        for message in &outcome.messages {
            output.warning(message);
        }
        for file in &outcome.files {
            output.success(&format!("Wrote {}", file.display()));
        }
        if outcome.files.is_empty() {
            output.info("Nothing written");
        }
        Ok(())
    }
}
