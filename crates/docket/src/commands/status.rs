//! `docket status` and `docket recover` command implementations.

use clap::Args;
use docket_engine::Recovery;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the status command.
#[derive(Args)]
pub(crate) struct StatusArgs {
    /// Workflow name.
    workflow: String,

    /// Collection identifier.
    id: String,

    /// Target stage.
    stage: String,
}

impl StatusArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, engine) = global.engine()?;

        let before = engine.collection(&self.workflow, &self.id)?;
        let from = before.status().to_owned();
        let collection = engine
            .status()
            .transition(&self.workflow, &self.id, &self.stage)?;

        if from == collection.status() {
            output.info(&format!("{} is already '{from}'", self.id));
        } else {
            output.success(&format!(
                "{}: {from} -> {}",
                self.id,
                collection.status()
            ));
            output.detail(&format!("Moved to {}", collection.path.display()));
        }
        Ok(())
    }
}

/// Arguments for the recover command.
#[derive(Args)]
pub(crate) struct RecoverArgs {
    /// Workflow name.
    workflow: String,
}

impl RecoverArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, engine) = global.engine()?;

        let report = engine.status().recover(&self.workflow)?;
        if report.is_empty() {
            output.info("No interrupted transitions");
            return Ok(());
        }

        for recovery in &report {
            match recovery {
                Recovery::RolledBack { id, status } => {
                    output.success(&format!("{id}: rolled back, still '{status}'"));
                }
                Recovery::Completed { id, status } => {
                    output.success(&format!("{id}: completed move to '{status}'"));
                }
                Recovery::Cleared { id } => {
                    output.detail(&format!("{id}: already complete"));
                }
                Recovery::Orphaned { id } => {
                    output.warning(&format!("{id}: collection no longer exists"));
                }
                Recovery::Unresolved { id, reason } => {
                    output.error(&format!("{id}: {reason}"));
                }
            }
        }
        Ok(())
    }
}
