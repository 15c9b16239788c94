//! Workflow and collection lookups shared by engine components.

use docket_config::{WorkflowDefinition, Workflows};
use docket_store::{Collection, CollectionStore, StoreErrorKind};

use crate::error::EngineError;

pub(crate) fn find_workflow<'a>(
    workflows: &'a Workflows,
    name: &str,
) -> Result<&'a WorkflowDefinition, EngineError> {
    workflows
        .get(name)
        .ok_or_else(|| EngineError::WorkflowNotFound(name.to_owned()))
}

/// Load a collection, reporting absence as [`EngineError::CollectionNotFound`].
pub(crate) fn load_collection(
    store: &dyn CollectionStore,
    workflow: &str,
    id: &str,
) -> Result<Collection, EngineError> {
    store.get(workflow, id).map_err(|err| match err.kind {
        StoreErrorKind::NotFound => EngineError::CollectionNotFound {
            workflow: workflow.to_owned(),
            id: id.to_owned(),
        },
        _ => err.into(),
    })
}
