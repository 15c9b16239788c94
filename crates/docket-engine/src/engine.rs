//! Wiring of all engine services from one configuration.

use std::sync::Arc;

use docket_config::{Config, WorkflowDefinition, Workflows};
use docket_processors::{CommandRunner, ProcessorRegistry};
use docket_store::{Collection, CollectionStore};

use crate::actions::ActionDispatcher;
use crate::create::CollectionCreator;
use crate::error::EngineError;
use crate::format::PandocFormatter;
use crate::lookup::{find_workflow, load_collection};
use crate::pipeline::build_registry;
use crate::status::StatusStateMachine;
use crate::template::{MiniJinjaRenderer, TemplateLibrary};

/// Engine services sharing one store, workflow set and processor registry.
pub struct Engine {
    store: Arc<dyn CollectionStore>,
    workflows: Arc<Workflows>,
    registry: Arc<ProcessorRegistry>,
    status: StatusStateMachine,
    actions: ActionDispatcher,
    creator: CollectionCreator,
}

impl Engine {
    /// Build the engine described by `config`.
    ///
    /// `runner` executes every external tool (diagram renderers and pandoc).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Registry`] if the processor order names an
    /// unknown processor.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CollectionStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, EngineError> {
        let workflows = Arc::new(config.workflows.clone());
        let registry = Arc::new(build_registry(&config.processors_resolved, &runner)?);
        let templates = TemplateLibrary::new(
            &config.project_resolved.templates_dir,
            Arc::new(MiniJinjaRenderer::new()),
        );
        let formatter = PandocFormatter::new(runner, &config.formatter.pandoc)
            .reference_doc(config.formatter.reference_doc.clone());

        let status = StatusStateMachine::new(Arc::clone(&store), Arc::clone(&workflows));
        let actions = ActionDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&workflows),
            templates.clone(),
            Arc::clone(&registry),
            Arc::new(formatter),
        )
        .default_format(&config.formatter.default_format);
        let creator = CollectionCreator::new(Arc::clone(&store), Arc::clone(&workflows), templates);

        Ok(Self {
            store,
            workflows,
            registry,
            status,
            actions,
            creator,
        })
    }

    #[must_use]
    pub fn store(&self) -> &dyn CollectionStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn status(&self) -> &StatusStateMachine {
        &self.status
    }

    #[must_use]
    pub fn actions(&self) -> &ActionDispatcher {
        &self.actions
    }

    #[must_use]
    pub fn creator(&self) -> &CollectionCreator {
        &self.creator
    }

    /// Look up a workflow definition.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkflowNotFound`] for undeclared workflows.
    pub fn workflow(&self, name: &str) -> Result<&WorkflowDefinition, EngineError> {
        find_workflow(&self.workflows, name)
    }

    /// Load collection `id` of `workflow`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkflowNotFound`],
    /// [`EngineError::CollectionNotFound`] or store errors.
    pub fn collection(&self, workflow: &str, id: &str) -> Result<Collection, EngineError> {
        find_workflow(&self.workflows, workflow)?;
        load_collection(self.store.as_ref(), workflow, id)
    }

    /// All readable collections of `workflow`, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkflowNotFound`] or store errors.
    pub fn list(&self, workflow: &str) -> Result<Vec<Collection>, EngineError> {
        find_workflow(&self.workflows, workflow)?;
        let mut collections = self.store.list(workflow)?;
        collections.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(collections)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    use docket_processors::MockCommandRunner;
    use docket_store::FsCollectionStore;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actions::ActionParams;

    const CONFIG: &str = r#"
[project]
collections_dir = "collections"

[processors]
order = ["emoji", "graphviz"]

[processors.plantuml]
enabled = false

[workflows.job]
description = "Job applications"

[[workflows.job.stages]]
name = "active"
next = ["submitted"]

[[workflows.job.stages]]
name = "submitted"
next = ["rejected"]

[[workflows.job.stages]]
name = "rejected"
terminal = true

[[workflows.job.actions]]
name = "format"

[[workflows.job.templates]]
name = "resume"
file = "resume.md"
"#;

    fn engine(root: &Path) -> (Engine, Arc<MockCommandRunner>) {
        let config = Config::from_toml_str(CONFIG, root).unwrap();
        fs::create_dir_all(&config.project_resolved.templates_dir).unwrap();
        fs::write(
            config.project_resolved.templates_dir.join("resume.md"),
            "# {{ collection_id }} :rocket:\n",
        )
        .unwrap();

        let store = Arc::new(FsCollectionStore::new(
            config.project_resolved.collections_dir.clone(),
        ));
        let runner = Arc::new(MockCommandRunner::succeeding());
        let engine = Engine::from_config(&config, store, Arc::clone(&runner) as _).unwrap();
        (engine, runner)
    }

    #[test]
    fn test_registry_follows_config() {
        let temp = tempfile::tempdir().unwrap();
        let (engine, _runner) = engine(temp.path());

        assert_eq!(engine.registry().order_names(), vec!["emoji", "graphviz"]);
    }

    #[test]
    fn test_lifecycle_end_to_end() {
        let temp = tempfile::tempdir().unwrap();
        let (engine, runner) = engine(temp.path());

        engine
            .creator()
            .create("job", "acme", &BTreeMap::new())
            .unwrap();
        let moved = engine.status().transition("job", "acme", "submitted").unwrap();
        assert!(moved.path.ends_with("job/submitted/acme"));

        let mut collection = engine.collection("job", "acme").unwrap();
        let outcome = engine
            .actions()
            .execute("job", &mut collection, "format", &ActionParams::new())
            .unwrap();

        assert_eq!(outcome.files, vec![collection.path.join("resume.docx")]);
        assert_eq!(
            fs::read_to_string(collection.path.join("intermediate/resume.processed.md")).unwrap(),
            "# acme 🚀\n"
        );
        assert_eq!(runner.calls()[0].program, "pandoc");
    }

    #[test]
    fn test_list_sorted_and_unknown_workflow() {
        let temp = tempfile::tempdir().unwrap();
        let (engine, _runner) = engine(temp.path());
        for id in ["zeta", "alpha"] {
            engine.creator().create("job", id, &BTreeMap::new()).unwrap();
        }

        let ids: Vec<String> = engine
            .list("job")
            .unwrap()
            .iter()
            .map(|c| c.id().to_owned())
            .collect();

        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert!(matches!(
            engine.list("blog"),
            Err(EngineError::WorkflowNotFound(_))
        ));
    }
}
