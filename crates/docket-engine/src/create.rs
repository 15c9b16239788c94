//! Collection creation.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::Arc;

use docket_config::{TemplateKind, Workflows};
use docket_store::{Collection, CollectionMetadata, CollectionStore, StoreErrorKind, now};

use crate::error::EngineError;
use crate::lookup::find_workflow;
use crate::template::{RenderedTemplate, TemplateLibrary, template_vars};

/// Keys owned by the metadata schema; extra fields cannot use them.
const RESERVED_FIELDS: [&str; 6] = [
    "collection_id",
    "workflow",
    "status",
    "date_created",
    "date_modified",
    "status_history",
];

/// Creates collections in their workflow's initial stage.
pub struct CollectionCreator {
    store: Arc<dyn CollectionStore>,
    workflows: Arc<Workflows>,
    templates: TemplateLibrary,
}

impl CollectionCreator {
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        workflows: Arc<Workflows>,
        templates: TemplateLibrary,
    ) -> Self {
        Self {
            store,
            workflows,
            templates,
        }
    }

    /// Create collection `id` with extra metadata `fields`.
    ///
    /// Every document template of the workflow is rendered into the new
    /// collection. Templates are rendered before anything is written, so a
    /// broken template leaves no half-created collection behind.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCollectionId`],
    /// [`EngineError::InvalidField`], template errors,
    /// [`EngineError::CollectionExists`] or store errors.
    pub fn create(
        &self,
        workflow: &str,
        id: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Collection, EngineError> {
        let definition = find_workflow(&self.workflows, workflow)?;
        validate_id(id)?;
        let initial = definition
            .initial_stage()
            .ok_or_else(|| EngineError::EmptyWorkflow(workflow.to_owned()))?;

        let mut metadata = CollectionMetadata::new(workflow, id, &initial.name, now());
        for (key, value) in fields {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                return Err(EngineError::InvalidField {
                    field: key.clone(),
                    reason: "reserved metadata key".to_owned(),
                });
            }
            if key.trim().is_empty() {
                return Err(EngineError::InvalidField {
                    field: key.clone(),
                    reason: "empty field name".to_owned(),
                });
            }
            metadata
                .fields
                .insert(key.clone(), serde_yaml::Value::String(value.clone()));
        }

        let vars = template_vars(&metadata);
        let mut documents: Vec<RenderedTemplate> = Vec::new();
        let mut names = HashSet::new();
        for spec in definition.templates_of_kind(TemplateKind::Document) {
            let rendered = self.templates.render(spec, &spec.file, &vars)?;
            if !names.insert(rendered.file_name.clone()) {
                return Err(EngineError::Template {
                    name: spec.name.clone(),
                    message: format!("output '{}' is produced twice", rendered.file_name),
                });
            }
            documents.push(rendered);
        }

        let mut collection = self.store.create(metadata).map_err(|err| {
            if err.kind == StoreErrorKind::AlreadyExists {
                EngineError::CollectionExists {
                    workflow: workflow.to_owned(),
                    id: id.to_owned(),
                }
            } else {
                err.into()
            }
        })?;

        for document in &documents {
            let path = collection.path.join(&document.file_name);
            fs::write(&path, &document.content).map_err(|e| EngineError::io(&path, e))?;
            tracing::debug!(path = %path.display(), "rendered template");
        }
        self.store.refresh_artifacts(&mut collection)?;

        tracing::info!(
            workflow,
            collection = id,
            status = collection.status(),
            documents = documents.len(),
            "created collection"
        );
        Ok(collection)
    }
}

/// Check that `id` is usable as a directory name.
///
/// Allowed: ASCII letters and digits, `_`, `-` and `.`, not starting with `.`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidCollectionId`] describing the problem.
pub fn validate_id(id: &str) -> Result<(), EngineError> {
    let invalid = |reason: &str| EngineError::InvalidCollectionId {
        id: id.to_owned(),
        reason: reason.to_owned(),
    };

    if id.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if id.starts_with('.') {
        return Err(invalid("cannot start with '.'"));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(invalid(&format!("character '{c}' is not allowed")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use docket_config::{Stage, TemplateSpec, WorkflowDefinition};
    use docket_store::{FsCollectionStore, METADATA_FILE};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::template::MiniJinjaRenderer;

    fn setup(root: &Path, templates: Vec<TemplateSpec>) -> (Arc<FsCollectionStore>, CollectionCreator) {
        let templates_dir = root.join("templates");
        fs::create_dir_all(&templates_dir).unwrap();
        fs::write(
            templates_dir.join("cover_letter.md"),
            "Dear {{ company }},\n\nI am applying for {{ position }}.\n",
        )
        .unwrap();
        fs::write(templates_dir.join("resume.md"), "# {{ collection_id }}\n").unwrap();

        let mut workflows = Workflows::default();
        workflows.insert(
            WorkflowDefinition::new(
                "job",
                vec![Stage::new("active", &["rejected"]), Stage::terminal("rejected")],
            )
            .with_templates(templates),
        );

        let store = Arc::new(FsCollectionStore::new(root.join("collections")));
        let creator = CollectionCreator::new(
            Arc::clone(&store) as _,
            Arc::new(workflows),
            TemplateLibrary::new(templates_dir, Arc::new(MiniJinjaRenderer::new())),
        );
        (store, creator)
    }

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn job_templates() -> Vec<TemplateSpec> {
        vec![
            TemplateSpec::new("cover", "cover_letter.md", TemplateKind::Document),
            TemplateSpec::new("resume", "resume.md", TemplateKind::Document),
            TemplateSpec::new("interview", "interview.md", TemplateKind::Note),
        ]
    }

    #[test]
    fn test_create_in_initial_stage_with_documents() {
        let temp = tempfile::tempdir().unwrap();
        let (store, creator) = setup(temp.path(), job_templates());

        let collection = creator
            .create(
                "job",
                "acme-backend",
                &fields(&[("company", "Acme"), ("position", "Backend Engineer")]),
            )
            .unwrap();

        assert_eq!(
            collection.path,
            temp.path().join("collections/job/active/acme-backend")
        );
        assert_eq!(collection.artifacts, vec!["cover_letter.md", "resume.md"]);
        assert_eq!(collection.metadata.status_history.len(), 1);
        assert_eq!(
            fs::read_to_string(collection.path.join("cover_letter.md")).unwrap(),
            "Dear Acme,\n\nI am applying for Backend Engineer.\n"
        );

        let loaded = store.get("job", "acme-backend").unwrap();
        assert_eq!(
            loaded.metadata.fields.get("company"),
            Some(&serde_yaml::Value::from("Acme"))
        );
        assert!(collection.path.join(METADATA_FILE).is_file());
    }

    #[test]
    fn test_create_duplicate_in_any_stage() {
        let temp = tempfile::tempdir().unwrap();
        let (store, creator) = setup(temp.path(), Vec::new());
        store
            .create(CollectionMetadata::new("job", "acme", "rejected", now()))
            .unwrap();

        let err = creator.create("job", "acme", &BTreeMap::new()).unwrap_err();

        assert!(matches!(err, EngineError::CollectionExists { .. }));
        assert!(!temp.path().join("collections/job/active/acme").exists());
    }

    #[test]
    fn test_broken_template_creates_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let templates = vec![TemplateSpec::new("missing", "nope.md", TemplateKind::Document)];
        let (_store, creator) = setup(temp.path(), templates);

        let err = creator.create("job", "acme", &BTreeMap::new()).unwrap_err();

        assert!(matches!(err, EngineError::TemplateNotFound(_)));
        assert!(!temp.path().join("collections").exists());
    }

    #[test]
    fn test_reserved_field_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let (_store, creator) = setup(temp.path(), Vec::new());

        let err = creator
            .create("job", "acme", &fields(&[("status", "submitted")]))
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidField { ref field, .. } if field == "status"));
    }

    #[test]
    fn test_unknown_workflow() {
        let temp = tempfile::tempdir().unwrap();
        let (_store, creator) = setup(temp.path(), Vec::new());

        assert!(matches!(
            creator.create("blog", "post", &BTreeMap::new()).unwrap_err(),
            EngineError::WorkflowNotFound(_)
        ));
    }

    #[test]
    fn test_validate_id() {
        for ok in ["acme", "acme-backend_2024", "v1.2"] {
            assert!(validate_id(ok).is_ok(), "{ok}");
        }
        for bad in ["", ".hidden", "a/b", "a\\b", "with space", "ümlaut"] {
            assert!(
                matches!(validate_id(bad), Err(EngineError::InvalidCollectionId { .. })),
                "{bad}"
            );
        }
    }
}
