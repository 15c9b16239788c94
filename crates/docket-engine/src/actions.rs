//! Workflow actions on collections.
//!
//! A workflow declares which actions its collections expose; the dispatcher
//! implements a closed set of them:
//!
//! | Action   | Parameters                  | Effect                                   |
//! |----------|-----------------------------|------------------------------------------|
//! | `format` | `format`?, `file`?          | run the pipeline, then convert documents |
//! | `notes`  | `note_type`                 | render a note template                   |
//! | `add`    | `file`, `name`?             | copy a file into the collection          |
//!
//! Parameters are validated before any file is touched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docket_config::{TemplateKind, Workflows};
use docket_processors::{ProcessingContext, ProcessorRegistry};
use docket_store::{Collection, CollectionStore, METADATA_FILE, now};

use crate::error::EngineError;
use crate::format::{DocumentFormatter, FormatRequest};
use crate::lookup::find_workflow;
use crate::template::{TemplateLibrary, is_plain_file_name, template_vars};

/// Action parameters as `key=value` pairs.
pub type ActionParams = BTreeMap<String, String>;

/// Actions the dispatcher implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Format,
    Notes,
    Add,
}

impl Action {
    pub const ALL: [Self; 3] = [Self::Format, Self::Notes, Self::Add];

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Notes => "notes",
            Self::Add => "add",
        }
    }

    fn known_params(self) -> &'static [&'static str] {
        match self {
            Self::Format => &["format", "file"],
            Self::Notes => &["note_type"],
            Self::Add => &["file", "name"],
        }
    }
}

/// Validated parameters of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Format { format: String, file: Option<String> },
    Notes { note_type: String },
    Add { source: PathBuf, name: String },
}

/// Result of a successful action.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Files written, in the order they were produced.
    pub files: Vec<PathBuf>,
    /// Diagnostics worth showing the user.
    pub messages: Vec<String>,
}

/// Routes declared workflow actions to their handlers.
pub struct ActionDispatcher {
    store: Arc<dyn CollectionStore>,
    workflows: Arc<Workflows>,
    templates: TemplateLibrary,
    registry: Arc<ProcessorRegistry>,
    formatter: Arc<dyn DocumentFormatter>,
    default_format: String,
}

impl ActionDispatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn CollectionStore>,
        workflows: Arc<Workflows>,
        templates: TemplateLibrary,
        registry: Arc<ProcessorRegistry>,
        formatter: Arc<dyn DocumentFormatter>,
    ) -> Self {
        Self {
            store,
            workflows,
            templates,
            registry,
            formatter,
            default_format: "docx".to_owned(),
        }
    }

    /// Output format used when `format` gets none.
    #[must_use]
    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// Run `action` on `collection`.
    ///
    /// On success `date_modified` is advanced, metadata is persisted and
    /// the artifact list is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAction`] if the workflow does not
    /// declare `action` or it is not implemented, and
    /// [`EngineError::MissingParameter`] / [`EngineError::InvalidParameter`]
    /// before any I/O. Handler failures are returned as they occur.
    pub fn execute(
        &self,
        workflow: &str,
        collection: &mut Collection,
        action: &str,
        params: &ActionParams,
    ) -> Result<ActionOutcome, EngineError> {
        let definition = find_workflow(&self.workflows, workflow)?;
        let unknown = || EngineError::UnknownAction {
            workflow: workflow.to_owned(),
            action: action.to_owned(),
        };
        if definition.action(action).is_none() {
            return Err(unknown());
        }
        let kind = Action::parse(action).ok_or_else(unknown)?;

        let request = self.validate(kind, collection, params)?;
        let mut outcome = ActionOutcome::default();
        for key in params.keys() {
            if !kind.known_params().contains(&key.as_str()) {
                outcome
                    .messages
                    .push(format!("ignored unknown parameter '{key}'"));
            }
        }

        match request {
            Request::Format { format, file } => {
                self.format(collection, &format, file.as_deref(), &mut outcome)?;
            }
            Request::Notes { note_type } => {
                self.notes(workflow, collection, &note_type, &mut outcome)?;
            }
            Request::Add { source, name } => Self::add(collection, &source, &name, &mut outcome)?,
        }

        collection.metadata.touch(now());
        self.store.persist(collection)?;
        self.store.refresh_artifacts(collection)?;

        tracing::info!(
            collection = collection.id(),
            action,
            files = outcome.files.len(),
            "action completed"
        );
        Ok(outcome)
    }

    /// Check parameters against the action's contract.
    fn validate(
        &self,
        kind: Action,
        collection: &Collection,
        params: &ActionParams,
    ) -> Result<Request, EngineError> {
        let get = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let missing = |param: &'static str| EngineError::MissingParameter {
            action: kind.name().to_owned(),
            param,
        };
        let invalid = |param: &'static str, reason: String| EngineError::InvalidParameter {
            action: kind.name().to_owned(),
            param,
            reason,
        };

        match kind {
            Action::Format => {
                let format = get("format").unwrap_or(self.default_format.as_str()).to_owned();
                if !format.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(invalid("format", format!("'{format}' is not a format name")));
                }

                let file = get("file").map(str::to_owned);
                match &file {
                    Some(name) if !collection.markdown_files().any(|f| f == name) => {
                        return Err(EngineError::FileNotFound {
                            id: collection.id().to_owned(),
                            file: name.clone(),
                        });
                    }
                    None if collection.markdown_files().next().is_none() => {
                        return Err(EngineError::NoDocuments(collection.id().to_owned()));
                    }
                    _ => {}
                }
                Ok(Request::Format { format, file })
            }
            Action::Notes => {
                let note_type = get("note_type").ok_or_else(|| missing("note_type"))?;
                Ok(Request::Notes {
                    note_type: note_type.to_owned(),
                })
            }
            Action::Add => {
                let source = PathBuf::from(get("file").ok_or_else(|| missing("file"))?);
                let name = match get("name") {
                    Some(name) => name.to_owned(),
                    None => source
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| {
                            invalid("file", format!("'{}' has no file name", source.display()))
                        })?,
                };
                if !is_plain_file_name(&name) || name == METADATA_FILE {
                    return Err(invalid("name", format!("'{name}' is not a usable file name")));
                }
                Ok(Request::Add { source, name })
            }
        }
    }

    fn format(
        &self,
        collection: &Collection,
        format: &str,
        file: Option<&str>,
        outcome: &mut ActionOutcome,
    ) -> Result<(), EngineError> {
        let files: Vec<&str> = match file {
            Some(name) => vec![name],
            None => collection.markdown_files().collect(),
        };
        let ctx = ProcessingContext::new(&collection.path, format);

        for name in files {
            let source = collection.path.join(name);
            let content =
                fs::read_to_string(&source).map_err(|e| EngineError::io(&source, e))?;

            let result = self.registry.process(&content, &ctx)?;
            outcome.messages.extend(
                result
                    .warnings
                    .iter()
                    .map(|warning| format!("{name}: {warning}")),
            );

            let stem = Path::new(name)
                .file_stem()
                .map_or_else(|| name.to_owned(), |s| s.to_string_lossy().into_owned());
            fs::create_dir_all(&ctx.intermediate_dir)
                .map_err(|e| EngineError::io(&ctx.intermediate_dir, e))?;
            let processed = ctx.intermediate_dir.join(format!("{stem}.processed.md"));
            fs::write(&processed, &result.processed_content)
                .map_err(|e| EngineError::io(&processed, e))?;

            let output = collection.path.join(format!("{stem}.{format}"));
            self.formatter.format(&FormatRequest {
                input: &processed,
                output: &output,
                format,
                resource_dir: &collection.path,
            })?;

            tracing::debug!(
                file = name,
                blocks = result.blocks_processed,
                failed = result.blocks_failed,
                "formatted"
            );
            outcome.files.push(output);
        }
        Ok(())
    }

    fn notes(
        &self,
        workflow: &str,
        collection: &Collection,
        note_type: &str,
        outcome: &mut ActionOutcome,
    ) -> Result<(), EngineError> {
        let definition = find_workflow(&self.workflows, workflow)?;
        let spec = definition
            .template(note_type, TemplateKind::Note)
            .ok_or_else(|| EngineError::TemplateNotFound(note_type.to_owned()))?;

        let rendered = self.templates.render(
            spec,
            &format!("notes-{note_type}.md"),
            &template_vars(&collection.metadata),
        )?;

        let path = collection.path.join(&rendered.file_name);
        write_new(&path, rendered.content.as_bytes())?;
        outcome.files.push(path);
        Ok(())
    }

    fn add(
        collection: &Collection,
        source: &Path,
        name: &str,
        outcome: &mut ActionOutcome,
    ) -> Result<(), EngineError> {
        let content = fs::read(source).map_err(|e| EngineError::io(source, e))?;
        let target = collection.path.join(name);
        write_new(&target, &content)?;
        outcome.files.push(target);
        Ok(())
    }
}

/// Write a file that must not exist yet.
fn write_new(path: &Path, content: &[u8]) -> Result<(), EngineError> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                EngineError::FileExists(path.to_path_buf())
            } else {
                EngineError::io(path, e)
            }
        })?;
    file.write_all(content).map_err(|e| EngineError::io(path, e))
}
