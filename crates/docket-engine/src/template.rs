//! Template rendering for new collections and notes.
//!
//! Templates use `{{ name }}` placeholders (Mustache-style `{{name}}` works
//! too). Variables come from collection metadata; undefined variables render
//! as empty strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docket_config::TemplateSpec;
use docket_store::CollectionMetadata;
use minijinja::Environment;

use crate::error::EngineError;

/// Variables available to templates.
pub type TemplateVars = BTreeMap<String, serde_yaml::Value>;

/// Renders a template string. Pure: performs no I/O.
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` with `vars`.
    ///
    /// # Errors
    ///
    /// Returns a description of the syntax or evaluation error.
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, String>;
}

/// [`TemplateRenderer`] backed by `minijinja`.
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
}

impl Default for MiniJinjaRenderer {
    fn default() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self { env }
    }
}

impl MiniJinjaRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, String> {
        self.env
            .render_str(template, vars)
            .map_err(|e| e.to_string())
    }
}

/// Template variables for a collection.
///
/// Contains `collection_id`, `workflow`, `status`, `date_created`,
/// `date_modified`, `date` (creation day as `YYYY-MM-DD`) and every extra
/// field.
#[must_use]
pub fn template_vars(metadata: &CollectionMetadata) -> TemplateVars {
    let mut vars = metadata.fields.clone();
    for (key, value) in [
        ("collection_id", metadata.collection_id.clone()),
        ("workflow", metadata.workflow.clone()),
        ("status", metadata.status.clone()),
        ("date_created", metadata.date_created.to_rfc3339()),
        ("date_modified", metadata.date_modified.to_rfc3339()),
        ("date", metadata.date_created.format("%Y-%m-%d").to_string()),
    ] {
        vars.insert(key.to_owned(), serde_yaml::Value::String(value));
    }
    vars
}

/// A rendered template ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    /// Plain file name inside the collection directory.
    pub file_name: String,
    pub content: String,
}

/// Template files on disk plus the renderer applied to them.
#[derive(Clone)]
pub struct TemplateLibrary {
    dir: PathBuf,
    renderer: Arc<dyn TemplateRenderer>,
}

impl TemplateLibrary {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            dir: dir.into(),
            renderer,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render `spec` and its output file name.
    ///
    /// The output name is `spec.output` (itself rendered) or
    /// `default_output`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TemplateNotFound`] if the template file is
    /// missing, or [`EngineError::Template`] if rendering fails or the output
    /// name is not a plain file name.
    pub fn render(
        &self,
        spec: &TemplateSpec,
        default_output: &str,
        vars: &TemplateVars,
    ) -> Result<RenderedTemplate, EngineError> {
        let path = self.dir.join(&spec.file);
        let source = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::TemplateNotFound(path.display().to_string())
            } else {
                EngineError::io(&path, e)
            }
        })?;

        let template_error = |message: String| EngineError::Template {
            name: spec.name.clone(),
            message,
        };

        let content = self.renderer.render(&source, vars).map_err(template_error)?;
        let file_name = match &spec.output {
            Some(output) => self.renderer.render(output, vars).map_err(template_error)?,
            None => default_output.to_owned(),
        };
        let file_name = file_name.trim().to_owned();

        if !is_plain_file_name(&file_name) {
            return Err(template_error(format!(
                "output name '{file_name}' is not a plain file name"
            )));
        }

        Ok(RenderedTemplate { file_name, content })
    }
}

/// Non-empty, not hidden and free of path separators.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}
