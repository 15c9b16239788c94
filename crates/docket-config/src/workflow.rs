//! Workflow definitions: stages, actions and templates.
//!
//! A workflow is a named graph of stages. Collections occupy exactly one
//! stage at a time and move along the `next` edges declared per stage.
//!
//! ```toml
//! [workflows.job]
//! description = "Job applications"
//!
//! [[workflows.job.stages]]
//! name = "active"
//! next = ["submitted", "rejected"]
//!
//! [[workflows.job.stages]]
//! name = "rejected"
//! terminal = true
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::ConfigError;

/// A named node in a workflow's status graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stage {
    /// Stage name, also used as the status directory name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Stages reachable from this one.
    #[serde(default)]
    pub next: Vec<String>,
    /// Documentation flag for end states. Transition checks only look at `next`.
    #[serde(default)]
    pub terminal: bool,
}

impl Stage {
    /// Create a stage with the given outgoing transitions.
    #[must_use]
    pub fn new(name: impl Into<String>, next: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            next: next.iter().map(|s| (*s).to_owned()).collect(),
            terminal: false,
        }
    }

    /// Create a terminal stage without outgoing transitions.
    #[must_use]
    pub fn terminal(name: impl Into<String>) -> Self {
        Self {
            terminal: true,
            ..Self::new(name, &[])
        }
    }

    /// Whether `target` is listed in this stage's `next` edges.
    #[must_use]
    pub fn allows(&self, target: &str) -> bool {
        self.next.iter().any(|n| n == target)
    }

    /// Whether no transitions leave this stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal || self.next.is_empty()
    }
}

/// An action a workflow exposes on its collections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionSpec {
    /// Action name (`format`, `notes`, `add`, ...).
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ActionSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}

/// When a template is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Rendered into every new collection.
    #[default]
    Document,
    /// Rendered on demand by the `notes` action.
    Note,
}

/// A template file rendered into a collection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateSpec {
    /// Template name, referenced by the `notes` action's `note_type`.
    pub name: String,
    /// Template file, relative to the templates directory.
    pub file: String,
    /// Output file name (itself a template). Defaults to the template file name.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub kind: TemplateKind,
}

impl TemplateSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, file: impl Into<String>, kind: TemplateKind) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            output: None,
            kind,
        }
    }
}

/// A workflow: its stage graph plus the actions and templates it declares.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name. Filled from the `[workflows.<name>]` key on load.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Stages in declaration order. The first one is the initial stage.
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub templates: Vec<TemplateSpec>,
}

impl WorkflowDefinition {
    /// Create a workflow with the given stages and no actions or templates.
    #[must_use]
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            stages,
            actions: Vec::new(),
            templates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Vec<TemplateSpec>) -> Self {
        self.templates = templates;
        self
    }

    /// Look up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Whether `name` is a declared stage.
    #[must_use]
    pub fn has_stage(&self, name: &str) -> bool {
        self.stage(name).is_some()
    }

    /// Stage new collections are created in.
    #[must_use]
    pub fn initial_stage(&self) -> Option<&Stage> {
        self.stages.first()
    }

    /// Look up a declared action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Look up a template of the given kind by name.
    #[must_use]
    pub fn template(&self, name: &str, kind: TemplateKind) -> Option<&TemplateSpec> {
        self.templates
            .iter()
            .find(|t| t.kind == kind && t.name == name)
    }

    /// Templates of the given kind, in declaration order.
    pub fn templates_of_kind(&self, kind: TemplateKind) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.iter().filter(move |t| t.kind == kind)
    }

    /// Check the stage graph and name uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the workflow and offending entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| ConfigError::Validation(format!("workflow '{}': {msg}", self.name));

        if self.stages.is_empty() {
            return Err(invalid("at least one stage is required".to_owned()));
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            if stage.name.is_empty() {
                return Err(invalid("stage name cannot be empty".to_owned()));
            }
            if !names.insert(stage.name.as_str()) {
                return Err(invalid(format!("duplicate stage '{}'", stage.name)));
            }
        }

        for stage in &self.stages {
            if stage.terminal && !stage.next.is_empty() {
                return Err(invalid(format!(
                    "terminal stage '{}' cannot declare next stages",
                    stage.name
                )));
            }
            if let Some(unknown) = stage.next.iter().find(|n| !names.contains(n.as_str())) {
                return Err(invalid(format!(
                    "stage '{}' references unknown next stage '{unknown}'",
                    stage.name
                )));
            }
        }

        let mut actions = HashSet::new();
        if let Some(dup) = self.actions.iter().find(|a| !actions.insert(a.name.as_str())) {
            return Err(invalid(format!("duplicate action '{}'", dup.name)));
        }

        let mut templates = HashSet::new();
        if let Some(dup) = self
            .templates
            .iter()
            .find(|t| !templates.insert((t.kind, t.name.as_str())))
        {
            return Err(invalid(format!("duplicate template '{}'", dup.name)));
        }

        Ok(())
    }
}

/// All workflows known to a project, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Workflows(BTreeMap<String, WorkflowDefinition>);

impl Workflows {
    /// Look up a workflow by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.0.get(name)
    }

    /// Add a workflow, replacing any existing one with the same name.
    pub fn insert(&mut self, workflow: WorkflowDefinition) {
        self.0.insert(workflow.name.clone(), workflow);
    }

    /// Workflow names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy each map key into the workflow's `name` field.
    pub(crate) fn assign_names(&mut self) {
        for (name, workflow) in &mut self.0 {
            workflow.name.clone_from(name);
        }
    }

    /// Validate every workflow.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.0.values().try_for_each(WorkflowDefinition::validate)
    }
}

impl FromIterator<WorkflowDefinition> for Workflows {
    fn from_iter<I: IntoIterator<Item = WorkflowDefinition>>(iter: I) -> Self {
        let mut workflows = Self::default();
        for workflow in iter {
            workflows.insert(workflow);
        }
        workflows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_workflow() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "job",
            vec![
                Stage::new("active", &["submitted", "rejected"]),
                Stage::new("submitted", &["interview", "rejected"]),
                Stage::new("interview", &["offered", "rejected"]),
                Stage::terminal("offered"),
                Stage::terminal("rejected"),
            ],
        )
    }

    #[test]
    fn test_valid_workflow() {
        assert!(job_workflow().validate().is_ok());
    }

    #[test]
    fn test_stage_lookup() {
        let workflow = job_workflow();
        assert_eq!(workflow.initial_stage().unwrap().name, "active");
        assert!(workflow.has_stage("interview"));
        assert!(!workflow.has_stage("archived"));
        assert!(workflow.stage("active").unwrap().allows("submitted"));
        assert!(!workflow.stage("active").unwrap().allows("interview"));
    }

    #[test]
    fn test_terminal_detection() {
        let workflow = job_workflow();
        assert!(workflow.stage("rejected").unwrap().is_terminal());
        assert!(!workflow.stage("active").unwrap().is_terminal());
        // No outgoing edges counts as terminal even without the flag
        let stage = Stage::new("parked", &[]);
        assert!(stage.is_terminal());
    }

    #[test]
    fn test_empty_stages_rejected() {
        let err = WorkflowDefinition::new("blog", vec![]).validate().unwrap_err();
        assert!(err.to_string().contains("at least one stage"));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let workflow = WorkflowDefinition::new(
            "blog",
            vec![Stage::new("draft", &[]), Stage::new("draft", &[])],
        );
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate stage 'draft'"));
    }

    #[test]
    fn test_unknown_next_rejected() {
        let workflow = WorkflowDefinition::new("blog", vec![Stage::new("draft", &["published"])]);
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("unknown next stage 'published'"));
        assert!(err.to_string().contains("workflow 'blog'"));
    }

    #[test]
    fn test_terminal_with_next_rejected() {
        let mut stage = Stage::new("done", &["done"]);
        stage.terminal = true;
        let err = WorkflowDefinition::new("blog", vec![stage])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("terminal stage 'done'"));
    }

    #[test]
    fn test_duplicate_action_rejected() {
        let workflow = job_workflow()
            .with_actions(vec![ActionSpec::new("format"), ActionSpec::new("format")]);
        assert!(workflow.validate().is_err());
    }

    #[test]
    fn test_same_template_name_different_kinds_allowed() {
        let workflow = job_workflow().with_templates(vec![
            TemplateSpec::new("cover", "cover.md", TemplateKind::Document),
            TemplateSpec::new("cover", "cover-note.md", TemplateKind::Note),
        ]);
        assert!(workflow.validate().is_ok());
        assert_eq!(
            workflow.template("cover", TemplateKind::Note).unwrap().file,
            "cover-note.md"
        );
    }

    #[test]
    fn test_duplicate_template_same_kind_rejected() {
        let workflow = job_workflow().with_templates(vec![
            TemplateSpec::new("cover", "cover.md", TemplateKind::Document),
            TemplateSpec::new("cover", "cover-v2.md", TemplateKind::Document),
        ]);
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate template 'cover'"));
    }

    #[test]
    fn test_workflows_from_iter() {
        let workflows: Workflows = [job_workflow()].into_iter().collect();
        assert!(workflows.get("job").is_some());
        assert_eq!(workflows.names().collect::<Vec<_>>(), vec!["job"]);
    }
}
