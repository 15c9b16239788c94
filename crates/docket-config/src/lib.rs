//! Configuration management for docket.
//!
//! Parses `docket.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Workflow
//! definitions live in the same file under `[workflows.<name>]`.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `project.collections_dir`
//! - `project.templates_dir`
//! - `processors.{graphviz,plantuml,mermaid}.binary`
//! - `formatter.pandoc`

mod expand;
mod workflow;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use workflow::{
    ActionSpec, Stage, TemplateKind, TemplateSpec, WorkflowDefinition, Workflows,
};

/// Processor names used when `processors.order` is not set.
pub const DEFAULT_PROCESSOR_ORDER: [&str; 4] = ["graphviz", "plantuml", "mermaid", "emoji"];

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "docket.toml";

/// Upper bound for `processors.dpi`.
const MAX_DPI: u32 = 1000;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the collections directory.
    pub collections_dir: Option<PathBuf>,
    /// Force regeneration of every diagram.
    pub force: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project layout (paths are relative strings from TOML).
    project: ProjectConfigRaw,
    /// Processor pipeline settings.
    processors: ProcessorsConfigRaw,
    /// Document formatter settings.
    pub formatter: FormatterConfig,
    /// Workflow definitions keyed by name.
    pub workflows: Workflows,

    /// Resolved project configuration (set after loading).
    #[serde(skip)]
    pub project_resolved: ProjectConfig,
    /// Resolved processor configuration (set after loading).
    #[serde(skip)]
    pub processors_resolved: ProcessorsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw project configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProjectConfigRaw {
    collections_dir: Option<String>,
    templates_dir: Option<String>,
}

/// Resolved project layout with absolute paths.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    /// Root of `<workflow>/<status>/<id>/` collection directories.
    pub collections_dir: PathBuf,
    /// Directory template files are read from.
    pub templates_dir: PathBuf,
}

/// Raw settings for one external renderer.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RendererConfigRaw {
    binary: Option<String>,
    enabled: Option<bool>,
}

/// Raw processor configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProcessorsConfigRaw {
    order: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    include_dirs: Option<Vec<String>>,
    dpi: Option<u32>,
    force: Option<bool>,
    graphviz: RendererConfigRaw,
    plantuml: RendererConfigRaw,
    mermaid: RendererConfigRaw,
}

/// Resolved settings for one external renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Executable name or path.
    pub binary: String,
    /// Whether the processor is registered at all.
    pub enabled: bool,
}

impl RendererConfig {
    fn resolve(raw: &RendererConfigRaw, default_binary: &str) -> Self {
        Self {
            binary: raw
                .binary
                .clone()
                .unwrap_or_else(|| default_binary.to_owned()),
            enabled: raw.enabled.unwrap_or(true),
        }
    }
}

/// Resolved processor pipeline configuration.
#[derive(Debug)]
pub struct ProcessorsConfig {
    /// Processing order by processor name.
    pub order: Vec<String>,
    /// Timeout for each external renderer invocation.
    pub timeout: Duration,
    /// Directories searched for `PlantUML` `!include` files.
    pub include_dirs: Vec<PathBuf>,
    /// DPI injected into `PlantUML` sources.
    pub dpi: u32,
    /// Regenerate every diagram regardless of mtimes.
    pub force: bool,
    pub graphviz: RendererConfig,
    pub plantuml: RendererConfig,
    pub mermaid: RendererConfig,
}

impl Default for ProcessorsConfig {
    fn default() -> Self {
        Self::resolve(&ProcessorsConfigRaw::default(), Path::new("."))
    }
}

impl ProcessorsConfig {
    fn resolve(raw: &ProcessorsConfigRaw, config_dir: &Path) -> Self {
        Self {
            order: raw.order.clone().unwrap_or_else(|| {
                DEFAULT_PROCESSOR_ORDER
                    .iter()
                    .map(|s| (*s).to_owned())
                    .collect()
            }),
            timeout: Duration::from_secs(raw.timeout_secs.unwrap_or(30)),
            include_dirs: raw
                .include_dirs
                .iter()
                .flatten()
                .map(|d| config_dir.join(d))
                .collect(),
            dpi: raw.dpi.unwrap_or(192),
            force: raw.force.unwrap_or(false),
            graphviz: RendererConfig::resolve(&raw.graphviz, "dot"),
            plantuml: RendererConfig::resolve(&raw.plantuml, "plantuml"),
            mermaid: RendererConfig::resolve(&raw.mermaid, "mmdc"),
        }
    }
}

/// Document formatter (pandoc) configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Pandoc executable name or path.
    pub pandoc: String,
    /// Output format used when the `format` action gets none.
    pub default_format: String,
    /// Reference document for styled docx/odt output.
    pub reference_doc: Option<PathBuf>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            pandoc: "pandoc".to_owned(),
            default_format: "docx".to_owned(),
            reference_doc: None,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`formatter.pandoc`").
        field: String,
        /// Error message (e.g., "${`PANDOC`} not set").
        message: String,
    },
}

/// `dir` resolved against the current directory (`""` means `.`).
fn absolute_dir(dir: &Path) -> PathBuf {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `docket.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// a workflow definition is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Parse configuration from a TOML string, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.workflows.assign_names();
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(dir) = &settings.collections_dir {
            self.project_resolved.collections_dir = absolute_dir(dir);
        }
        if let Some(force) = settings.force {
            self.processors_resolved.force = force;
        }
    }

    /// Look up a workflow by name.
    #[must_use]
    pub fn workflow(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(name)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            project: ProjectConfigRaw::default(),
            processors: ProcessorsConfigRaw::default(),
            formatter: FormatterConfig::default(),
            workflows: Workflows::default(),
            project_resolved: ProjectConfig::default(),
            processors_resolved: ProcessorsConfig::default(),
            config_path: None,
        };
        config.resolve_paths(base);
        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml_str(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_processors()?;
        require_non_empty(&self.formatter.pandoc, "formatter.pandoc")?;
        require_non_empty(&self.formatter.default_format, "formatter.default_format")?;
        self.workflows.validate()
    }

    /// Validate processor configuration.
    fn validate_processors(&self) -> Result<(), ConfigError> {
        let processors = &self.processors_resolved;

        if processors.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "processors.timeout_secs must be greater than 0".to_owned(),
            ));
        }

        if processors.dpi == 0 || processors.dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "processors.dpi must be between 1 and {MAX_DPI}"
            )));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = processors.order.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(ConfigError::Validation(format!(
                "processors.order lists '{dup}' more than once"
            )));
        }

        for (field, renderer) in [
            ("processors.graphviz.binary", &processors.graphviz),
            ("processors.plantuml.binary", &processors.plantuml),
            ("processors.mermaid.binary", &processors.mermaid),
        ] {
            require_non_empty(&renderer.binary, field)?;
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::expand_opt(&mut self.project.collections_dir, "project.collections_dir")?;
        expand::expand_opt(&mut self.project.templates_dir, "project.templates_dir")?;

        expand::expand_opt(
            &mut self.processors.graphviz.binary,
            "processors.graphviz.binary",
        )?;
        expand::expand_opt(
            &mut self.processors.plantuml.binary,
            "processors.plantuml.binary",
        )?;
        expand::expand_opt(
            &mut self.processors.mermaid.binary,
            "processors.mermaid.binary",
        )?;

        self.formatter.pandoc = expand::expand_env(&self.formatter.pandoc, "formatter.pandoc")?;

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let config_dir = &absolute_dir(config_dir);
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.project_resolved = ProjectConfig {
            collections_dir: resolve(self.project.collections_dir.as_deref(), "collections"),
            templates_dir: resolve(self.project.templates_dir.as_deref(), "templates"),
        };
        self.processors_resolved = ProcessorsConfig::resolve(&self.processors, config_dir);

        if let Some(reference_doc) = self.formatter.reference_doc.take() {
            self.formatter.reference_doc = Some(config_dir.join(reference_doc));
        }
    }
}
