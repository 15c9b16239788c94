//! CLI command implementations.

mod action;
mod collection;
mod process;
mod status;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use docket_config::{CliSettings, Config};
use docket_engine::Engine;
use docket_processors::SystemCommandRunner;
use docket_store::FsCollectionStore;

use crate::error::CliError;

pub(crate) use action::ActionArgs;
pub(crate) use collection::{ListArgs, NewArgs, ShowArgs};
pub(crate) use process::ProcessArgs;
pub(crate) use status::{RecoverArgs, StatusArgs};

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover docket.toml).
    #[arg(short, long, global = true, env = "DOCKET_CONFIG")]
    config: Option<PathBuf>,

    /// Collections directory (overrides config).
    #[arg(long, global = true)]
    collections_dir: Option<PathBuf>,

    /// Re-render every diagram even if its image is up to date.
    #[arg(long, global = true)]
    force: bool,

    /// Enable verbose output (info-level logs).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load configuration with command-line overrides applied.
    pub(crate) fn config(&self) -> Result<Config, CliError> {
        let settings = CliSettings {
            collections_dir: self.collections_dir.clone(),
            force: self.force.then_some(true),
        };
        Ok(Config::load(self.config.as_deref(), Some(&settings))?)
    }

    /// Build the engine over the configured collections directory.
    pub(crate) fn engine(&self) -> Result<(Config, Engine), CliError> {
        let config = self.config()?;
        tracing::debug!(
            config = ?config.config_path,
            collections = %config.project_resolved.collections_dir.display(),
            "loaded configuration"
        );
        let store = Arc::new(FsCollectionStore::new(
            config.project_resolved.collections_dir.clone(),
        ));
        let engine = Engine::from_config(&config, store, Arc::new(SystemCommandRunner))?;
        Ok((config, engine))
    }
}

/// Parse a `key=value` argument.
pub(crate) fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{arg}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

/// Collect `key=value` pairs, rejecting repeated keys.
pub(crate) fn into_map(
    pairs: Vec<(String, String)>,
    what: &str,
) -> Result<BTreeMap<String, String>, CliError> {
    let mut map = BTreeMap::new();
    for (key, value) in pairs {
        if map.contains_key(&key) {
            return Err(CliError::Validation(format!("{what} '{key}' given twice")));
        }
        map.insert(key, value);
    }
    Ok(map)
}
