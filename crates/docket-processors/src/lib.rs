//! Content processing pipeline for docket.
//!
//! Processors rewrite markdown documents before formatting. Diagram
//! processors find tagged fences such as
//!
//! ````text
//! ```graphviz:flow {layout=neato}
//! digraph { a -> b }
//! ```
//! ````
//!
//! render them with a local tool (`dot`, `plantuml`, `mmdc`) and replace
//! each fence with an image reference. The emoji processor rewrites
//! `:shortcode:` outside code.
//!
//! # Architecture
//!
//! - [`Processor`]: trait every content transform implements
//! - [`ProcessorRegistry`]: named processors run as an ordered chain
//! - [`DiagramProcessor`]: Graphviz, `PlantUML` and Mermaid rendering
//! - [`EmojiProcessor`]: shortcode substitution
//! - [`RegenerationPolicy`]: decides whether an existing asset is stale
//! - [`CommandRunner`]: external program execution with timeouts
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docket_processors::{
//!     DiagramProcessor, EmojiProcessor, ProcessingContext, ProcessorRegistry,
//!     SystemCommandRunner,
//! };
//!
//! let runner = Arc::new(SystemCommandRunner);
//! let registry = ProcessorRegistry::builder()
//!     .register(DiagramProcessor::graphviz(runner.clone()))?
//!     .register(EmojiProcessor::new())?
//!     .build();
//!
//! let ctx = ProcessingContext::new("collections/job/active/acme", "docx");
//! let result = registry.process(&markdown, &ctx)?;
//! ```

mod block;
mod consts;
mod context;
mod diagram;
mod emoji;
mod error;
mod fence;
mod language;
mod plantuml;
mod processor;
mod regen;
mod registry;
mod runner;
mod splice;

pub use block::{ProcessorBlock, detect_fenced_blocks, has_fence, parse_params};
pub use consts::{DEFAULT_DPI, DEFAULT_TIMEOUT};
pub use context::{Artifact, ArtifactKind, ProcessingContext, ProcessingResult, absolute_path};
pub use diagram::DiagramProcessor;
pub use emoji::{EmojiProcessor, lookup as lookup_emoji};
pub use error::{ProcessorError, RegistryError, RunError};
pub use language::{DiagramFormat, DiagramLanguage, GRAPHVIZ_LAYOUTS};
pub use plantuml::{PrepareResult, prepare_diagram_source};
pub use processor::Processor;
pub use regen::{AlwaysRegenerate, MtimePolicy, RegenerationPolicy, needs_regeneration};
pub use registry::{ProcessorRegistry, RegistryBuilder};
#[cfg(feature = "mock")]
pub use runner::MockCommandRunner;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
