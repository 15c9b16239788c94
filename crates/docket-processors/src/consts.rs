//! Internal constants for content processing.

use std::time::Duration;

/// Default DPI for diagram rendering (192 = 2x for retina displays).
pub const DEFAULT_DPI: u32 = 192;

/// Default timeout for a single external renderer invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum nesting depth for `PlantUML` `!include` resolution.
pub const MAX_INCLUDE_DEPTH: usize = 10;

/// Directory (relative to the collection) for generated assets.
pub const ASSETS_DIR: &str = "assets";

/// Directory (relative to the collection) for retained intermediates.
pub const INTERMEDIATE_DIR: &str = "intermediate";
