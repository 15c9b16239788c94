//! The processor interface.

use crate::block::ProcessorBlock;
use crate::context::{ProcessingContext, ProcessingResult};
use crate::error::ProcessorError;

/// One independent content transform.
///
/// A processor owns a fence tag (or other markup), finds its blocks in a
/// document, derives artifacts from them and rewrites the document to
/// reference those artifacts. Content outside the blocks is preserved
/// byte-for-byte.
pub trait Processor: Send + Sync {
    /// Registry key, unique among registered processors.
    fn name(&self) -> &str;

    /// Cheap syntactic pre-check; `false` means [`process`](Self::process)
    /// would leave `content` unchanged.
    fn can_process(&self, content: &str) -> bool;

    /// All blocks this processor owns, in document order.
    fn detect_blocks(&self, content: &str) -> Vec<ProcessorBlock>;

    /// Rewrite `content`, generating artifacts under `ctx`.
    ///
    /// Per-block failures are reported inline in the returned content and
    /// in `warnings`; they do not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] only when the run cannot proceed at all,
    /// such as when an output directory cannot be created.
    fn process(
        &self,
        content: &str,
        ctx: &ProcessingContext,
    ) -> Result<ProcessingResult, ProcessorError>;
}
