//! Processor registry and pipeline driver.

use crate::context::{ProcessingContext, ProcessingResult};
use crate::error::{ProcessorError, RegistryError};
use crate::processor::Processor;

/// Builds a [`ProcessorRegistry`], rejecting duplicate names.
///
/// # Example
///
/// ```ignore
/// use docket_processors::{DiagramProcessor, EmojiProcessor, ProcessorRegistry};
///
/// let registry = ProcessorRegistry::builder()
///     .register(DiagramProcessor::graphviz(runner.clone()))?
///     .register(EmojiProcessor::new())?
///     .build();
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    processors: Vec<Box<dyn Processor>>,
}

impl RegistryBuilder {
    /// Add a processor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if a processor with the same
    /// name was already added.
    pub fn register(mut self, processor: impl Processor + 'static) -> Result<Self, RegistryError> {
        self.register_boxed(Box::new(processor))?;
        Ok(self)
    }

    /// Add an already boxed processor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] on a name clash.
    pub fn register_boxed(&mut self, processor: Box<dyn Processor>) -> Result<(), RegistryError> {
        if self.processors.iter().any(|p| p.name() == processor.name()) {
            return Err(RegistryError::Duplicate(processor.name().to_owned()));
        }
        self.processors.push(processor);
        Ok(())
    }

    /// Finish construction. Processing order defaults to registration order.
    #[must_use]
    pub fn build(self) -> ProcessorRegistry {
        let order = (0..self.processors.len()).collect();
        ProcessorRegistry {
            processors: self.processors,
            order,
        }
    }
}

/// Named processors plus the order they run in.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn Processor>>,
    /// Indices into `processors`.
    order: Vec<usize>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("order", &self.order_names())
            .finish()
    }
}

impl ProcessorRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processors.iter().map(|p| p.name())
    }

    /// Processor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Processor> {
        self.index_of(name).map(|i| self.processors[i].as_ref())
    }

    /// Current processing order.
    #[must_use]
    pub fn order_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.processors[i].name())
            .collect()
    }

    /// Set the processing order.
    ///
    /// Processors left out of `names` do not run. The order is unchanged on
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unknown`] for an unregistered name.
    pub fn set_order<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), RegistryError> {
        self.order = self.resolve(names)?;
        Ok(())
    }

    /// Processors in processing order whose pre-check accepts `content`.
    #[must_use]
    pub fn processors_for_content(&self, content: &str) -> Vec<&dyn Processor> {
        self.order
            .iter()
            .map(|&i| self.processors[i].as_ref())
            .filter(|p| p.can_process(content))
            .collect()
    }

    /// Run the configured order over `content`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if a processor fails hard.
    pub fn process(
        &self,
        content: &str,
        ctx: &ProcessingContext,
    ) -> Result<ProcessingResult, ProcessorError> {
        self.run_chain(content, ctx, &self.order)
    }

    /// Run the named processors in the given order over `content`.
    ///
    /// Each processor sees the previous one's output. Artifacts, warnings and
    /// block counts accumulate across the chain.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Registry`] for an unregistered name (before
    /// anything runs), or the first hard processor failure.
    pub fn process_content<S: AsRef<str>>(
        &self,
        content: &str,
        ctx: &ProcessingContext,
        names: &[S],
    ) -> Result<ProcessingResult, ProcessorError> {
        let order = self.resolve(names)?;
        self.run_chain(content, ctx, &order)
    }

    fn run_chain(
        &self,
        content: &str,
        ctx: &ProcessingContext,
        order: &[usize],
    ) -> Result<ProcessingResult, ProcessorError> {
        let mut result = ProcessingResult::unchanged(content);

        for &i in order {
            let processor = self.processors[i].as_ref();
            if !processor.can_process(&result.processed_content) {
                tracing::debug!(processor = processor.name(), "nothing to process");
                continue;
            }

            let stage = processor.process(&result.processed_content, ctx)?;
            tracing::debug!(
                processor = processor.name(),
                blocks = stage.blocks_processed,
                failed = stage.blocks_failed,
                artifacts = stage.artifacts.len(),
                "processed"
            );
            result.absorb(stage);
        }

        Ok(result)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.processors.iter().position(|p| p.name() == name)
    }

    fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, RegistryError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.index_of(name)
                    .ok_or_else(|| RegistryError::Unknown(name.to_owned()))
            })
            .collect()
    }
}
