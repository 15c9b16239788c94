//! Processor registry construction from configuration.

use std::sync::Arc;

use docket_config::{ProcessorsConfig, RendererConfig};
use docket_processors::{
    AlwaysRegenerate, CommandRunner, DiagramLanguage, DiagramProcessor, EmojiProcessor,
    MtimePolicy, ProcessorRegistry, RegenerationPolicy, RegistryError,
};

/// Build the processor registry described by `config`.
///
/// Disabled renderers are not registered and are dropped from the order
/// silently; other unknown names in `config.order` are an error.
///
/// # Errors
///
/// Returns [`RegistryError::Unknown`] if the order names a processor that
/// does not exist.
pub fn build_registry(
    config: &ProcessorsConfig,
    runner: &Arc<dyn CommandRunner>,
) -> Result<ProcessorRegistry, RegistryError> {
    let policy: Arc<dyn RegenerationPolicy> = if config.force {
        Arc::new(AlwaysRegenerate)
    } else {
        Arc::new(MtimePolicy)
    };

    let mut builder = ProcessorRegistry::builder();
    let mut disabled = Vec::new();

    for (language, renderer) in [
        (DiagramLanguage::Graphviz, &config.graphviz),
        (DiagramLanguage::PlantUml, &config.plantuml),
        (DiagramLanguage::Mermaid, &config.mermaid),
    ] {
        if !renderer.enabled {
            disabled.push(language.tag());
            continue;
        }
        builder.register_boxed(Box::new(diagram_processor(
            language,
            renderer,
            config,
            runner,
            &policy,
        )))?;
    }
    builder.register_boxed(Box::new(EmojiProcessor::new()))?;

    let mut registry = builder.build();
    let order: Vec<&str> = config
        .order
        .iter()
        .map(String::as_str)
        .filter(|name| !disabled.contains(name))
        .collect();
    registry.set_order(&order)?;

    tracing::debug!(order = ?registry.order_names(), "built processor registry");
    Ok(registry)
}

fn diagram_processor(
    language: DiagramLanguage,
    renderer: &RendererConfig,
    config: &ProcessorsConfig,
    runner: &Arc<dyn CommandRunner>,
    policy: &Arc<dyn RegenerationPolicy>,
) -> DiagramProcessor {
    DiagramProcessor::new(language, Arc::clone(runner))
        .binary(&renderer.binary)
        .include_dirs(&config.include_dirs)
        .dpi(config.dpi)
        .timeout(config.timeout)
        .policy(Arc::clone(policy))
}

#[cfg(test)]
mod tests {
    use docket_processors::MockCommandRunner;

    use super::*;

    fn runner() -> Arc<dyn CommandRunner> {
        Arc::new(MockCommandRunner::missing())
    }

    #[test]
    fn test_default_order() {
        let registry = build_registry(&ProcessorsConfig::default(), &runner()).unwrap();

        assert_eq!(
            registry.order_names(),
            vec!["graphviz", "plantuml", "mermaid", "emoji"]
        );
    }

    #[test]
    fn test_disabled_renderer_dropped() {
        let mut config = ProcessorsConfig::default();
        config.mermaid.enabled = false;
        config.order = vec!["emoji".to_owned(), "mermaid".to_owned(), "graphviz".to_owned()];

        let registry = build_registry(&config, &runner()).unwrap();

        assert_eq!(registry.order_names(), vec!["emoji", "graphviz"]);
        assert!(registry.get("mermaid").is_none());
    }

    #[test]
    fn test_unknown_name_in_order() {
        let mut config = ProcessorsConfig::default();
        config.order = vec!["ditaa".to_owned()];

        let err = build_registry(&config, &runner()).unwrap_err();

        assert_eq!(err, RegistryError::Unknown("ditaa".to_owned()));
    }
}
