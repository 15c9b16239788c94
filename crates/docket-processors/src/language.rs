//! Diagram languages and output formats.

/// Supported diagram languages, each rendered by a local CLI tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramLanguage {
    Graphviz,
    PlantUml,
    Mermaid,
}

impl DiagramLanguage {
    /// Parse a language from a fence tag or common alias.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "graphviz" | "dot" => Some(Self::Graphviz),
            "plantuml" | "puml" => Some(Self::PlantUml),
            "mermaid" | "mmd" => Some(Self::Mermaid),
            _ => None,
        }
    }

    /// Fence tag, also used as the processor name.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Graphviz => "graphviz",
            Self::PlantUml => "plantuml",
            Self::Mermaid => "mermaid",
        }
    }

    /// Renderer executable looked up on `PATH` by default.
    #[must_use]
    pub fn default_binary(self) -> &'static str {
        match self {
            Self::Graphviz => "dot",
            Self::PlantUml => "plantuml",
            Self::Mermaid => "mmdc",
        }
    }

    /// Extension of the intermediate source file.
    #[must_use]
    pub fn source_extension(self) -> &'static str {
        match self {
            Self::Graphviz => "dot",
            Self::PlantUml => "puml",
            Self::Mermaid => "mmd",
        }
    }

    /// Block parameters this language understands.
    #[must_use]
    pub fn known_params(self) -> &'static [&'static str] {
        match self {
            Self::Graphviz => &["layout"],
            Self::PlantUml => &[],
            Self::Mermaid => &["theme", "background"],
        }
    }

    /// Whether the renderer reads source on stdin and writes the image to
    /// stdout instead of using file arguments.
    #[must_use]
    pub fn renders_to_stdout(self) -> bool {
        matches!(self, Self::PlantUml)
    }
}

/// Graphviz layout engines accepted for the `layout` parameter.
pub const GRAPHVIZ_LAYOUTS: [&str; 8] = [
    "dot", "neato", "fdp", "sfdp", "circo", "twopi", "osage", "patchwork",
];

/// Output format for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramFormat {
    #[default]
    Png,
    Svg,
}

impl DiagramFormat {
    /// Parse format from a file extension.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}
