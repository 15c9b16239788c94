//! `PlantUML` source preprocessing.
//!
//! Before rendering, block bodies are:
//! - wrapped in `@startuml`/`@enduml` when the author left them out
//! - expanded by inlining local `!include` files
//! - given a `skinparam dpi` line unless they set one themselves

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::consts::MAX_INCLUDE_DEPTH;

static INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)!include[ \t]+(.+?)[ \t]*$").unwrap());

static DPI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*skinparam[ \t]+dpi\b").unwrap());

/// Prepared diagram source with diagnostics.
#[derive(Debug)]
pub struct PrepareResult {
    pub source: String,
    /// Unresolved includes and similar problems.
    pub warnings: Vec<String>,
}

/// Indent every non-empty line of `content` with `indent`.
fn indent_content(content: &str, indent: &str) -> String {
    if indent.is_empty() {
        return content.to_owned();
    }
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inline `!include` directives, searching `search_dirs` in order.
///
/// Standard library includes (`!include <...>`) and URLs are left for the
/// renderer.
fn resolve_includes(
    source: &str,
    search_dirs: &[PathBuf],
    depth: usize,
    warnings: &mut Vec<String>,
) -> String {
    if depth > MAX_INCLUDE_DEPTH {
        warnings.push(format!(
            "Include depth exceeded maximum of {MAX_INCLUDE_DEPTH}"
        ));
        return source.to_owned();
    }

    INCLUDE_PATTERN
        .replace_all(source, |caps: &Captures<'_>| {
            let indent = &caps[1];
            let target = caps[2].trim_matches(['"', '\'']);

            if (target.starts_with('<') && target.ends_with('>')) || target.contains("://") {
                return caps[0].to_owned();
            }

            let found = search_dirs
                .iter()
                .map(|dir| dir.join(target))
                .find_map(|path| std::fs::read_to_string(path).ok());

            if let Some(content) = found {
                let resolved = resolve_includes(&content, search_dirs, depth + 1, warnings);
                indent_content(resolved.trim_end(), indent)
            } else {
                if search_dirs.is_empty() {
                    warnings.push(format!(
                        "Include file not found: '{target}' (no include directories configured)"
                    ));
                } else {
                    let searched: Vec<_> = search_dirs
                        .iter()
                        .map(|d| d.join(target).display().to_string())
                        .collect();
                    warnings.push(format!(
                        "Include file not found: '{target}' (searched: {})",
                        searched.join(", ")
                    ));
                }
                caps[0].to_owned()
            }
        })
        .into_owned()
}

/// Wrap bare diagram bodies in `@startuml`/`@enduml`.
fn ensure_wrapped(source: &str) -> String {
    if source.lines().any(|l| l.trim_start().starts_with("@start")) {
        source.to_owned()
    } else {
        format!("@startuml\n{}\n@enduml", source.trim_end())
    }
}

/// Insert `skinparam dpi` right after the `@start...` line.
fn inject_dpi(source: &str, dpi: u32) -> String {
    if DPI_PATTERN.is_match(source) {
        return source.to_owned();
    }

    let directive = format!("skinparam dpi {dpi}\n");
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        offset += line.len();
        if line.trim_start().starts_with("@start") {
            if !line.ends_with('\n') {
                return format!("{source}\n{directive}");
            }
            let mut result = String::with_capacity(source.len() + directive.len());
            result.push_str(&source[..offset]);
            result.push_str(&directive);
            result.push_str(&source[offset..]);
            return result;
        }
    }
    format!("{directive}{source}")
}

/// Prepare `PlantUML` source for rendering.
///
/// # Arguments
/// * `source` - Raw block body
/// * `search_dirs` - Directories searched for `!include` targets, in order
/// * `dpi` - Value for the injected `skinparam dpi`
#[must_use]
pub fn prepare_diagram_source(source: &str, search_dirs: &[PathBuf], dpi: u32) -> PrepareResult {
    let mut warnings = Vec::new();
    let wrapped = ensure_wrapped(source);
    let resolved = resolve_includes(&wrapped, search_dirs, 0, &mut warnings);

    PrepareResult {
        source: inject_dpi(&resolved, dpi),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::consts::DEFAULT_DPI;

    #[test]
    fn test_prepare_wrapped_source() {
        let result = prepare_diagram_source("@startuml\nAlice -> Bob\n@enduml", &[], DEFAULT_DPI);

        assert_eq!(
            result.source,
            "@startuml\nskinparam dpi 192\nAlice -> Bob\n@enduml"
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_bare_body_is_wrapped() {
        let result = prepare_diagram_source("Alice -> Bob\n", &[], 96);

        assert_eq!(
            result.source,
            "@startuml\nskinparam dpi 96\nAlice -> Bob\n@enduml"
        );
    }

    #[test]
    fn test_other_start_directives_not_wrapped() {
        let source = "@startmindmap\n* root\n@endmindmap";
        let result = prepare_diagram_source(source, &[], DEFAULT_DPI);

        assert_eq!(
            result.source,
            "@startmindmap\nskinparam dpi 192\n* root\n@endmindmap"
        );
    }

    #[test]
    fn test_existing_dpi_kept() {
        let source = "@startuml\nskinparam DPI 300\nA -> B\n@enduml";
        let result = prepare_diagram_source(source, &[], DEFAULT_DPI);

        assert_eq!(result.source, source);
    }

    #[test]
    fn test_content_before_startuml_preserved() {
        let source = "' comment\n@startuml\nA -> B\n@enduml";
        let result = prepare_diagram_source(source, &[], DEFAULT_DPI);

        assert_eq!(
            result.source,
            "' comment\n@startuml\nskinparam dpi 192\nA -> B\n@enduml"
        );
    }

    #[test]
    fn test_unresolved_include_warns_with_searched_paths() {
        let source = "@startuml\n!include missing.iuml\n@enduml";
        let result = prepare_diagram_source(source, &[PathBuf::from("/tmp/incl")], DEFAULT_DPI);

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("missing.iuml"));
        assert!(result.warnings[0].contains("/tmp/incl"));
        assert!(result.source.contains("!include missing.iuml"));
    }

    #[test]
    fn test_unresolved_include_without_dirs() {
        let source = "@startuml\n!include missing.iuml\n@enduml";
        let result = prepare_diagram_source(source, &[], DEFAULT_DPI);

        assert!(result.warnings[0].contains("no include directories"));
    }

    #[test]
    fn test_stdlib_and_url_includes_untouched() {
        let source = "@startuml\n!include <C4/C4_Container>\n!include https://example.com/x.puml\n@enduml";
        let result = prepare_diagram_source(source, &[], DEFAULT_DPI);

        assert!(result.warnings.is_empty());
        assert!(result.source.contains("!include <C4/C4_Container>"));
        assert!(result.source.contains("!include https://example.com/x.puml"));
    }

    #[test]
    fn test_include_resolved_with_indent() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("part.iuml"), "Line1\n\nLine3\n").unwrap();

        let source = "@startuml\nbox\n  !include part.iuml\nend box\n@enduml";
        let result = prepare_diagram_source(source, &[temp.path().to_path_buf()], DEFAULT_DPI);

        assert!(result.warnings.is_empty());
        assert!(result.source.contains("  Line1\n\n  Line3\nend box"));
        assert!(!result.source.contains("!include"));
    }

    #[test]
    fn test_first_search_dir_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("style.iuml"), "FromFirst").unwrap();
        fs::write(second.path().join("style.iuml"), "FromSecond").unwrap();

        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
        let result = prepare_diagram_source("!include \"style.iuml\"", &dirs, DEFAULT_DPI);

        assert!(result.source.contains("FromFirst"));
        assert!(!result.source.contains("FromSecond"));
    }

    #[test]
    fn test_nested_includes() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("inner.iuml"), "InnerContent").unwrap();
        fs::write(
            temp.path().join("outer.iuml"),
            "OuterBefore\n!include inner.iuml\nOuterAfter",
        )
        .unwrap();

        let source = "@startuml\n!include outer.iuml\n@enduml";
        let result = prepare_diagram_source(source, &[temp.path().to_path_buf()], DEFAULT_DPI);

        assert!(result.warnings.is_empty());
        assert!(
            result
                .source
                .contains("OuterBefore\nInnerContent\nOuterAfter")
        );
    }

    #[test]
    fn test_include_depth_limited() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("loop.iuml"), "!include loop.iuml\nContent").unwrap();

        let source = "@startuml\n!include loop.iuml\n@enduml";
        let result = prepare_diagram_source(source, &[temp.path().to_path_buf()], DEFAULT_DPI);

        assert!(result.warnings.iter().any(|w| w.contains("depth exceeded")));
    }
}
