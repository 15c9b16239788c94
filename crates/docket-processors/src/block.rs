//! Fenced block detection.
//!
//! Documents mark processor input with tagged code fences:
//!
//! ````text
//! ```graphviz:flow {layout=neato}
//! digraph { a -> b }
//! ```
//! ````
//!
//! The tag selects the owning processor, the name identifies the block
//! within the document, and the optional braces carry `key=value` parameters.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::fence::FenceTracker;

static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^```([A-Za-z0-9_-]+):([\w-]+)[ \t]*(?:\{([^}\n]*)\})?[ \t]*\r?\n").unwrap()
});

static CLOSING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```[ \t]*\r?$").unwrap());

/// One fenced block owned by a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorBlock {
    /// Block name from the fence header.
    pub name: String,
    /// Raw body between the header and closing fence lines.
    pub content: String,
    /// Byte offset of the opening fence in the scanned document.
    pub start: usize,
    /// Byte offset just past the closing fence (before its line break).
    pub end: usize,
    /// Parameters parsed from the `{...}` header suffix.
    pub metadata: BTreeMap<String, String>,
}

impl ProcessorBlock {
    /// Byte range of the whole fence in the scanned document.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Header parameter by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The fence exactly as written in `document`.
    #[must_use]
    pub fn source<'a>(&self, document: &'a str) -> &'a str {
        &document[self.range()]
    }
}

/// Cheap check for at least one fence header with the given tag.
#[must_use]
pub fn has_fence(content: &str, tag: &str) -> bool {
    content.contains(&format!("```{tag}:"))
}

/// Extract all blocks fenced with `tag`, in document order.
///
/// Fences without a closing line are ignored. Block bodies are not scanned
/// for further headers, and neither is the inside of any other code fence.
#[must_use]
pub fn detect_fenced_blocks(content: &str, tag: &str) -> Vec<ProcessorBlock> {
    let mut blocks = Vec::new();
    let mut fences = FenceTracker::new();
    let mut pos = 0;

    while pos < content.len() {
        let line_end = content[pos..]
            .find('\n')
            .map_or(content.len(), |i| pos + i + 1);
        let line = &content[pos..line_end];

        let header = if fences.in_fence() {
            None
        } else {
            HEADER_PATTERN.captures(line)
        };
        let Some(caps) = header else {
            fences.update(line);
            pos = line_end;
            continue;
        };

        let Some(closing) = CLOSING_PATTERN.find_at(content, line_end) else {
            // Unterminated fence: nothing after it can close anything either
            break;
        };

        if &caps[1] == tag {
            let body = &content[line_end..closing.start()];
            let body = body.strip_suffix('\n').unwrap_or(body);
            let body = body.strip_suffix('\r').unwrap_or(body);

            blocks.push(ProcessorBlock {
                name: caps[2].to_owned(),
                content: body.to_owned(),
                start: pos,
                end: closing.end(),
                metadata: caps.get(3).map(|m| parse_params(m.as_str())).unwrap_or_default(),
            });
        }

        pos = closing.end();
    }

    blocks
}

/// Parse a flat `key=value, key2=value2` parameter list.
///
/// Whitespace around keys and values is ignored, and values may be wrapped
/// in single or double quotes. A bare key is read as `true`.
#[must_use]
pub fn parse_params(params: &str) -> BTreeMap<String, String> {
    params
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=').unwrap_or((entry, "true"));
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), unquote(value.trim()).to_owned()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
