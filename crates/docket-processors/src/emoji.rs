//! Emoji shortcode substitution.
//!
//! Rewrites `:shortcode:` to the Unicode emoji outside fenced and inline
//! code. Unknown shortcodes are left as written.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::block::ProcessorBlock;
use crate::context::{ProcessingContext, ProcessingResult};
use crate::error::ProcessorError;
use crate::fence::{FenceTracker, inline_code_spans};
use crate::processor::Processor;
use crate::splice::Splice;

static SHORTCODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-z0-9_+-]+):").unwrap());

static EMOJI: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    [
        ("+1", "👍"),
        ("-1", "👎"),
        ("100", "💯"),
        ("airplane", "✈️"),
        ("alarm_clock", "⏰"),
        ("bell", "🔔"),
        ("book", "📖"),
        ("books", "📚"),
        ("briefcase", "💼"),
        ("bug", "🐛"),
        ("bulb", "💡"),
        ("calendar", "📆"),
        ("chart_with_upwards_trend", "📈"),
        ("check", "✔️"),
        ("clap", "👏"),
        ("clipboard", "📋"),
        ("coffee", "☕"),
        ("construction", "🚧"),
        ("cry", "😢"),
        ("dart", "🎯"),
        ("email", "📧"),
        ("envelope", "✉️"),
        ("eyes", "👀"),
        ("fire", "🔥"),
        ("gear", "⚙️"),
        ("grin", "😁"),
        ("handshake", "🤝"),
        ("heart", "❤️"),
        ("heavy_check_mark", "✔️"),
        ("hourglass", "⌛"),
        ("house", "🏠"),
        ("information_source", "ℹ️"),
        ("joy", "😂"),
        ("key", "🔑"),
        ("laughing", "😆"),
        ("link", "🔗"),
        ("lock", "🔒"),
        ("mag", "🔍"),
        ("memo", "📝"),
        ("moneybag", "💰"),
        ("muscle", "💪"),
        ("no_entry", "⛔"),
        ("ok_hand", "👌"),
        ("package", "📦"),
        ("paperclip", "📎"),
        ("pencil", "📝"),
        ("pencil2", "✏️"),
        ("phone", "☎️"),
        ("pray", "🙏"),
        ("pushpin", "📌"),
        ("question", "❓"),
        ("raised_hands", "🙌"),
        ("rocket", "🚀"),
        ("rotating_light", "🚨"),
        ("scroll", "📜"),
        ("see_no_evil", "🙈"),
        ("smile", "😄"),
        ("smiley", "😃"),
        ("sparkles", "✨"),
        ("star", "⭐"),
        ("sunglasses", "😎"),
        ("tada", "🎉"),
        ("thinking", "🤔"),
        ("thumbsdown", "👎"),
        ("thumbsup", "👍"),
        ("trophy", "🏆"),
        ("warning", "⚠️"),
        ("wave", "👋"),
        ("white_check_mark", "✅"),
        ("wink", "😉"),
        ("wrench", "🔧"),
        ("x", "❌"),
        ("zap", "⚡"),
    ]
    .into_iter()
    .collect()
});

/// Look up the emoji for a shortcode name (without colons).
#[must_use]
pub fn lookup(shortcode: &str) -> Option<&'static str> {
    EMOJI.get(shortcode).copied()
}

/// Replaces `:shortcode:` with Unicode emoji.
///
/// Each known shortcode occurrence is one block, named after the shortcode
/// with a `-N` suffix from the second occurrence on. No artifacts are
/// produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmojiProcessor;

impl EmojiProcessor {
    /// Processor name.
    pub const NAME: &'static str = "emoji";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Processor for EmojiProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_process(&self, content: &str) -> bool {
        known_shortcodes(content).next().is_some()
    }

    fn detect_blocks(&self, content: &str) -> Vec<ProcessorBlock> {
        let mut blocks = Vec::new();
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut fences = FenceTracker::new();
        let mut line_start = 0;

        for line in content.split_inclusive('\n') {
            let offset = line_start;
            line_start += line.len();

            if fences.update(line) || fences.in_fence() {
                continue;
            }

            let code_spans = inline_code_spans(line);
            for (whole, code) in known_shortcodes(line) {
                if code_spans.iter().any(|span| span.contains(&whole.start)) {
                    continue;
                }

                let seen = occurrences.entry(code).or_default();
                *seen += 1;
                let name = if *seen == 1 {
                    code.to_owned()
                } else {
                    format!("{code}-{seen}")
                };

                blocks.push(ProcessorBlock {
                    name,
                    content: code.to_owned(),
                    start: offset + whole.start,
                    end: offset + whole.end,
                    metadata: BTreeMap::new(),
                });
            }
        }

        blocks
    }

    fn process(
        &self,
        content: &str,
        _ctx: &ProcessingContext,
    ) -> Result<ProcessingResult, ProcessorError> {
        let blocks = self.detect_blocks(content);
        let mut splice = Splice::new(content);

        for block in &blocks {
            if let Some(emoji) = lookup(&block.content) {
                splice.replace(block.range(), emoji);
            }
        }

        Ok(ProcessingResult {
            processed_content: splice.apply(),
            blocks_processed: blocks.len(),
            ..ProcessingResult::default()
        })
    }
}

/// Known `:shortcode:` matches in `text`.
///
/// After an unknown code the scan resumes at its closing colon, which may
/// open the next shortcode (`9:30:smile:`).
fn known_shortcodes(text: &str) -> impl Iterator<Item = (Range<usize>, &str)> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while let Some(caps) = SHORTCODE_PATTERN.captures_at(text, pos) {
            let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
                return None;
            };
            if EMOJI.contains_key(code.as_str()) {
                pos = whole.end();
                return Some((whole.range(), code.as_str()));
            }
            pos = whole.end() - 1;
        }
        None
    })
}
