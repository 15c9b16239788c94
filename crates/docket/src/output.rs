//! Colored terminal output.
//!
//! Status lines go to stderr so that `docket process` can stream the
//! processed document on stdout.

use console::{Style, Term};

/// How a status line is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Plain,
    Success,
    Warning,
    Error,
    Heading,
    Detail,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Plain => Style::new(),
            Self::Success => Style::new().green(),
            Self::Warning => Style::new().yellow(),
            Self::Error => Style::new().red(),
            Self::Heading => Style::new().cyan().bold(),
            Self::Detail => Style::new().dim(),
        }
    }

    fn render(self, msg: &str) -> String {
        if self == Self::Plain {
            return msg.to_owned();
        }
        self.style().apply_to(msg).to_string()
    }
}

pub(crate) struct Output {
    status: Term,
    document: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            status: Term::stderr(),
            document: Term::stdout(),
        }
    }

    fn line(&self, tone: Tone, msg: &str) {
        let _ = self.status.write_line(&tone.render(msg));
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(Tone::Plain, msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(Tone::Success, msg);
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(Tone::Warning, msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(Tone::Error, msg);
    }

    /// Collection or workflow title line.
    pub(crate) fn heading(&self, msg: &str) {
        self.line(Tone::Heading, msg);
    }

    /// Secondary lines under a heading or result (paths, fields).
    pub(crate) fn detail(&self, msg: &str) {
        self.line(Tone::Detail, msg);
    }

    /// Processed document text, unstyled, on stdout.
    pub(crate) fn content(&self, text: &str) {
        let _ = self.document.write_str(text);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_plain_is_never_styled() {
        assert_eq!(Tone::Plain.render("3 block(s) processed"), "3 block(s) processed");
    }

    #[test]
    fn test_tones_map_to_colors() {
        let forced = |tone: Tone| tone.style().force_styling(true).apply_to("x").to_string();

        assert!(forced(Tone::Success).starts_with("\u{1b}[32m"));
        assert!(forced(Tone::Warning).starts_with("\u{1b}[33m"));
        assert!(forced(Tone::Error).starts_with("\u{1b}[31m"));
        assert!(forced(Tone::Detail).starts_with("\u{1b}[2m"));
        assert!(forced(Tone::Heading).contains("\u{1b}[36m"));
    }
}
