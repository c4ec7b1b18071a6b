//! Colored terminal output on stderr.

use console::{Style, Term};

/// How a line is styled.
#[derive(Clone, Copy)]
enum Tone {
    Plain,
    Success,
    Warning,
    Error,
    Highlight,
}

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
}

impl Output {
    /// Create a formatter writing to stderr.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn line(&self, tone: Tone, msg: &str) {
        let style = match tone {
            Tone::Plain => Style::new(),
            Tone::Success => Style::new().green(),
            Tone::Warning => Style::new().yellow(),
            Tone::Error => Style::new().red(),
            Tone::Highlight => Style::new().cyan().bold(),
        };
        let _ = self.term.write_line(&style.apply_to(msg).to_string());
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

    pub(crate) fn highlight(&self, msg: &str) {
        self.line(Tone::Highlight, msg);
    }

    /// Print an indented list entry.
    pub(crate) fn item(&self, msg: &str) {
        self.line(Tone::Plain, &format!("   - {msg}"));
    }
}
