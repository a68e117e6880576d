//! Terminal UI.

use console::Term;
use std::io::Write;

use super::{ProgressSpinner, SetupTheme, SpinnerHandle, UserInterface};

/// UI writing to the real terminal.
///
/// Status goes to stdout, errors to stderr.
pub struct TerminalUI {
    out: Term,
    err: Term,
    theme: SetupTheme,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            theme: SetupTheme::detect(),
        }
    }
}

impl Default for TerminalUI {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInterface for TerminalUI {
    fn message(&mut self, msg: &str) {
        writeln!(self.out, "{}", msg).ok();
    }

    fn success(&mut self, msg: &str) {
        writeln!(self.out, "{}", self.theme.format_success(msg)).ok();
    }

    fn skipped(&mut self, msg: &str) {
        writeln!(self.out, "{}", self.theme.format_skipped(msg)).ok();
    }

    fn warning(&mut self, msg: &str) {
        writeln!(self.err, "{}", self.theme.format_warning(msg)).ok();
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.err, "{}", self.theme.format_error(msg)).ok();
    }

    fn hint(&mut self, msg: &str) {
        writeln!(self.err, "  {}", self.theme.dim.apply_to(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        writeln!(self.out, "\n{}", self.theme.format_header(title)).ok();
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.out.is_term() {
            Box::new(ProgressSpinner::new(message, self.theme.clone()))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }
}
