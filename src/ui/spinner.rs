//! Progress spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::theme::SetupTheme;
use super::SpinnerHandle;

/// A spinner shown while a probe runs.
///
/// Acquisitions are not wrapped in spinners: their build output goes
/// straight to the terminal.
pub struct ProgressSpinner {
    bar: ProgressBar,
    theme: SetupTheme,
    visible: bool,
}

impl ProgressSpinner {
    /// Create a new spinner with a message.
    pub fn new(message: &str, theme: SetupTheme) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.magenta} {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            theme,
            visible: true,
        }
    }

    /// Create a spinner that doesn't animate.
    ///
    /// Finish messages are still printed as plain lines so that logs
    /// captured from a pipe keep the probe results.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            theme: SetupTheme::plain(),
            visible: false,
        }
    }

    fn finish(&mut self, line: String) {
        if !self.visible {
            self.bar.finish();
            println!("{}", line);
            return;
        }
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            self.bar.set_style(style);
        }
        self.bar.finish_with_message(line);
    }
}

impl SpinnerHandle for ProgressSpinner {
    fn finish_success(&mut self, msg: &str) {
        let line = self.theme.format_success(msg);
        self.finish(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = self.theme.format_error(msg);
        self.finish(line);
    }

    fn finish_skipped(&mut self, msg: &str) {
        let line = self.theme.format_skipped(msg);
        self.finish(line);
    }
}

impl Drop for ProgressSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
