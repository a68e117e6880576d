//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.

use std::cell::RefCell;
use std::rc::Rc;

use super::{SpinnerHandle, UserInterface};

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    messages: Vec<String>,
    successes: Vec<String>,
    skips: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    hints: Vec<String>,
    headers: Vec<String>,
    spinners: Vec<String>,
    spinner_results: Rc<RefCell<Vec<String>>>,
}

impl MockUI {
    /// Create a new MockUI.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Get all captured success messages.
    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    /// Get all captured skipped messages.
    pub fn skips(&self) -> &[String] {
        &self.skips
    }

    /// Get all captured warning messages.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get all captured error messages.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Get all captured hints.
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Get all captured headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get all spinner messages that were started.
    pub fn spinners(&self) -> &[String] {
        &self.spinners
    }

    /// Get every spinner finish message, in order.
    pub fn spinner_results(&self) -> Vec<String> {
        self.spinner_results.borrow().clone()
    }

    /// Whether any captured line contains `needle`.
    pub fn has_output(&self, needle: &str) -> bool {
        self.messages
            .iter()
            .chain(&self.successes)
            .chain(&self.skips)
            .chain(&self.warnings)
            .chain(&self.errors)
            .chain(&self.hints)
            .chain(self.spinner_results.borrow().iter())
            .any(|line| line.contains(needle))
    }
}

impl UserInterface for MockUI {
    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn skipped(&mut self, msg: &str) {
        self.skips.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn hint(&mut self, msg: &str) {
        self.hints.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        self.spinners.push(message.to_string());
        Box::new(MockSpinner {
            results: Rc::clone(&self.spinner_results),
        })
    }
}

/// Spinner that records how it finished.
pub struct MockSpinner {
    results: Rc<RefCell<Vec<String>>>,
}

impl SpinnerHandle for MockSpinner {
    fn finish_success(&mut self, msg: &str) {
        self.results.borrow_mut().push(format!("success: {}", msg));
    }

    fn finish_error(&mut self, msg: &str) {
        self.results.borrow_mut().push(format!("error: {}", msg));
    }

    fn finish_skipped(&mut self, msg: &str) {
        self.results.borrow_mut().push(format!("skipped: {}", msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_messages_by_kind() {
        let mut ui = MockUI::new();
        ui.message("plain");
        ui.success("good");
        ui.warning("careful");
        ui.error("bad");
        ui.hint("try again");

        assert_eq!(ui.messages(), ["plain"]);
        assert_eq!(ui.successes(), ["good"]);
        assert_eq!(ui.warnings(), ["careful"]);
        assert_eq!(ui.errors(), ["bad"]);
        assert_eq!(ui.hints(), ["try again"]);
    }

    #[test]
    fn spinner_results_are_shared() {
        let mut ui = MockUI::new();
        let mut spinner = ui.start_spinner("Checking basic");
        spinner.finish_skipped("basic already installed");

        assert_eq!(ui.spinners(), ["Checking basic"]);
        assert_eq!(ui.spinner_results(), ["skipped: basic already installed"]);
        assert!(ui.has_output("already installed"));
    }
}
