//! Run report.
//!
//! The report is printed as the run progresses: requested components up
//! front, environment facts after the gate, one line per finished
//! component, and a summary once everything succeeded. A fatal error
//! ends the run before later components are reached, so they are never
//! mentioned.

use crate::components::{Component, Selection};
use crate::environment::EnvironmentReport;
use crate::installer::{ComponentResult, InstallOutcome};
use crate::ui::UserInterface;

/// Accumulated results of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    requested: Vec<Component>,
    environment: Option<EnvironmentReport>,
    results: Vec<ComponentResult>,
}

impl RunReport {
    /// Start a report for a selection.
    pub fn new(selection: &Selection) -> Self {
        Self {
            requested: selection.iter().collect(),
            ..Default::default()
        }
    }

    /// Requested components in install order.
    pub fn requested(&self) -> &[Component] {
        &self.requested
    }

    /// Environment facts, once the gate has passed.
    pub fn environment(&self) -> Option<&EnvironmentReport> {
        self.environment.as_ref()
    }

    /// Finished components in the order they completed.
    pub fn results(&self) -> &[ComponentResult] {
        &self.results
    }

    /// Outcome for one component, if it was reached.
    pub fn outcome_of(&self, component: Component) -> Option<InstallOutcome> {
        self.results
            .iter()
            .find(|r| r.component == component)
            .map(|r| r.outcome)
    }

    /// Every non-fatal warning raised during the run.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .flat_map(|r| r.warnings.iter().map(String::as_str))
    }

    /// Print the requested components.
    pub fn show_requested(&self, ui: &mut dyn UserInterface) {
        let names: Vec<&str> = self.requested.iter().map(Component::name).collect();
        ui.message(&format!("Requested: {}", names.join(", ")));
    }

    /// Record the gate's findings and print them.
    pub fn set_environment(&mut self, environment: EnvironmentReport, ui: &mut dyn UserInterface) {
        ui.message(&format!(
            "Python {} · torch {} · platform {} · accelerator {}",
            environment.interpreter_version,
            environment.tensor_runtime.version,
            environment.platform,
            if environment.tensor_runtime.accelerator {
                "available"
            } else {
                "unavailable"
            }
        ));
        self.environment = Some(environment);
    }

    /// Record one finished component and confirm it.
    pub fn record(&mut self, result: ComponentResult, ui: &mut dyn UserInterface) {
        match result.outcome {
            InstallOutcome::AlreadyPresent => {}
            InstallOutcome::Installed => {
                ui.success(&format!("{} installed", result.component));
            }
            InstallOutcome::InstalledWithFallback => {
                ui.success(&format!("{} installed (using fallback)", result.component));
            }
        }
        self.results.push(result);
    }

    /// Print the final summary.
    pub fn show_summary(&self, ui: &mut dyn UserInterface) {
        ui.show_header("Summary");
        for result in &self.results {
            let line = format!("{:<12} {}", result.component.name(), result.outcome);
            match result.outcome {
                InstallOutcome::AlreadyPresent => ui.skipped(&line),
                _ => ui.success(&line),
            }
        }

        let warnings: Vec<&str> = self.warnings().collect();
        if !warnings.is_empty() {
            ui.message(&format!("{} warning(s):", warnings.len()));
            for warning in warnings {
                ui.message(&format!("  - {}", warning));
            }
        }

        ui.success("Setup complete");
    }
}
