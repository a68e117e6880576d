//! Run orchestration.
//!
//! [`Orchestrator::run`] drives one run: arm the workspace, pass the
//! environment gate, then install every selected component in install
//! order, strictly one at a time. The first fatal error is returned as
//! is; the workspace is released when `run` returns either way.
//!
//! - [`report`] - the run report

pub mod report;

pub use report::RunReport;

use std::path::PathBuf;

use crate::components::{catalog, Selection};
use crate::config::SetupConfig;
use crate::environment::prepare_environment;
use crate::error::Result;
use crate::installer::{install_component, InstallContext};
use crate::toolchain::Toolchain;
use crate::ui::UserInterface;
use crate::workspace::Workspace;

/// Drives a run.
pub struct Orchestrator<'a> {
    toolchain: &'a dyn Toolchain,
    config: &'a SetupConfig,
    invocation_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator for runs started from `invocation_dir`.
    pub fn new(
        toolchain: &'a dyn Toolchain,
        config: &'a SetupConfig,
        invocation_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            toolchain,
            config,
            invocation_dir: invocation_dir.into(),
        }
    }

    /// Install `selection`.
    pub fn run(&self, selection: Selection, ui: &mut dyn UserInterface) -> Result<RunReport> {
        let mut workspace = Workspace::new(&self.config.workspace_root);
        let mut report = RunReport::new(&selection);
        report.show_requested(ui);

        ui.show_header("Environment");
        let environment = prepare_environment(
            self.toolchain,
            &self.config.python,
            self.config.platform,
            ui,
        )?;
        let platform = environment.platform;
        report.set_environment(environment, ui);

        ui.show_header("Components");
        let mut ctx = InstallContext {
            toolchain: self.toolchain,
            workspace: &mut workspace,
            invocation_dir: &self.invocation_dir,
        };
        for desc in catalog(platform)
            .iter()
            .filter(|d| selection.contains(d.component))
        {
            let result = install_component(desc, &mut ctx, ui)?;
            report.record(result, ui);
        }

        report.show_summary(ui);
        Ok(report)
    }
}
