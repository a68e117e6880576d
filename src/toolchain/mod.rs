//! External collaborators behind a trait.
//!
//! The interpreter, its package manager, git and the system package
//! manager are opaque external state. [`Toolchain`] is the only way the
//! orchestrator observes or mutates them, which keeps the installer
//! testable with [`MockToolchain`].
//!
//! Probes are never cached: every call asks the external tool again.

pub mod mock;
pub mod python;

pub use mock::{MockToolchain, ToolchainCall};
pub use python::PythonToolchain;

use serde::Deserialize;
use std::path::Path;

use crate::components::GitSource;
use crate::environment::Platform;
use crate::error::Result;

/// Version facts about the installed tensor runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TensorRuntime {
    /// Reported version string (e.g. "2.6.0+cu124").
    pub version: String,
    /// Whether an accelerator is usable.
    pub accelerator: bool,
}

/// A package-manager install request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipRequest {
    /// Requirement specs or local paths.
    pub targets: Vec<String>,
    /// Alternate package index.
    pub index_url: Option<String>,
    /// Build against the already-installed tensor runtime.
    pub no_build_isolation: bool,
}

impl PipRequest {
    /// Build-and-install request for a local source tree.
    pub fn local_tree(path: &Path) -> Self {
        Self {
            targets: vec![path.display().to_string()],
            index_url: None,
            no_build_isolation: true,
        }
    }
}

/// Operations the orchestrator delegates to external tools.
pub trait Toolchain {
    /// Interpreter version, or `None` if the interpreter cannot be run.
    fn interpreter_version(&self) -> Option<String>;

    /// Whether every module in `modules` imports cleanly.
    fn can_import(&self, modules: &[String]) -> bool;

    /// Installed tensor runtime, or `None` if it cannot be imported.
    fn tensor_runtime(&self) -> Option<TensorRuntime>;

    /// Detect the accelerator platform.
    fn detect_platform(&self) -> Platform;

    /// Install packages through the interpreter's package manager.
    fn pip_install(&self, request: &PipRequest) -> Result<()>;

    /// Clone a repository into `dest`.
    fn clone_source(&self, source: &GitSource, dest: &Path) -> Result<()>;

    /// Install system packages with the privileged package manager.
    fn system_install(&self, packages: &[String]) -> Result<()>;
}
