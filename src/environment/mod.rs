//! Environment gate.
//!
//! Runs before any component: the interpreter must be reachable, and the
//! tensor runtime must be importable. A missing tensor runtime is
//! installed once at a pinned version; an existing one is never upgraded.
//!
//! - [`platform`] - accelerator platform detection and its pinned index

pub mod platform;

pub use platform::Platform;

use crate::error::{Result, SetupError};
use crate::toolchain::{PipRequest, TensorRuntime, Toolchain};
use crate::ui::UserInterface;

/// Pinned tensor runtime packages.
pub const TENSOR_RUNTIME_SPECS: &[&str] = &["torch==2.6.0", "torchvision==0.21.0"];

/// What the gate found (and did).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// Interpreter version.
    pub interpreter_version: String,
    /// Accelerator platform the run targets.
    pub platform: Platform,
    /// Tensor runtime after the gate.
    pub tensor_runtime: TensorRuntime,
    /// Whether the gate had to install the tensor runtime.
    pub installed_tensor_runtime: bool,
}

/// Check the interpreter and tensor runtime, installing the latter if
/// it is missing.
///
/// `python` is only used for messages. `platform` overrides detection.
pub fn prepare_environment(
    toolchain: &dyn Toolchain,
    python: &str,
    platform: Option<Platform>,
    ui: &mut dyn UserInterface,
) -> Result<EnvironmentReport> {
    let mut spinner = ui.start_spinner("Checking Python interpreter");
    let Some(interpreter_version) = toolchain.interpreter_version() else {
        spinner.finish_error("Python interpreter not found");
        return Err(SetupError::RuntimeUnreachable {
            program: python.to_string(),
        });
    };
    spinner.finish_success(&format!("Python {}", interpreter_version));

    let platform = platform.unwrap_or_else(|| toolchain.detect_platform());
    tracing::info!("Targeting platform {}", platform);

    let mut spinner = ui.start_spinner("Checking tensor runtime");
    if let Some(runtime) = toolchain.tensor_runtime() {
        spinner.finish_success(&format!(
            "torch {} (accelerator {})",
            runtime.version,
            if runtime.accelerator { "available" } else { "unavailable" }
        ));
        return Ok(EnvironmentReport {
            interpreter_version,
            platform,
            tensor_runtime: runtime,
            installed_tensor_runtime: false,
        });
    }
    spinner.finish_skipped("torch not found, installing pinned version");

    let request = PipRequest {
        targets: TENSOR_RUNTIME_SPECS.iter().map(|s| s.to_string()).collect(),
        index_url: Some(platform.tensor_index_url().to_string()),
        no_build_isolation: false,
    };
    toolchain
        .pip_install(&request)
        .map_err(|e| SetupError::InstallFailed {
            component: "torch".to_string(),
            step: "tensor runtime".to_string(),
            message: e.to_string(),
        })?;

    let runtime = toolchain
        .tensor_runtime()
        .ok_or_else(|| SetupError::VerificationFailed {
            component: "torch".to_string(),
        })?;
    ui.success(&format!("Installed torch {}", runtime.version));

    Ok(EnvironmentReport {
        interpreter_version,
        platform,
        tensor_runtime: runtime,
        installed_tensor_runtime: true,
    })
}
