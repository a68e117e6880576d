//! Error types for setup operations.
//!
//! This module defines [`SetupError`], the error type used throughout
//! the orchestrator, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Every `SetupError` is fatal: the run stops and the process exits 1
//! - Best-effort failures are never errors; they are reported as warnings
//! - Use `anyhow::Error` (via `SetupError::Other`) for unexpected errors
//! - Fatal errors name the failing component or step and, where one
//!   exists, a remedy (see [`SetupError::remedy`])

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for setup operations.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Command-line arguments could not be parsed.
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The interpreter is not reachable at all.
    #[error("Python interpreter '{program}' is not available")]
    RuntimeUnreachable { program: String },

    /// A required install step failed and has no fallback.
    #[error("Failed to install {component} ({step}): {message}")]
    InstallFailed {
        component: String,
        step: String,
        message: String,
    },

    /// A component's local source directory does not exist.
    #[error("Local source for {component} not found at {}", path.display())]
    MissingLocalSource { component: String, path: PathBuf },

    /// Install reported success but the component still fails its probe.
    #[error("{component} was installed but cannot be imported")]
    VerificationFailed { component: String },

    /// External command failed.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SetupError {
    /// Suggested corrective action for the user, if there is one.
    pub fn remedy(&self) -> Option<String> {
        match self {
            SetupError::RuntimeUnreachable { program } => Some(format!(
                "Activate the Python environment first (e.g. `conda activate <env>`) \
                 or point TRELLIS_SETUP_PYTHON at an interpreter. Tried: {}",
                program
            )),
            SetupError::MissingLocalSource { path, .. } => Some(format!(
                "Run from the repository root so that {} exists.",
                path.display()
            )),
            SetupError::InstallFailed { .. } => Some(
                "Check the output above, fix the cause and rerun the same command. \
                 Components that are already installed will be skipped."
                    .to_string(),
            ),
            SetupError::VerificationFailed { component } => Some(format!(
                "Inspect the build output for {} and make sure the toolchain \
                 matches the installed tensor runtime.",
                component
            )),
            _ => None,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Result type alias for setup operations.
pub type Result<T> = std::result::Result<T, SetupError>;
