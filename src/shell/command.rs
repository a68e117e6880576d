//! External command execution.
//!
//! Every external collaborator (interpreter, package manager, git,
//! system package manager) is run through [`execute`]. Programs are
//! spawned directly, not through a shell, so arguments never need
//! quoting. There is no timeout: a hung build blocks the run.
//!
//! Each program runs in its own process group and is tracked in the
//! [`ChildRegistry`] while it runs, so a termination signal can stop it.

use super::children::{lock_children, ChildRegistry};
use crate::error::{SetupError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Result of executing a command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output (empty unless captured).
    pub stdout: String,

    /// Standard error (empty unless captured).
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Capture stdout and stderr (if false, both inherit from parent).
    pub capture: bool,
}

impl CommandOptions {
    /// Options that capture all output.
    pub fn captured() -> Self {
        Self {
            capture: true,
            ..Default::default()
        }
    }
}

/// Render a program and its arguments for logs and error messages.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.to_string());
    for arg in args {
        if arg.contains(char::is_whitespace) {
            parts.push(format!("\"{}\"", arg));
        } else {
            parts.push(arg.clone());
        }
    }
    parts.join(" ")
}

/// Execute a program, waiting for it to finish.
///
/// Returns `Err` only when the program cannot be spawned. A non-zero
/// exit is reported through [`CommandResult::success`].
pub fn execute(program: &str, args: &[String], options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();
    let rendered = display_command(program, args);
    tracing::debug!("Running: {}", rendered);

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    if options.capture {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let registry = ChildRegistry::global();
    let child = {
        let mut children = lock_children(&registry);
        if children.is_shutting_down() {
            return Err(SetupError::CommandFailed {
                command: rendered,
                code: None,
            });
        }
        let child = cmd.spawn().map_err(|e| {
            tracing::debug!("Failed to spawn {}: {}", program, e);
            SetupError::CommandFailed {
                command: rendered.clone(),
                code: None,
            }
        })?;
        children.register(child.id());
        child
    };

    let pid = child.id();
    let output = child.wait_with_output();
    let shutting_down = {
        let mut children = lock_children(&registry);
        children.unregister(pid);
        children.is_shutting_down()
    };
    if shutting_down {
        // The signal thread removes the workspace and exits the process.
        loop {
            std::thread::park();
        }
    }
    let output = output?;

    let duration = start.elapsed();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    tracing::debug!(
        "{} exited with {:?} after {:?}",
        rendered,
        output.status.code(),
        duration
    );

    Ok(CommandResult {
        exit_code: output.status.code(),
        stdout,
        stderr,
        duration,
        success: output.status.success(),
    })
}

/// Execute a program and require a zero exit status.
pub fn execute_checked(program: &str, args: &[String], options: &CommandOptions) -> Result<CommandResult> {
    let result = execute(program, args, options)?;
    if result.success {
        Ok(result)
    } else {
        Err(SetupError::CommandFailed {
            command: display_command(program, args),
            code: result.exit_code,
        })
    }
}

/// Execute a program quietly and return success/failure.
pub fn execute_check(program: &str, args: &[String], cwd: Option<&Path>) -> bool {
    let options = CommandOptions {
        cwd: cwd.map(|p| p.to_path_buf()),
        ..CommandOptions::captured()
    };

    execute(program, args, &options)
        .map(|r| r.success)
        .unwrap_or(false)
}
