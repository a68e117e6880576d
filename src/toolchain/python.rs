//! The production toolchain: a Python interpreter, pip, git and apt.

use anyhow::{bail, Context};
use regex::Regex;
use std::path::Path;

use super::{PipRequest, TensorRuntime, Toolchain};
use crate::components::GitSource;
use crate::config::SetupConfig;
use crate::environment::Platform;
use crate::error::Result;
use crate::shell::{command_exists, execute, execute_check, execute_checked, CommandOptions};

const TENSOR_PROBE: &str = "import json, torch; \
print(json.dumps({'version': torch.__version__, 'accelerator': torch.cuda.is_available()}))";

/// Toolchain that shells out to real programs.
#[derive(Debug, Clone)]
pub struct PythonToolchain {
    python: String,
    git: String,
    use_sudo: bool,
}

impl PythonToolchain {
    /// Create a toolchain from run configuration.
    pub fn new(config: &SetupConfig) -> Self {
        Self {
            python: config.python.clone(),
            git: config.git.clone(),
            use_sudo: config.use_sudo,
        }
    }

    fn python_args(&self, script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    fn query_tensor_runtime(&self) -> anyhow::Result<TensorRuntime> {
        let result = execute(
            &self.python,
            &self.python_args(TENSOR_PROBE),
            &CommandOptions::captured(),
        )?;
        if !result.success {
            bail!("import torch failed: {}", result.stderr.trim());
        }
        let line = result
            .stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .context("tensor runtime probe printed nothing")?;
        serde_json::from_str(line.trim()).context("unexpected tensor runtime probe output")
    }
}

/// Pull a dotted version number out of interpreter banner text.
pub fn extract_version(text: &str) -> Option<String> {
    let re = Regex::new(r"(\d+\.\d+(?:\.\d+)?)").ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pick the first accelerator whose management tool runs successfully.
/// A tool that is installed but fails (no driver, no device) does not
/// count.
fn platform_from(tool_works: impl Fn(&str) -> bool) -> Platform {
    if tool_works("nvidia-smi") {
        Platform::Cuda
    } else if tool_works("rocminfo") {
        Platform::Rocm
    } else {
        Platform::Cpu
    }
}

impl Toolchain for PythonToolchain {
    fn interpreter_version(&self) -> Option<String> {
        let result = execute(
            &self.python,
            &["--version".to_string()],
            &CommandOptions::captured(),
        )
        .ok()?;
        if !result.success {
            return None;
        }
        let banner = format!("{}{}", result.stdout, result.stderr);
        Some(extract_version(&banner).unwrap_or_else(|| banner.trim().to_string()))
    }

    fn can_import(&self, modules: &[String]) -> bool {
        let script = format!("import {}", modules.join(", "));
        execute_check(&self.python, &self.python_args(&script), None)
    }

    fn tensor_runtime(&self) -> Option<TensorRuntime> {
        match self.query_tensor_runtime() {
            Ok(runtime) => Some(runtime),
            Err(e) => {
                tracing::debug!("Tensor runtime probe failed: {:#}", e);
                None
            }
        }
    }

    fn detect_platform(&self) -> Platform {
        platform_from(|tool| command_exists(tool) && execute_check(tool, &[], None))
    }

    fn pip_install(&self, request: &PipRequest) -> Result<()> {
        let mut args = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];
        args.extend(request.targets.iter().cloned());
        if let Some(index_url) = &request.index_url {
            args.push("--index-url".to_string());
            args.push(index_url.clone());
        }
        if request.no_build_isolation {
            args.push("--no-build-isolation".to_string());
        }
        let mut options = CommandOptions::default();
        options
            .env
            .insert("PIP_DISABLE_PIP_VERSION_CHECK".to_string(), "1".to_string());
        execute_checked(&self.python, &args, &options)?;
        Ok(())
    }

    fn clone_source(&self, source: &GitSource, dest: &Path) -> Result<()> {
        let mut args = vec!["clone".to_string()];
        if source.recursive {
            args.push("--recursive".to_string());
        }
        if let Some(git_ref) = &source.git_ref {
            args.push("-b".to_string());
            args.push(git_ref.clone());
        }
        args.push(source.url.clone());
        args.push(dest.display().to_string());
        execute_checked(&self.git, &args, &CommandOptions::default())?;
        Ok(())
    }

    fn system_install(&self, packages: &[String]) -> Result<()> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(packages.iter().cloned());
        if self.use_sudo {
            args.insert(0, "apt-get".to_string());
            execute_checked("sudo", &args, &CommandOptions::default())?;
        } else {
            execute_checked("apt-get", &args, &CommandOptions::default())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_version_from_banner() {
        assert_eq!(
            extract_version("Python 3.10.12\n"),
            Some("3.10.12".to_string())
        );
        assert_eq!(extract_version("Python 3.11"), Some("3.11".to_string()));
        assert_eq!(extract_version("no digits here"), None);
    }

    #[test]
    fn unreachable_interpreter_has_no_version() {
        let config = SetupConfig {
            python: "definitely-not-a-real-python-4242".to_string(),
            ..Default::default()
        };
        let toolchain = PythonToolchain::new(&config);
        assert!(toolchain.interpreter_version().is_none());
        assert!(toolchain.tensor_runtime().is_none());
        assert!(!toolchain.can_import(&["os".to_string()]));
    }

    #[cfg(unix)]
    #[test]
    fn reads_probe_output_from_fake_interpreter() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let fake = temp.path().join("python");
        std::fs::write(
            &fake,
            "#!/bin/sh\n\
             case \"$1\" in\n\
               --version) echo 'Python 3.10.12' ;;\n\
               -c) echo 'noise'; echo '{\"version\": \"2.6.0\", \"accelerator\": false}' ;;\n\
             esac\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = SetupConfig {
            python: fake.display().to_string(),
            ..Default::default()
        };
        let toolchain = PythonToolchain::new(&config);
        assert_eq!(toolchain.interpreter_version(), Some("3.10.12".to_string()));
        assert_eq!(
            toolchain.tensor_runtime(),
            Some(TensorRuntime {
                version: "2.6.0".to_string(),
                accelerator: false,
            })
        );
    }

    #[test]
    fn failing_accelerator_tool_is_skipped() {
        assert_eq!(platform_from(|tool| tool == "nvidia-smi"), Platform::Cuda);
        assert_eq!(platform_from(|tool| tool == "rocminfo"), Platform::Rocm);
        assert_eq!(platform_from(|_| false), Platform::Cpu);
    }
}
