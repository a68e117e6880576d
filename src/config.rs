//! Run configuration.
//!
//! The command line only selects components, so everything else comes
//! from environment variables:
//!
//! - `TRELLIS_SETUP_PYTHON` - interpreter to probe and install with
//! - `TRELLIS_SETUP_GIT` - git executable
//! - `TRELLIS_SETUP_TMPDIR` - parent directory of the workspace
//! - `TRELLIS_SETUP_NO_SUDO` - never prefix system installs with sudo
//! - `TRELLIS_SETUP_PLATFORM` - force `cuda`, `rocm` or `cpu`

use std::path::PathBuf;

use crate::environment::Platform;
use crate::shell::is_elevated;

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Interpreter program.
    pub python: String,
    /// Git program.
    pub git: String,
    /// Directory the workspace is created in.
    pub workspace_root: PathBuf,
    /// Prefix system package installs with `sudo`.
    pub use_sudo: bool,
    /// Platform override; detected when `None`.
    pub platform: Option<Platform>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            git: "git".to_string(),
            workspace_root: std::env::temp_dir(),
            use_sudo: !is_elevated(),
            platform: None,
        }
    }
}

impl SetupConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key: &str| std::env::var(key))
    }

    /// Load with a custom env var lookup function.
    pub fn from_lookup<F>(env_fn: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| env_fn(key).ok().filter(|v| !v.trim().is_empty());

        if let Some(python) = non_empty("TRELLIS_SETUP_PYTHON") {
            config.python = python;
        }
        if let Some(git) = non_empty("TRELLIS_SETUP_GIT") {
            config.git = git;
        }
        if let Some(root) = non_empty("TRELLIS_SETUP_TMPDIR") {
            config.workspace_root = PathBuf::from(root);
        }
        if non_empty("TRELLIS_SETUP_NO_SUDO").is_some() {
            config.use_sudo = false;
        }
        if let Some(name) = non_empty("TRELLIS_SETUP_PLATFORM") {
            match name.parse::<Platform>() {
                Ok(platform) => config.platform = Some(platform),
                Err(e) => tracing::warn!("Ignoring TRELLIS_SETUP_PLATFORM: {}", e),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().ok_or(std::env::VarError::NotPresent)
    }

    #[test]
    fn defaults_without_variables() {
        let config = SetupConfig::from_lookup(lookup(&[]));
        assert_eq!(config.python, "python");
        assert_eq!(config.git, "git");
        assert_eq!(config.workspace_root, std::env::temp_dir());
        assert!(config.platform.is_none());
    }

    #[test]
    fn overrides_programs_and_root() {
        let config = SetupConfig::from_lookup(lookup(&[
            ("TRELLIS_SETUP_PYTHON", "/opt/env/bin/python"),
            ("TRELLIS_SETUP_GIT", "/usr/local/bin/git"),
            ("TRELLIS_SETUP_TMPDIR", "/scratch"),
        ]));
        assert_eq!(config.python, "/opt/env/bin/python");
        assert_eq!(config.git, "/usr/local/bin/git");
        assert_eq!(config.workspace_root, PathBuf::from("/scratch"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let config = SetupConfig::from_lookup(lookup(&[("TRELLIS_SETUP_PYTHON", "  ")]));
        assert_eq!(config.python, "python");
    }

    #[test]
    fn no_sudo_disables_sudo() {
        let config = SetupConfig::from_lookup(lookup(&[("TRELLIS_SETUP_NO_SUDO", "1")]));
        assert!(!config.use_sudo);
    }

    #[test]
    fn platform_override_parses() {
        let config = SetupConfig::from_lookup(lookup(&[("TRELLIS_SETUP_PLATFORM", "rocm")]));
        assert_eq!(config.platform, Some(Platform::Rocm));
    }

    #[test]
    fn unknown_platform_is_ignored() {
        let config = SetupConfig::from_lookup(lookup(&[("TRELLIS_SETUP_PLATFORM", "tpu")]));
        assert!(config.platform.is_none());
    }
}
