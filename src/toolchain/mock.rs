//! Mock toolchain for testing.
//!
//! `MockToolchain` keeps an in-memory set of importable modules and
//! records every acquisition call. Install targets can be configured to
//! make modules importable or to fail.
//!
//! # Example
//!
//! ```
//! use trellis_setup::toolchain::{MockToolchain, Toolchain, PipRequest};
//!
//! let toolchain = MockToolchain::new().provides("kornia", ["kornia"]);
//! assert!(!toolchain.can_import(&["kornia".to_string()]));
//!
//! let request = PipRequest { targets: vec!["kornia".into()], ..Default::default() };
//! toolchain.pip_install(&request).unwrap();
//! assert!(toolchain.can_import(&["kornia".to_string()]));
//! assert_eq!(toolchain.acquisition_count(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{PipRequest, TensorRuntime, Toolchain};
use crate::components::GitSource;
use crate::environment::Platform;
use crate::error::{Result, SetupError};

/// An acquisition performed through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainCall {
    /// `pip install` with these targets.
    PipInstall(Vec<String>),
    /// Repository clone.
    Clone { url: String, dest: PathBuf },
    /// System package install.
    SystemInstall(Vec<String>),
}

/// In-memory toolchain.
#[derive(Debug)]
pub struct MockToolchain {
    interpreter: Option<String>,
    tensor: RefCell<Option<TensorRuntime>>,
    platform: Platform,
    importable: RefCell<HashSet<String>>,
    provides: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    calls: RefCell<Vec<ToolchainCall>>,
    probes: Cell<usize>,
}

impl Default for MockToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToolchain {
    /// A reachable interpreter with the tensor runtime installed and
    /// nothing else importable.
    pub fn new() -> Self {
        Self {
            interpreter: Some("3.10.12".to_string()),
            tensor: RefCell::new(Some(TensorRuntime {
                version: "2.6.0+cu124".to_string(),
                accelerator: true,
            })),
            platform: Platform::Cuda,
            importable: RefCell::new(HashSet::new()),
            provides: HashMap::new(),
            failing: HashSet::new(),
            calls: RefCell::new(Vec::new()),
            probes: Cell::new(0),
        }
    }

    /// Make the interpreter unreachable.
    pub fn without_interpreter(mut self) -> Self {
        self.interpreter = None;
        self
    }

    /// Remove the tensor runtime. Installing a `torch==` spec restores it.
    pub fn without_tensor_runtime(self) -> Self {
        *self.tensor.borrow_mut() = None;
        self
    }

    /// Set the detected platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Mark modules as already importable.
    pub fn with_importable<I, S>(self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.importable
            .borrow_mut()
            .extend(modules.into_iter().map(Into::into));
        self
    }

    /// Installing `target` makes `modules` importable.
    ///
    /// For pip, `target` is a spec or the final path component of a
    /// local tree; for clones it is the URL.
    pub fn provides<I, S>(mut self, target: &str, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.insert(
            target.to_string(),
            modules.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Installing `target` fails.
    pub fn failing(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    /// Every acquisition call, in order.
    pub fn calls(&self) -> Vec<ToolchainCall> {
        self.calls.borrow().clone()
    }

    /// Number of acquisition calls.
    pub fn acquisition_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Number of import probes.
    pub fn probe_count(&self) -> usize {
        self.probes.get()
    }

    fn target_key(target: &str) -> String {
        let path = Path::new(target);
        path.file_name()
            .filter(|_| path.is_absolute())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| target.to_string())
    }

    fn fail(&self, command: String) -> Result<()> {
        Err(SetupError::CommandFailed {
            command,
            code: Some(1),
        })
    }

    fn grant(&self, key: &str) {
        if let Some(modules) = self.provides.get(key) {
            self.importable
                .borrow_mut()
                .extend(modules.iter().cloned());
        }
    }
}

impl Toolchain for MockToolchain {
    fn interpreter_version(&self) -> Option<String> {
        self.interpreter.clone()
    }

    fn can_import(&self, modules: &[String]) -> bool {
        self.probes.set(self.probes.get() + 1);
        let importable = self.importable.borrow();
        modules.iter().all(|m| importable.contains(m))
    }

    fn tensor_runtime(&self) -> Option<TensorRuntime> {
        self.tensor.borrow().clone()
    }

    fn detect_platform(&self) -> Platform {
        self.platform
    }

    fn pip_install(&self, request: &PipRequest) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(ToolchainCall::PipInstall(request.targets.clone()));

        let keys: Vec<String> = request.targets.iter().map(|t| Self::target_key(t)).collect();
        if keys.iter().any(|k| self.failing.contains(k)) {
            return self.fail(format!("pip install {}", request.targets.join(" ")));
        }

        for key in &keys {
            self.grant(key);
            if let Some(version) = key.strip_prefix("torch==") {
                *self.tensor.borrow_mut() = Some(TensorRuntime {
                    version: version.to_string(),
                    accelerator: false,
                });
            }
        }
        Ok(())
    }

    fn clone_source(&self, source: &GitSource, dest: &Path) -> Result<()> {
        self.calls.borrow_mut().push(ToolchainCall::Clone {
            url: source.url.clone(),
            dest: dest.to_path_buf(),
        });

        if self.failing.contains(&source.url) {
            return self.fail(format!("git clone {}", source.url));
        }

        std::fs::create_dir_all(dest)?;
        self.grant(&source.url);
        Ok(())
    }

    fn system_install(&self, packages: &[String]) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(ToolchainCall::SystemInstall(packages.to_vec()));

        if packages.iter().any(|p| self.failing.contains(p)) {
            return self.fail(format!("apt-get install -y {}", packages.join(" ")));
        }
        Ok(())
    }
}
