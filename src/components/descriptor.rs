//! Static install recipes.
//!
//! A [`ComponentDescriptor`] describes how to detect a component and how
//! to acquire it. Descriptors are compiled-in configuration; nothing
//! mutates them at runtime.

use super::Component;

/// A git repository to fetch and build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    /// Clone URL.
    pub url: String,
    /// Branch or tag to check out (`None` for the default branch).
    pub git_ref: Option<String>,
    /// Fetch nested submodules too.
    pub recursive: bool,
    /// Directory name inside the workspace.
    pub dir_name: String,
}

/// How a step obtains its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Install pinned packages through the interpreter's package manager.
    Packages {
        specs: Vec<String>,
        index_url: Option<String>,
        no_build_isolation: bool,
    },

    /// Clone a repository into the workspace, then build and install it.
    RemoteSource(GitSource),

    /// Copy a directory from the working directory into the workspace,
    /// then build and install the copy.
    LocalSource { dir_name: String },

    /// Install system libraries with the privileged package manager.
    SystemPackages { packages: Vec<String> },
}

impl Acquisition {
    /// Shorthand for a plain package install.
    pub fn packages<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Acquisition::Packages {
            specs: specs.into_iter().map(Into::into).collect(),
            index_url: None,
            no_build_isolation: false,
        }
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Acquisition::Packages { specs, .. } => format!("pip install {}", specs.join(" ")),
            Acquisition::RemoteSource(source) => match &source.git_ref {
                Some(git_ref) => format!("build {} ({})", source.url, git_ref),
                None => format!("build {}", source.url),
            },
            Acquisition::LocalSource { dir_name } => format!("build ./{}", dir_name),
            Acquisition::SystemPackages { packages } => {
                format!("system install {}", packages.join(" "))
            }
        }
    }
}

/// What a failed step means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure aborts the run (unless a fallback is defined).
    Required,
    /// Failure is logged as a warning and the run continues.
    BestEffort,
}

/// One step of a component's install recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    /// Label used in logs and error messages.
    pub label: String,
    /// The method tried first.
    pub primary: Acquisition,
    /// Tried when the primary fails. A failing fallback only warns.
    pub fallback: Option<Acquisition>,
    /// Consequence of an unrecovered failure.
    pub policy: StepPolicy,
    /// Modules that only this step supplies. They are left out of
    /// post-install verification when the step ends degraded.
    pub provides: Vec<String>,
}

impl InstallStep {
    /// A step whose failure aborts the run.
    pub fn required(label: impl Into<String>, primary: Acquisition) -> Self {
        Self {
            label: label.into(),
            primary,
            fallback: None,
            policy: StepPolicy::Required,
            provides: Vec::new(),
        }
    }

    /// A step whose failure only warns.
    pub fn best_effort(label: impl Into<String>, primary: Acquisition) -> Self {
        Self {
            label: label.into(),
            primary,
            fallback: None,
            policy: StepPolicy::BestEffort,
            provides: Vec::new(),
        }
    }

    /// Attach a fallback method.
    pub fn with_fallback(mut self, fallback: Acquisition) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Declare the modules this step alone supplies.
    pub fn provides<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = modules.into_iter().map(Into::into).collect();
        self
    }
}

/// The install recipe of one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Which component this describes.
    pub component: Component,
    /// Modules that must import for the component to count as installed.
    pub probe_modules: Vec<String>,
    /// Directory (relative to the working directory) that must exist
    /// before anything is attempted.
    pub requires_dir: Option<String>,
    /// Install steps, run in order.
    pub steps: Vec<InstallStep>,
}

impl ComponentDescriptor {
    /// Create a descriptor with no steps.
    pub fn new<I, S>(component: Component, probe_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            component,
            probe_modules: probe_modules.into_iter().map(Into::into).collect(),
            requires_dir: None,
            steps: Vec::new(),
        }
    }

    /// Require a local directory.
    pub fn requires_dir(mut self, dir_name: impl Into<String>) -> Self {
        self.requires_dir = Some(dir_name.into());
        self
    }

    /// Append a step.
    pub fn step(mut self, step: InstallStep) -> Self {
        self.steps.push(step);
        self
    }
}
