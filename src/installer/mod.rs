//! The generic component installer.
//!
//! One routine, parameterized by a [`ComponentDescriptor`]:
//!
//! 1. probe: if the component already imports, stop (`AlreadyPresent`)
//! 2. precondition: a required local directory must exist
//! 3. acquire every step, trying its fallback when the primary fails
//! 4. verify: the probe must pass now, except for modules supplied only
//!    by a step that ended degraded (warned, not fatal)
//!
//! Any unrecovered failure of a required step is returned as an error
//! and ends the run. Nothing is retried.

use std::collections::HashSet;
use std::path::Path;

use crate::components::{Acquisition, Component, ComponentDescriptor, InstallStep, StepPolicy};
use crate::error::{Result, SetupError};
use crate::toolchain::{PipRequest, Toolchain};
use crate::ui::UserInterface;
use crate::workspace::{copy_tree, Workspace};

/// How a component ended up installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The probe passed before anything was done.
    AlreadyPresent,
    /// Installed with every primary method.
    Installed,
    /// Installed, with at least one step satisfied by its fallback.
    InstalledWithFallback,
}

impl std::fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstallOutcome::AlreadyPresent => "already installed",
            InstallOutcome::Installed => "installed",
            InstallOutcome::InstalledWithFallback => "installed (fallback)",
        };
        write!(f, "{}", s)
    }
}

/// Result of installing one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentResult {
    /// The component.
    pub component: Component,
    /// How it was satisfied.
    pub outcome: InstallOutcome,
    /// Best-effort or fallback failures that did not stop the run.
    pub warnings: Vec<String>,
}

/// Everything the installer needs besides the descriptor.
pub struct InstallContext<'a> {
    /// External tools.
    pub toolchain: &'a dyn Toolchain,
    /// Staging directory for source builds.
    pub workspace: &'a mut Workspace,
    /// Directory the run was started from.
    pub invocation_dir: &'a Path,
}

/// Install one component.
pub fn install_component(
    desc: &ComponentDescriptor,
    ctx: &mut InstallContext<'_>,
    ui: &mut dyn UserInterface,
) -> Result<ComponentResult> {
    let component = desc.component;

    let mut spinner = ui.start_spinner(&format!("Checking {}", component));
    if ctx.toolchain.can_import(&desc.probe_modules) {
        spinner.finish_skipped(&format!("{} already installed", component));
        tracing::info!("{} already installed, skipping", component);
        return Ok(ComponentResult {
            component,
            outcome: InstallOutcome::AlreadyPresent,
            warnings: Vec::new(),
        });
    }
    drop(spinner);

    if let Some(dir_name) = &desc.requires_dir {
        let path = ctx.invocation_dir.join(dir_name);
        if !path.is_dir() {
            return Err(SetupError::MissingLocalSource {
                component: component.to_string(),
                path,
            });
        }
    }

    ui.show_header(&format!("Installing {}", component));

    let mut used_fallback = false;
    let mut warnings = Vec::new();
    let mut unverified: HashSet<&str> = HashSet::new();
    for step in &desc.steps {
        match run_step(component, step, ctx, ui)? {
            StepOutcome::Primary => {}
            StepOutcome::Fallback => used_fallback = true,
            StepOutcome::Degraded(warning) => {
                warnings.push(warning);
                unverified.extend(step.provides.iter().map(String::as_str));
            }
        }
    }

    let verify: Vec<String> = desc
        .probe_modules
        .iter()
        .filter(|m| !unverified.contains(m.as_str()))
        .cloned()
        .collect();
    if !unverified.is_empty() {
        tracing::warn!(
            "{}: not verifying {:?} after degraded steps",
            component,
            unverified
        );
    }
    if !ctx.toolchain.can_import(&verify) {
        return Err(SetupError::VerificationFailed {
            component: component.to_string(),
        });
    }

    let outcome = if used_fallback {
        InstallOutcome::InstalledWithFallback
    } else {
        InstallOutcome::Installed
    };
    tracing::info!("{} {}", component, outcome);

    Ok(ComponentResult {
        component,
        outcome,
        warnings,
    })
}

enum StepOutcome {
    Primary,
    Fallback,
    Degraded(String),
}

fn run_step(
    component: Component,
    step: &InstallStep,
    ctx: &mut InstallContext<'_>,
    ui: &mut dyn UserInterface,
) -> Result<StepOutcome> {
    ui.message(&format!("→ {}: {}", step.label, step.primary.describe()));

    let primary_err = match acquire(&step.primary, ctx) {
        Ok(()) => return Ok(StepOutcome::Primary),
        Err(e) => e,
    };

    if let Some(fallback) = &step.fallback {
        tracing::warn!(
            "{} {} failed ({}), trying fallback",
            component,
            step.label,
            primary_err
        );
        ui.warning(&format!(
            "{} failed, falling back to {}",
            step.primary.describe(),
            fallback.describe()
        ));
        return match acquire(fallback, ctx) {
            Ok(()) => Ok(StepOutcome::Fallback),
            Err(e) => {
                let warning = format!("{} {}: fallback failed: {}", component, step.label, e);
                tracing::warn!("{}", warning);
                ui.warning(&warning);
                Ok(StepOutcome::Degraded(warning))
            }
        };
    }

    match step.policy {
        StepPolicy::BestEffort => {
            let warning = format!("{} {}: {}", component, step.label, primary_err);
            tracing::warn!("{}", warning);
            ui.warning(&warning);
            Ok(StepOutcome::Degraded(warning))
        }
        StepPolicy::Required => Err(SetupError::InstallFailed {
            component: component.to_string(),
            step: step.label.clone(),
            message: primary_err.to_string(),
        }),
    }
}

fn acquire(acquisition: &Acquisition, ctx: &mut InstallContext<'_>) -> Result<()> {
    match acquisition {
        Acquisition::Packages {
            specs,
            index_url,
            no_build_isolation,
        } => ctx.toolchain.pip_install(&PipRequest {
            targets: specs.clone(),
            index_url: index_url.clone(),
            no_build_isolation: *no_build_isolation,
        }),
        Acquisition::RemoteSource(source) => {
            let dest = ctx.workspace.staging_dir(&source.dir_name)?;
            ctx.toolchain.clone_source(source, &dest)?;
            ctx.toolchain.pip_install(&PipRequest::local_tree(&dest))
        }
        Acquisition::LocalSource { dir_name } => {
            let src = ctx.invocation_dir.join(dir_name);
            let dest = ctx.workspace.staging_dir(dir_name)?;
            let files = copy_tree(&src, &dest)?;
            tracing::debug!("Copied {} files from {}", files, src.display());
            ctx.toolchain.pip_install(&PipRequest::local_tree(&dest))
        }
        Acquisition::SystemPackages { packages } => ctx.toolchain.system_install(packages),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{descriptor_for, GitSource};
    use crate::environment::Platform;
    use crate::toolchain::{MockToolchain, ToolchainCall};
    use crate::ui::MockUI;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        cwd: TempDir,
        workspace: Workspace,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let workspace = Workspace::new(root.path());
            Self {
                _root: root,
                cwd: TempDir::new().unwrap(),
                workspace,
            }
        }

        fn install(
            &mut self,
            desc: &ComponentDescriptor,
            toolchain: &MockToolchain,
            ui: &mut MockUI,
        ) -> Result<ComponentResult> {
            let mut ctx = InstallContext {
                toolchain,
                workspace: &mut self.workspace,
                invocation_dir: self.cwd.path(),
            };
            install_component(desc, &mut ctx, ui)
        }
    }

    fn simple(component: Component) -> ComponentDescriptor {
        ComponentDescriptor::new(component, ["mod_a"])
            .step(InstallStep::required("packages", Acquisition::packages(["pkg-a==1.0"])))
    }

    #[test]
    fn satisfied_probe_skips_everything() {
        let mut fx = Fixture::new();
        let toolchain = MockToolchain::new().with_importable(["mod_a"]);
        let mut ui = MockUI::new();

        let result = fx
            .install(&simple(Component::Basic), &toolchain, &mut ui)
            .unwrap();

        assert_eq!(result.outcome, InstallOutcome::AlreadyPresent);
        assert_eq!(toolchain.acquisition_count(), 0);
        assert!(!fx.workspace.exists());
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut fx = Fixture::new();
        let toolchain = MockToolchain::new().provides("pkg-a==1.0", ["mod_a"]);
        let desc = simple(Component::Basic);
        let mut ui = MockUI::new();

        let first = fx.install(&desc, &toolchain, &mut ui).unwrap();
        assert_eq!(first.outcome, InstallOutcome::Installed);
        assert_eq!(toolchain.acquisition_count(), 1);

        let second = fx.install(&desc, &toolchain, &mut ui).unwrap();
        assert_eq!(second.outcome, InstallOutcome::AlreadyPresent);
        assert_eq!(toolchain.acquisition_count(), 1);
    }

    #[test]
    fn required_failure_names_component_and_step() {
        let mut fx = Fixture::new();
        let toolchain = MockToolchain::new().failing("pkg-a==1.0");
        let mut ui = MockUI::new();

        let err = fx
            .install(&simple(Component::FlashAttn), &toolchain, &mut ui)
            .unwrap_err();

        match err {
            SetupError::InstallFailed {
                component, step, ..
            } => {
                assert_eq!(component, "flash-attn");
                assert_eq!(step, "packages");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nominal_success_that_does_not_import_is_fatal() {
        let mut fx = Fixture::new();
        let toolchain = MockToolchain::new();
        let mut ui = MockUI::new();

        let err = fx
            .install(&simple(Component::CuMesh), &toolchain, &mut ui)
            .unwrap_err();

        assert!(matches!(err, SetupError::VerificationFailed { ref component } if component == "cumesh"));
        assert_eq!(toolchain.acquisition_count(), 1);
    }

    #[test]
    fn fallback_recovers_primary_failure() {
        let mut fx = Fixture::new();
        let desc = ComponentDescriptor::new(Component::Basic, ["PIL"]).step(
            InstallStep::required("image codec", Acquisition::packages(["pillow-simd"]))
                .with_fallback(Acquisition::packages(["pillow"])),
        );
        let toolchain = MockToolchain::new()
            .failing("pillow-simd")
            .provides("pillow", ["PIL"]);
        let mut ui = MockUI::new();

        let result = fx.install(&desc, &toolchain, &mut ui).unwrap();

        assert_eq!(result.outcome, InstallOutcome::InstalledWithFallback);
        assert_eq!(
            toolchain.calls(),
            vec![
                ToolchainCall::PipInstall(vec!["pillow-simd".into()]),
                ToolchainCall::PipInstall(vec!["pillow".into()]),
            ]
        );
        assert_eq!(ui.warnings().len(), 1);
    }

    #[test]
    fn failed_fallback_only_warns() {
        let mut fx = Fixture::new();
        let desc = ComponentDescriptor::new(Component::Basic, ["imageio"])
            .step(InstallStep::required("deps", Acquisition::packages(["imageio"])))
            .step(
                InstallStep::required("image codec", Acquisition::packages(["pillow-simd"]))
                    .with_fallback(Acquisition::packages(["pillow"])),
            );
        let toolchain = MockToolchain::new()
            .provides("imageio", ["imageio"])
            .failing("pillow-simd")
            .failing("pillow");
        let mut ui = MockUI::new();

        let result = fx.install(&desc, &toolchain, &mut ui).unwrap();

        assert_eq!(result.outcome, InstallOutcome::Installed);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("fallback failed"));
    }

    #[test]
    fn basic_survives_both_image_codecs_failing() {
        let mut fx = Fixture::new();
        let desc = descriptor_for(Component::Basic, Platform::Cuda);
        let toolchain = MockToolchain::new()
            .with_importable([
                "imageio", "easydict", "cv2", "trimesh", "transformers", "lpips", "kornia", "timm",
                "utils3d",
            ])
            .failing("pillow-simd")
            .failing("pillow");
        let mut ui = MockUI::new();

        let result = fx.install(&desc, &toolchain, &mut ui).unwrap();

        assert_eq!(result.outcome, InstallOutcome::Installed);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("image codec"));
        assert!(!toolchain.can_import(&["PIL".to_string()]));
    }

    #[test]
    fn degraded_step_does_not_excuse_other_modules() {
        let mut fx = Fixture::new();
        let desc = descriptor_for(Component::Basic, Platform::Cuda);
        let toolchain = MockToolchain::new()
            .with_importable(["imageio", "easydict", "cv2"])
            .failing("pillow-simd")
            .failing("pillow");
        let mut ui = MockUI::new();

        let err = fx.install(&desc, &toolchain, &mut ui).unwrap_err();
        assert!(matches!(err, SetupError::VerificationFailed { .. }));
    }

    #[test]
    fn best_effort_failure_only_warns() {
        let mut fx = Fixture::new();
        let desc = ComponentDescriptor::new(Component::Basic, ["imageio"])
            .step(InstallStep::best_effort(
                "system libraries",
                Acquisition::SystemPackages {
                    packages: vec!["libjpeg-dev".into()],
                },
            ))
            .step(InstallStep::required("deps", Acquisition::packages(["imageio"])));
        let toolchain = MockToolchain::new()
            .failing("libjpeg-dev")
            .provides("imageio", ["imageio"]);
        let mut ui = MockUI::new();

        let result = fx.install(&desc, &toolchain, &mut ui).unwrap();

        assert_eq!(result.outcome, InstallOutcome::Installed);
        assert_eq!(result.warnings.len(), 1);
        assert!(ui.warnings()[0].contains("libjpeg-dev"));
    }

    #[test]
    fn remote_source_is_cloned_into_workspace_then_built() {
        let mut fx = Fixture::new();
        let desc = descriptor_for(Component::Nvdiffrast, Platform::Cuda);
        let url = "https://github.com/NVlabs/nvdiffrast.git";
        let toolchain = MockToolchain::new().provides(url, ["nvdiffrast.torch"]);
        let mut ui = MockUI::new();

        fx.install(&desc, &toolchain, &mut ui).unwrap();

        let dest = fx.workspace.path().join("nvdiffrast");
        assert_eq!(
            toolchain.calls(),
            vec![
                ToolchainCall::Clone {
                    url: url.to_string(),
                    dest: dest.clone(),
                },
                ToolchainCall::PipInstall(vec![dest.display().to_string()]),
            ]
        );
    }

    #[test]
    fn clone_failure_is_fatal() {
        let mut fx = Fixture::new();
        let source = GitSource {
            url: "https://example.com/broken.git".into(),
            git_ref: Some("main".into()),
            recursive: true,
            dir_name: "broken".into(),
        };
        let desc = ComponentDescriptor::new(Component::FlexGemm, ["flex_gemm"])
            .step(InstallStep::required("build", Acquisition::RemoteSource(source)));
        let toolchain = MockToolchain::new().failing("https://example.com/broken.git");
        let mut ui = MockUI::new();

        let err = fx.install(&desc, &toolchain, &mut ui).unwrap_err();
        assert!(matches!(err, SetupError::InstallFailed { .. }));
        assert_eq!(toolchain.acquisition_count(), 1);
    }

    #[test]
    fn missing_local_directory_fails_before_workspace_exists() {
        let mut fx = Fixture::new();
        let desc = descriptor_for(Component::OVoxel, Platform::Cuda);
        let toolchain = MockToolchain::new();
        let mut ui = MockUI::new();

        let err = fx.install(&desc, &toolchain, &mut ui).unwrap_err();

        assert!(matches!(err, SetupError::MissingLocalSource { .. }));
        assert!(!fx.workspace.exists());
        assert_eq!(toolchain.acquisition_count(), 0);
    }

    #[test]
    fn local_source_is_copied_not_moved() {
        let mut fx = Fixture::new();
        let local = fx.cwd.path().join("o-voxel");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("setup.py"), "setup()").unwrap();

        let desc = descriptor_for(Component::OVoxel, Platform::Cuda);
        let toolchain = MockToolchain::new().provides("o-voxel", ["o_voxel"]);
        let mut ui = MockUI::new();

        let result = fx.install(&desc, &toolchain, &mut ui).unwrap();

        assert_eq!(result.outcome, InstallOutcome::Installed);
        assert!(local.join("setup.py").exists());
        assert!(fx.workspace.path().join("o-voxel/setup.py").exists());
    }
}
