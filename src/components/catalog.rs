//! The compiled-in component table.
//!
//! Package pins, repository URLs and refs live here and nowhere else.
//! Only the basic dependencies carry a fallback (the accelerated image
//! codec falls back to the stock one) and a best-effort step (system
//! JPEG headers).

use super::descriptor::{Acquisition, ComponentDescriptor, GitSource, InstallStep};
use super::Component;
use crate::environment::Platform;

const BASIC_PACKAGES: &[&str] = &[
    "imageio",
    "imageio-ffmpeg",
    "tqdm",
    "easydict",
    "opencv-python-headless",
    "ninja",
    "trimesh",
    "transformers",
    "gradio==6.0.1",
    "tensorboard",
    "pandas",
    "lpips",
    "zstandard",
    "kornia",
    "timm",
];

const UTILS3D_SPEC: &str =
    "git+https://github.com/EasternJournalist/utils3d.git@9a4eb15e4021b67b12c460c7057d642626897ec8";

const FLASH_ATTN_SPEC: &str = "flash-attn==2.7.3";

/// The descriptor table for a platform, in install order.
pub fn catalog(platform: Platform) -> Vec<ComponentDescriptor> {
    Component::ALL
        .iter()
        .map(|component| descriptor_for(*component, platform))
        .collect()
}

/// The descriptor of one component.
pub fn descriptor_for(component: Component, platform: Platform) -> ComponentDescriptor {
    match component {
        Component::Basic => basic(),
        Component::FlashAttn => flash_attn(platform),
        Component::Nvdiffrast => from_source(
            component,
            "nvdiffrast.torch",
            git("https://github.com/NVlabs/nvdiffrast.git", Some("v0.4.0"), false, "nvdiffrast"),
        ),
        Component::Nvdiffrec => from_source(
            component,
            "nvdiffrec_render",
            git(
                "https://github.com/JeffreyXiang/nvdiffrec.git",
                Some("renderutils"),
                false,
                "nvdiffrec",
            ),
        ),
        Component::CuMesh => from_source(
            component,
            "cumesh",
            git("https://github.com/JeffreyXiang/CuMesh.git", None, true, "CuMesh"),
        ),
        Component::FlexGemm => from_source(
            component,
            "flex_gemm",
            git("https://github.com/JeffreyXiang/FlexGEMM.git", None, true, "FlexGEMM"),
        ),
        Component::OVoxel => ComponentDescriptor::new(component, ["o_voxel"])
            .requires_dir("o-voxel")
            .step(InstallStep::required(
                "build",
                Acquisition::LocalSource {
                    dir_name: "o-voxel".to_string(),
                },
            )),
    }
}

fn basic() -> ComponentDescriptor {
    ComponentDescriptor::new(
        Component::Basic,
        [
            "imageio", "easydict", "cv2", "trimesh", "transformers", "lpips", "kornia", "timm",
            "utils3d", "PIL",
        ],
    )
    .step(InstallStep::best_effort(
        "system libraries",
        Acquisition::SystemPackages {
            packages: vec!["libjpeg-dev".to_string()],
        },
    ))
    .step(InstallStep::required(
        "python packages",
        Acquisition::packages(BASIC_PACKAGES.iter().copied()),
    ))
    .step(InstallStep::required(
        "utils3d",
        Acquisition::packages([UTILS3D_SPEC]),
    ))
    .step(
        InstallStep::required("image codec", Acquisition::packages(["pillow-simd"]))
            .with_fallback(Acquisition::packages(["pillow"]))
            .provides(["PIL"]),
    )
}

fn flash_attn(platform: Platform) -> ComponentDescriptor {
    let desc = ComponentDescriptor::new(Component::FlashAttn, ["flash_attn"]);
    match platform {
        Platform::Rocm => desc.step(InstallStep::required(
            "build",
            Acquisition::RemoteSource(git(
                "https://github.com/ROCm/flash-attention.git",
                Some("v2.7.3-cktile"),
                true,
                "flash-attention",
            )),
        )),
        Platform::Cuda | Platform::Cpu => desc.step(InstallStep::required(
            "packages",
            Acquisition::Packages {
                specs: vec![FLASH_ATTN_SPEC.to_string()],
                index_url: None,
                no_build_isolation: true,
            },
        )),
    }
}

fn from_source(component: Component, module: &str, source: GitSource) -> ComponentDescriptor {
    ComponentDescriptor::new(component, [module])
        .step(InstallStep::required("build", Acquisition::RemoteSource(source)))
}

fn git(url: &str, git_ref: Option<&str>, recursive: bool, dir_name: &str) -> GitSource {
    GitSource {
        url: url.to_string(),
        git_ref: git_ref.map(str::to_string),
        recursive,
        dir_name: dir_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::StepPolicy;

    #[test]
    fn catalog_follows_install_order() {
        let order: Vec<_> = catalog(Platform::Cuda)
            .iter()
            .map(|d| d.component)
            .collect();
        assert_eq!(order, Component::ALL.to_vec());
    }

    #[test]
    fn only_basic_has_a_fallback() {
        for desc in catalog(Platform::Cuda) {
            let fallbacks = desc.steps.iter().filter(|s| s.fallback.is_some()).count();
            if desc.component == Component::Basic {
                assert_eq!(fallbacks, 1);
            } else {
                assert_eq!(fallbacks, 0, "{} has a fallback", desc.component);
            }
        }
    }

    #[test]
    fn only_system_packages_are_best_effort() {
        for desc in catalog(Platform::Rocm) {
            for step in &desc.steps {
                let is_system = matches!(step.primary, Acquisition::SystemPackages { .. });
                assert_eq!(is_system, step.policy == StepPolicy::BestEffort);
            }
        }
    }

    #[test]
    fn only_o_voxel_requires_a_local_directory() {
        let with_dir: Vec<_> = catalog(Platform::Cuda)
            .into_iter()
            .filter(|d| d.requires_dir.is_some())
            .map(|d| d.component)
            .collect();
        assert_eq!(with_dir, vec![Component::OVoxel]);
    }

    #[test]
    fn flash_attn_builds_from_source_on_rocm() {
        let desc = descriptor_for(Component::FlashAttn, Platform::Rocm);
        assert!(matches!(
            desc.steps[0].primary,
            Acquisition::RemoteSource(ref s) if s.url.contains("ROCm")
        ));

        let desc = descriptor_for(Component::FlashAttn, Platform::Cuda);
        assert!(matches!(desc.steps[0].primary, Acquisition::Packages { .. }));
    }

    #[test]
    fn every_component_has_probe_and_steps() {
        for desc in catalog(Platform::Cpu) {
            assert!(!desc.probe_modules.is_empty());
            assert!(!desc.steps.is_empty());
        }
    }
}
