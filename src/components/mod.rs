//! The closed set of installable components.
//!
//! - [`Component`] - the component enumeration, in install priority order
//! - [`Selection`] - which components a run was asked to install
//! - [`descriptor`] - static install recipes
//! - [`catalog`] - the compiled-in recipe table

pub mod catalog;
pub mod descriptor;

pub use catalog::{catalog, descriptor_for};
pub use descriptor::{Acquisition, ComponentDescriptor, GitSource, InstallStep, StepPolicy};

use std::collections::BTreeSet;
use std::fmt;

/// An installable component.
///
/// Variant order is the install order: the `Ord` derive makes a
/// [`Selection`] iterate basics first and the local-directory extension
/// last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Python dependencies shared by every extension.
    Basic,
    /// Attention kernels.
    FlashAttn,
    /// Differentiable rasterizer.
    Nvdiffrast,
    /// PBR render utilities.
    Nvdiffrec,
    /// Mesh processing kernels.
    CuMesh,
    /// Sparse GEMM kernels.
    FlexGemm,
    /// Voxel extension built from a directory in the working tree.
    OVoxel,
}

impl Component {
    /// Every component, in install order.
    pub const ALL: [Component; 7] = [
        Component::Basic,
        Component::FlashAttn,
        Component::Nvdiffrast,
        Component::Nvdiffrec,
        Component::CuMesh,
        Component::FlexGemm,
        Component::OVoxel,
    ];

    /// The component's name, identical to its command-line flag.
    pub fn name(&self) -> &'static str {
        match self {
            Component::Basic => "basic",
            Component::FlashAttn => "flash-attn",
            Component::Nvdiffrast => "nvdiffrast",
            Component::Nvdiffrec => "nvdiffrec",
            Component::CuMesh => "cumesh",
            Component::FlexGemm => "flexgemm",
            Component::OVoxel => "o-voxel",
        }
    }

    /// Whether `--all` selects this component.
    ///
    /// The local-directory extension needs a directory that only the
    /// caller can guarantee, so it must always be requested explicitly.
    pub fn in_aggregate(&self) -> bool {
        !matches!(self, Component::OVoxel)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of components requested for a run.
///
/// Built once from parsed arguments and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    components: BTreeSet<Component>,
}

impl Selection {
    /// Every component `--all` stands for.
    pub fn aggregate() -> Self {
        Component::ALL
            .iter()
            .copied()
            .filter(Component::in_aggregate)
            .collect()
    }

    /// Whether a component was requested.
    pub fn contains(&self, component: Component) -> bool {
        self.components.contains(&component)
    }

    /// Requested components in install order.
    pub fn iter(&self) -> impl Iterator<Item = Component> + '_ {
        self.components.iter().copied()
    }

    /// Number of requested components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<Component> for Selection {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}
