//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is [`parse_args`], which turns raw arguments into
//! an [`Invocation`].

use clap::{CommandFactory, Parser};

use crate::components::{Component, Selection};
use crate::error::{Result, SetupError};

/// Trellis setup - install the runtime components of the pipeline.
#[derive(Debug, Default, Parser)]
#[command(name = "trellis-setup")]
#[command(long_about = None)]
#[command(args_override_self = true)]
#[command(after_help = "Components are installed in a fixed order regardless of flag order.\n\
Anything that already imports is skipped.")]
pub struct Cli {
    /// Install the basic dependencies
    #[arg(long)]
    pub basic: bool,

    /// Install flash-attention
    #[arg(long)]
    pub flash_attn: bool,

    /// Install nvdiffrast
    #[arg(long)]
    pub nvdiffrast: bool,

    /// Install nvdiffrec
    #[arg(long)]
    pub nvdiffrec: bool,

    /// Install CuMesh
    #[arg(long)]
    pub cumesh: bool,

    /// Install FlexGEMM
    #[arg(long)]
    pub flexgemm: bool,

    /// Install o-voxel from ./o-voxel
    #[arg(long)]
    pub o_voxel: bool,

    /// Install everything except o-voxel
    #[arg(long)]
    pub all: bool,
}

impl Cli {
    /// Whether any component flag was given.
    pub fn any_selected(&self) -> bool {
        self.all
            || Component::ALL
                .iter()
                .any(|&component| self.flag(component))
    }

    /// The requested components. `--all` expands to the aggregate set.
    pub fn selection(&self) -> Selection {
        let aggregate = if self.all {
            Selection::aggregate()
        } else {
            Selection::default()
        };
        aggregate
            .iter()
            .chain(Component::ALL.iter().copied().filter(|&c| self.flag(c)))
            .collect()
    }

    fn flag(&self, component: Component) -> bool {
        match component {
            Component::Basic => self.basic,
            Component::FlashAttn => self.flash_attn,
            Component::Nvdiffrast => self.nvdiffrast,
            Component::Nvdiffrec => self.nvdiffrec,
            Component::CuMesh => self.cumesh,
            Component::FlexGemm => self.flexgemm,
            Component::OVoxel => self.o_voxel,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Print usage and exit successfully.
    Help,
    /// Install the selected components.
    Install(Selection),
}

/// Interpret the command line (without the program name).
///
/// A help flag anywhere wins over everything else, including invalid
/// arguments. No component flags at all also means help.
pub fn parse_args<I, S>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(Invocation::Help);
    }

    let cli = Cli::try_parse_from(std::iter::once("trellis-setup".to_string()).chain(args))
        .map_err(|e| SetupError::InvalidArguments {
            message: clap_message(&e),
        })?;
    tracing::debug!("Parsed arguments: {:?}", cli);

    if !cli.any_selected() {
        return Ok(Invocation::Help);
    }
    Ok(Invocation::Install(cli.selection()))
}

/// Rendered usage text.
pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

fn clap_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install(args: &[&str]) -> Selection {
        match parse_args(args.iter().copied()).unwrap() {
            Invocation::Install(selection) => selection,
            Invocation::Help => panic!("expected an install for {:?}", args),
        }
    }

    #[test]
    fn no_arguments_means_help() {
        assert_eq!(parse_args(Vec::<String>::new()).unwrap(), Invocation::Help);
    }

    #[test]
    fn help_wins_anywhere() {
        assert_eq!(parse_args(["--basic", "-h"]).unwrap(), Invocation::Help);
        assert_eq!(parse_args(["--help", "--cumesh"]).unwrap(), Invocation::Help);
        assert_eq!(parse_args(["--bogus", "--help"]).unwrap(), Invocation::Help);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse_args(["--basic", "--bogus"]).unwrap_err();
        match err {
            SetupError::InvalidArguments { message } => assert!(message.contains("--bogus")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn positional_is_rejected() {
        assert!(matches!(
            parse_args(["basic"]),
            Err(SetupError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn flag_value_is_rejected() {
        assert!(parse_args(["--basic=1"]).is_err());
    }

    #[test]
    fn repeated_flags_are_harmless() {
        let selection = install(&["--basic", "--basic"]);
        assert_eq!(selection.len(), 1);
        assert!(selection.contains(Component::Basic));
    }

    #[test]
    fn all_equals_every_individual_flag_but_o_voxel() {
        let all = install(&["--all"]);
        let individual = install(&[
            "--basic",
            "--flash-attn",
            "--nvdiffrast",
            "--nvdiffrec",
            "--cumesh",
            "--flexgemm",
        ]);
        assert_eq!(all, individual);
        assert!(!all.contains(Component::OVoxel));
    }

    #[test]
    fn all_combines_with_o_voxel() {
        let selection = install(&["--o-voxel", "--all"]);
        assert_eq!(selection.len(), Component::ALL.len());
    }

    #[test]
    fn flag_order_does_not_matter() {
        assert_eq!(
            install(&["--o-voxel", "--basic"]),
            install(&["--basic", "--o-voxel"])
        );
    }

    #[test]
    fn usage_lists_every_flag() {
        let text = usage();
        for component in Component::ALL {
            assert!(text.contains(&format!("--{}", component.name())), "{}", component);
        }
        assert!(text.contains("--all"));
        assert!(text.contains("--help"));
    }
}
