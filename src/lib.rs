//! Trellis setup - install the optional runtime components of a 3D
//! generation environment.
//!
//! Each component is described by data (probe modules, acquisition steps,
//! fallbacks) and installed by one generic routine. Components that
//! already import are skipped, so runs are idempotent.
//!
//! # Modules
//!
//! - [`cli`] - Command-line parsing
//! - [`components`] - Component identifiers, selections and the catalog
//! - [`config`] - Run configuration from environment variables
//! - [`environment`] - Interpreter and tensor runtime gate
//! - [`error`] - Error types and result aliases
//! - [`installer`] - The generic component installer
//! - [`runner`] - Run orchestration and reporting
//! - [`shell`] - External command execution
//! - [`toolchain`] - Python, pip, git and system package access
//! - [`ui`] - Spinners and terminal output
//! - [`workspace`] - Scoped temporary build directory
//!
//! # Example
//!
//! ```
//! use trellis_setup::cli::{parse_args, Invocation};
//! use trellis_setup::components::Component;
//!
//! let Invocation::Install(selection) = parse_args(["--cumesh", "--basic"]).unwrap() else {
//!     panic!("expected an install");
//! };
//! let order: Vec<Component> = selection.iter().collect();
//! assert_eq!(order, [Component::Basic, Component::CuMesh]);
//! ```

pub mod cli;
pub mod components;
pub mod config;
pub mod environment;
pub mod error;
pub mod installer;
pub mod runner;
pub mod shell;
pub mod toolchain;
pub mod ui;
pub mod workspace;

pub use error::{Result, SetupError};
