//! Command-line interface.
//!
//! - [`args`] - flag definitions and parsing

pub mod args;

pub use args::{parse_args, usage, Cli, Invocation};
