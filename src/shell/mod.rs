//! External command execution and platform queries.

pub mod children;
pub mod command;
pub mod platform;

pub use command::{
    display_command, execute, execute_check, execute_checked, CommandOptions, CommandResult,
};
pub use children::{terminate_children, ChildRegistry};
pub use platform::{command_exists, is_elevated};
