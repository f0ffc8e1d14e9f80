//! Command-line interface
//!
//! Argument parsing (`cli`) and command execution (`handlers`).

pub mod cli;
pub mod handlers;

pub use cli::{Cli, Command};
pub use handlers::run;
