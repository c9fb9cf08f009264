//! bitforge: command-line shell for the Bitforge platform
//!
//! Each subcommand mounts the matching screen binding from `bitforge_sdk`,
//! waits for its state and prints it as plain text.

pub mod commands;
pub mod config;
mod render;

pub use commands::{execute, AdminCommands, Command};
pub use config::Config;
