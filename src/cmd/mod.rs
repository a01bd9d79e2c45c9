//! CLI command implementations.
//!
//! | Module | Commands handled |
//! |--------|------------------|
//! | `run`  | `Run`            |
//! | `list` | `List`           |

pub mod list;
pub mod run;

pub use list::cmd_list;
pub use run::run_epic;

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::Cli;

pub fn project_dir(cli: &Cli) -> Result<PathBuf> {
    match cli.project_dir.clone() {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}
