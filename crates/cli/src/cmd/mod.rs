mod abi;
mod plan;
mod steps;
mod verify;

pub use abi::cmd_abi;
pub use plan::cmd_plan;
pub use steps::cmd_steps;
pub use verify::{ModeArg, cmd_verify};

use std::path::Path;

use anyhow::{Context, Result};

use kiln_lib::config::KilnConfig;
use kiln_lib::target::Target;
use kiln_lib::workspace::Workspace;

/// Load the workspace manifest with an optional config file.
fn open_workspace(workspace: &Path, config: Option<&Path>) -> Result<Workspace> {
  let config = match config {
    Some(path) => KilnConfig::load(path).with_context(|| format!("Failed to load config: {}", path.display()))?,
    None => KilnConfig::default(),
  };

  Workspace::load(workspace, config).with_context(|| format!("Failed to load workspace: {}", workspace.display()))
}

fn parse_target(target: &str) -> Result<Target> {
  target
    .parse()
    .with_context(|| format!("Invalid target: {}", target))
}
