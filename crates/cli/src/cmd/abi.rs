use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{OutputFormat, print_json};

use super::{open_workspace, parse_target};

/// Print the ABI target dependents of `target` compile against.
pub fn cmd_abi(workspace: &Path, config: Option<&Path>, target: &str, output: OutputFormat) -> Result<()> {
  let library = parse_target(target)?.library_target();
  let index = open_workspace(workspace, config)?.into_index();

  let rule = index
    .require(&library)
    .with_context(|| format!("Failed to build {}", library))?;
  let abi = rule.abi_target();

  if output.is_json() {
    return print_json(&serde_json::json!({ "target": library, "abi": abi }));
  }

  match abi {
    Some(abi) => println!("{}", abi),
    None => println!("none"),
  }
  Ok(())
}
