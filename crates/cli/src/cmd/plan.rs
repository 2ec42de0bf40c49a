//! Implementation of the `kiln plan` command.
//!
//! Loads a workspace, constructs the rules of the requested targets (every
//! defined target by default) in parallel, and prints the resulting graph.

use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::debug;

use kiln_lib::util::hash::Hashable;

use crate::output::{OutputFormat, print_json, print_rule, print_stat, truncate_hash};

use super::{open_workspace, parse_target};

pub fn cmd_plan(workspace: &Path, config: Option<&Path>, targets: &[String], output: OutputFormat, verbose: bool) -> Result<()> {
  let ws = open_workspace(workspace, config)?;

  let requested = if targets.is_empty() {
    ws.targets()
  } else {
    targets.iter().map(|t| parse_target(t)).collect::<Result<Vec<_>>>()?
  };

  debug!(targets = requested.len(), "planning");
  let index = ws.into_index();
  requested
    .par_iter()
    .map(|target| {
      index
        .require(target)
        .with_context(|| format!("Failed to plan {}", target))
    })
    .collect::<Result<Vec<_>>>()?;

  let snapshot = index.snapshot();
  let hash = snapshot.compute_hash().context("Failed to compute graph hash")?;

  if output.is_json() {
    return print_json(&serde_json::json!({ "hash": hash.0, "rules": snapshot.rules }));
  }

  println!("Plan: {}", truncate_hash(&hash.0));
  print_stat("Requested", &requested.len().to_string());
  print_stat("Rules", &snapshot.rules.len().to_string());
  println!();
  for rule in &snapshot.rules {
    print_rule(rule, verbose);
  }

  Ok(())
}
