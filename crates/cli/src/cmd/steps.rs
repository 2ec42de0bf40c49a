//! Implementation of the `kiln steps` command.

use std::path::Path;

use anyhow::{Context, Result};

use kiln_lib::rule::RuleKind;
use kiln_lib::rule::steps::Step;

use crate::output::{OutputFormat, print_info, print_json, symbols};

use super::{open_workspace, parse_target};

pub fn cmd_steps(workspace: &Path, config: Option<&Path>, target: &str, output: OutputFormat) -> Result<()> {
  let target = parse_target(target)?;
  let ws = open_workspace(workspace, config)?;
  let out = ws.out_dir().to_path_buf();
  let index = ws.into_index();

  let rule = index
    .require(&target)
    .with_context(|| format!("Failed to build {}", target))?;

  let steps = match rule.kind() {
    RuleKind::Library(lib) => lib.steps.library_steps(&out, &target),
    RuleKind::SourceAbi(abi) => abi.steps.source_abi_steps(&out, &target),
    RuleKind::ClassAbi(class) => match rule.output() {
      Some(path) => class.steps(path),
      None => Vec::new(),
    },
    RuleKind::CompareAbis(compare) => compare.steps(),
    RuleKind::PrebuiltJar(_) | RuleKind::ExportFile(_) => Vec::new(),
  };

  if output.is_json() {
    return print_json(&steps);
  }

  if steps.is_empty() {
    print_info(&format!("{} has no build steps", target));
    return Ok(());
  }

  for (i, step) in steps.iter().enumerate() {
    println!("{:>3}. {}", i + 1, describe(step));
  }
  Ok(())
}

fn describe(step: &Step) -> String {
  match step {
    Step::MakeCleanDirectory { path } => format!("mkdir {}", path.display()),
    Step::Compile {
      language,
      sources,
      classpath,
      output_dir,
      abi_only,
      ..
    } => format!(
      "compile {} source(s) with {:?}{} against {} jar(s) {} {}",
      sources.len(),
      language,
      if *abi_only { " (abi only)" } else { "" },
      classpath.len(),
      symbols::ARROW,
      output_dir.display()
    ),
    Step::CopyResources {
      resources, output_dir, ..
    } => format!(
      "copy {} resource(s) {} {}",
      resources.len(),
      symbols::ARROW,
      output_dir.display()
    ),
    Step::Postprocess { command, .. } => format!("postprocess: {}", command),
    Step::Jar { output, .. } => format!("jar {} {}", symbols::ARROW, output.display()),
    Step::StripToAbi { input, output, .. } => {
      format!("strip {} {} {}", input.display(), symbols::ARROW, output.display())
    }
    Step::CompareAbis { source_abi, mode, .. } => {
      format!("compare ABIs of {} (mode: {})", source_abi.display(), mode)
    }
  }
}
