use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;

use kiln_lib::config::VerificationMode;
use kiln_lib::rule::abi::{CompareAbisRule, VerifyOutcome};

use crate::output::{print_error, print_info, print_success, print_warning};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
  Off,
  Log,
  Fail,
}

impl From<ModeArg> for VerificationMode {
  fn from(mode: ModeArg) -> Self {
    match mode {
      ModeArg::Off => VerificationMode::Off,
      ModeArg::Log => VerificationMode::Log,
      ModeArg::Fail => VerificationMode::Fail,
    }
  }
}

/// Compare a class ABI with a source ABI.
pub fn cmd_verify(class_abi: &Path, source_abi: &Path, mode: ModeArg) -> Result<()> {
  let rule = CompareAbisRule {
    class_abi: class_abi.to_path_buf(),
    source_abi: source_abi.to_path_buf(),
    mode: mode.into(),
  };

  match rule.verify() {
    Ok(VerifyOutcome::Match) => print_success("ABIs match"),
    Ok(VerifyOutcome::MismatchLogged) => print_warning("source ABI differs from class ABI"),
    Ok(VerifyOutcome::Skipped) => print_info("verification is off"),
    Err(e) => {
      print_error(&format!("ABI verification failed: {}", e));
      return Err(e.into());
    }
  }
  Ok(())
}
