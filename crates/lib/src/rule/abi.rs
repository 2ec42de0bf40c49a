//! ABI rule variants and ABI target selection.
//!
//! A library's dependents compile against exactly one ABI flavor:
//!
//! - **class ABI**: stripped from the compiled library jar, always available
//! - **source ABI**: emitted by the compiler straight from source, so it is
//!   ready before the library finishes compiling
//! - **verified source ABI**: the source ABI, gated on a comparison with the
//!   class ABI so a wrong source ABI fails loudly instead of silently skipping
//!   a needed recompile

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::VerificationMode;
use crate::error::GraphError;
use crate::paths::output_jar;
use crate::target::Target;
use crate::util::hash::{ArtifactHashError, ContentHash, hash_artifact};

use super::steps::{JarBuildSteps, Step};
use super::types::{BuildRule, RuleHandle, RuleKind};

/// Everything ABI target selection depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiInputs {
  /// Sources, resources, or a manifest are present.
  pub will_produce_output: bool,
  pub has_sources: bool,
  pub compiler_supports_abi_from_source: bool,
  /// Global switch.
  pub source_abis_enabled: bool,
  /// Per-library switch.
  pub source_abis_allowed: bool,
  /// Postprocessing rewrites classes in ways source can't predict.
  pub has_postprocess_commands: bool,
  pub verification: VerificationMode,
}

impl AbiInputs {
  pub fn should_build_abi_from_source(&self) -> bool {
    self.compiler_supports_abi_from_source
      && self.has_sources
      && self.source_abis_enabled
      && self.source_abis_allowed
      && !self.has_postprocess_commands
  }

  pub fn will_produce_source_abi(&self) -> bool {
    self.will_produce_output && self.should_build_abi_from_source()
  }
}

/// Choose the ABI target for `library`, or `None` if it produces no jar.
pub fn abi_target_for(library: &Target, inputs: &AbiInputs) -> Option<Target> {
  if !inputs.will_produce_output {
    return None;
  }

  let target = if inputs.should_build_abi_from_source() {
    match inputs.verification {
      VerificationMode::Off => library.source_abi(),
      VerificationMode::Log | VerificationMode::Fail => library.verified_source_abi(),
    }
  } else {
    library.class_abi()
  };

  Some(target)
}

#[derive(Debug)]
pub struct ClassAbiRule {
  pub library_output: PathBuf,
  /// The stripped jar must be byte-comparable with the source ABI.
  pub source_abi_compatible: bool,
}

#[derive(Debug)]
pub struct SourceAbiRule {
  pub steps: Arc<JarBuildSteps>,
}

#[derive(Debug)]
pub struct CompareAbisRule {
  pub class_abi: PathBuf,
  pub source_abi: PathBuf,
  pub mode: VerificationMode,
}

impl ClassAbiRule {
  pub fn steps(&self, output: &Path) -> Vec<Step> {
    vec![Step::StripToAbi {
      input: self.library_output.clone(),
      output: output.to_path_buf(),
      source_abi_compatible: self.source_abi_compatible,
    }]
  }
}

/// Build the class-ABI rule for a library (or prebuilt jar) rule.
pub fn class_abi_rule(
  target: Target,
  library: &RuleHandle,
  out: &Path,
  source_abi_compatible: bool,
) -> Result<RuleHandle, GraphError> {
  let library_output = library
    .output()
    .ok_or_else(|| GraphError::NoLibraryOutput(library.target().clone()))?
    .to_path_buf();

  debug!(target = %target, library = %library.target(), "deriving class ABI");

  let output = output_jar(out, &target);
  Ok(RuleHandle::new(BuildRule::new(
    target,
    RuleKind::ClassAbi(ClassAbiRule {
      library_output,
      source_abi_compatible,
    }),
    BTreeSet::from([library.clone()]),
    Some(output),
  )))
}

/// Build the source-ABI rule for a library.
///
/// It depends on what the library compiles against, never on the library.
pub fn source_abi_rule(
  target: Target,
  build_deps: BTreeSet<RuleHandle>,
  steps: Arc<JarBuildSteps>,
  out: &Path,
) -> RuleHandle {
  let output = output_jar(out, &target);
  RuleHandle::new(BuildRule::new(
    target,
    RuleKind::SourceAbi(SourceAbiRule { steps }),
    build_deps,
    Some(output),
  ))
}

/// Build the comparison rule gating a verified source ABI.
///
/// Its output is the source ABI jar, which dependents use once it matches.
pub fn compare_abis_rule(
  target: Target,
  class_abi: &RuleHandle,
  source_abi: &RuleHandle,
  mode: VerificationMode,
) -> Result<RuleHandle, GraphError> {
  let class_path = class_abi
    .output()
    .ok_or_else(|| GraphError::NoLibraryOutput(class_abi.target().clone()))?
    .to_path_buf();
  let source_path = source_abi
    .output()
    .ok_or_else(|| GraphError::NoLibraryOutput(source_abi.target().clone()))?
    .to_path_buf();

  Ok(RuleHandle::new(BuildRule::new(
    target,
    RuleKind::CompareAbis(CompareAbisRule {
      class_abi: class_path,
      source_abi: source_path.clone(),
      mode,
    }),
    BTreeSet::from([class_abi.clone(), source_abi.clone()]),
    Some(source_path),
  )))
}

#[derive(Debug, Error)]
pub enum VerifyError {
  #[error("failed to hash ABI artifact: {0}")]
  Hash(#[from] ArtifactHashError),

  #[error(
    "source ABI {} does not match class ABI {} ({source_hash} != {class_hash})",
    .source_abi.display(),
    .class_abi.display()
  )]
  Mismatch {
    class_abi: PathBuf,
    source_abi: PathBuf,
    class_hash: ContentHash,
    source_hash: ContentHash,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
  Match,
  /// Mismatch reported as a warning (`log` mode).
  MismatchLogged,
  /// Verification is off; nothing was compared.
  Skipped,
}

impl CompareAbisRule {
  pub fn steps(&self) -> Vec<Step> {
    vec![Step::CompareAbis {
      class_abi: self.class_abi.clone(),
      source_abi: self.source_abi.clone(),
      mode: self.mode,
    }]
  }

  /// Compare the two ABI artifacts under this rule's mode.
  pub fn verify(&self) -> Result<VerifyOutcome, VerifyError> {
    if self.mode == VerificationMode::Off {
      return Ok(VerifyOutcome::Skipped);
    }

    let class_hash = hash_artifact(&self.class_abi)?;
    let source_hash = hash_artifact(&self.source_abi)?;

    if class_hash == source_hash {
      return Ok(VerifyOutcome::Match);
    }

    match self.mode {
      VerificationMode::Fail => Err(VerifyError::Mismatch {
        class_abi: self.class_abi.clone(),
        source_abi: self.source_abi.clone(),
        class_hash,
        source_hash,
      }),
      _ => {
        warn!(
          class_abi = %self.class_abi.display(),
          source_abi = %self.source_abi.display(),
          "source ABI differs from class ABI"
        );
        Ok(VerifyOutcome::MismatchLogged)
      }
    }
  }
}
