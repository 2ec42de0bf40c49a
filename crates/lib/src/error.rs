//! Errors raised while constructing the rule graph.

use thiserror::Error;

use crate::library::ResourceError;
use crate::target::Target;

/// Faults that abort a graph-construction pass.
///
/// None of these are retried: every derivation is deterministic given its
/// inputs, so the same request fails the same way until the input changes.
#[derive(Debug, Error)]
pub enum GraphError {
  /// `build_abi` was called for a target that is not an ABI flavor.
  #[error("{0} is not an ABI target but went down the ABI codepath")]
  NotAnAbiTarget(Target),

  /// A library builder needed its dependency declaration but has none.
  #[error("library {0} has no dependency declaration")]
  MissingDependencies(Target),

  /// The rule factory does not know how to construct this target.
  #[error("no rule definition for {0}")]
  UnknownTarget(Target),

  /// A rule was registered twice in the index.
  #[error("rule {0} is already registered")]
  DuplicateRule(Target),

  /// A target was requested while it was already being constructed.
  #[error("dependency cycle detected at {0}")]
  CycleDetected(Target),

  /// A class ABI was requested for a library that produces no jar.
  #[error("library {0} produces no output to derive a class ABI from")]
  NoLibraryOutput(Target),

  /// Resource validation failed before any rule was built.
  #[error(transparent)]
  Resource(#[from] ResourceError),
}
