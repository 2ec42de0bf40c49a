use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::compiler::CompilerOptions;
use crate::deps::DependencyDeclaration;
use crate::rule::RuleHandle;
use crate::rule::steps::RemoveClassesMatcher;
use crate::target::Target;

/// Everything declared about one library.
///
/// `deps` is optional so that callers assembling a descriptor in stages can
/// leave it unset; building any rule without it is a
/// [`GraphError::MissingDependencies`](crate::error::GraphError::MissingDependencies).
#[derive(Debug, Clone)]
pub struct LibraryDescriptor {
  pub srcs: BTreeSet<PathBuf>,
  pub resources: BTreeSet<PathBuf>,
  pub resources_root: Option<PathBuf>,
  pub manifest_file: Option<PathBuf>,
  pub proguard_config: Option<PathBuf>,
  pub postprocess_commands: Vec<String>,
  pub maven_coords: Option<String>,
  pub tests: BTreeSet<Target>,
  pub classes_to_remove: RemoveClassesMatcher,
  pub source_abis_allowed: bool,
  pub required_for_source_abi: bool,
  pub compiler_options: CompilerOptions,
  pub deps: Option<DependencyDeclaration>,
  /// Build deps that are not classpath deps.
  pub extra_deps: BTreeSet<RuleHandle>,
}

impl Default for LibraryDescriptor {
  fn default() -> Self {
    Self {
      srcs: BTreeSet::new(),
      resources: BTreeSet::new(),
      resources_root: None,
      manifest_file: None,
      proguard_config: None,
      postprocess_commands: Vec::new(),
      maven_coords: None,
      tests: BTreeSet::new(),
      classes_to_remove: RemoveClassesMatcher::default(),
      source_abis_allowed: true,
      required_for_source_abi: false,
      compiler_options: CompilerOptions::default(),
      deps: Some(DependencyDeclaration::default()),
      extra_deps: BTreeSet::new(),
    }
  }
}

impl LibraryDescriptor {
  /// Sources, resources, or a manifest mean a jar gets produced.
  pub fn will_produce_output(&self) -> bool {
    !self.srcs.is_empty() || !self.resources.is_empty() || self.manifest_file.is_some()
  }
}
