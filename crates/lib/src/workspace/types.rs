//! Workspace manifest types and errors.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::compiler::CompilerOptions;
use crate::rule::steps::RemoveClassesMatcher;
use crate::target::Target;

/// The parsed `kiln.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceManifest {
  pub java_library: Vec<LibraryDef>,
  pub prebuilt_jar: Vec<PrebuiltJarDef>,
  pub export_file: Vec<ExportFileDef>,
}

fn allowed() -> bool {
  true
}

/// A `[[java_library]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryDef {
  pub name: Target,
  #[serde(default)]
  pub srcs: BTreeSet<PathBuf>,
  #[serde(default)]
  pub resources: BTreeSet<PathBuf>,
  pub resources_root: Option<PathBuf>,
  pub manifest_file: Option<PathBuf>,
  pub proguard_config: Option<PathBuf>,
  #[serde(default)]
  pub postprocess_commands: Vec<String>,
  pub maven_coords: Option<String>,
  #[serde(default)]
  pub tests: BTreeSet<Target>,
  /// Regexes over fully-qualified class names.
  #[serde(default)]
  pub remove_classes: Vec<String>,
  #[serde(default = "allowed")]
  pub source_abis_allowed: bool,
  #[serde(default)]
  pub required_for_source_abi: bool,
  #[serde(default)]
  pub deps: BTreeSet<Target>,
  #[serde(default)]
  pub exported_deps: BTreeSet<Target>,
  #[serde(default)]
  pub provided_deps: BTreeSet<Target>,
  #[serde(default)]
  pub compiler: CompilerOptions,
}

impl LibraryDef {
  /// Every target this library needs resolved before it can be built.
  pub fn referenced_targets(&self) -> impl Iterator<Item = &Target> {
    self
      .deps
      .iter()
      .chain(&self.exported_deps)
      .chain(&self.provided_deps)
      .chain(&self.compiler.annotation_processors)
  }
}

/// A `[[prebuilt_jar]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrebuiltJarDef {
  pub name: Target,
  pub binary_jar: PathBuf,
  pub maven_coords: Option<String>,
}

/// An `[[export_file]]` entry. `src` defaults to the rule name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportFileDef {
  pub name: Target,
  pub src: Option<PathBuf>,
}

/// A validated workspace entry.
#[derive(Debug, Clone)]
pub enum Definition {
  Library {
    def: LibraryDef,
    classes_to_remove: RemoveClassesMatcher,
  },
  PrebuiltJar(PrebuiltJarDef),
  ExportFile(ExportFileDef),
}

impl Definition {
  pub fn kind_name(&self) -> &'static str {
    match self {
      Definition::Library { .. } => "java_library",
      Definition::PrebuiltJar(_) => "prebuilt_jar",
      Definition::ExportFile(_) => "export_file",
    }
  }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("failed to read workspace {}: {source}", .path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid workspace manifest: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("rule name {0} must not carry a flavor")]
  FlavoredName(Target),

  #[error("target {0} is defined more than once")]
  DuplicateTarget(Target),

  #[error("{target} depends on undefined target {dep}")]
  UnknownDependency { target: Target, dep: Target },

  #[error("compiler runtime dep {0} is not defined in the workspace")]
  UnknownRuntimeDep(Target),

  #[error("{target}: invalid remove_classes pattern: {source}")]
  InvalidPattern { target: Target, source: regex::Error },

  #[error("dependency cycle through {0}")]
  Cycle(Target),
}
