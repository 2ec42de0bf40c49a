use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::target::Target;

use super::abi::{ClassAbiRule, CompareAbisRule, SourceAbiRule};
use super::steps::JarBuildSteps;

/// A node of the rule graph.
///
/// Rules are immutable once constructed. They are shared through
/// [`RuleHandle`]s and registered in the [`RuleIndex`](crate::index::RuleIndex)
/// exactly once.
#[derive(Debug)]
pub struct BuildRule {
  target: Target,
  kind: RuleKind,
  build_deps: BTreeSet<RuleHandle>,
  output: Option<PathBuf>,
}

/// What a rule builds.
#[derive(Debug)]
pub enum RuleKind {
  /// A compiled library jar.
  Library(LibraryRule),
  /// A jar checked into the repository.
  PrebuiltJar(PrebuiltJarRule),
  /// A plain file exposed to other rules. Carries no compiled classes.
  ExportFile(ExportFileRule),
  /// ABI stripped from a compiled jar.
  ClassAbi(ClassAbiRule),
  /// ABI derived from source during compilation.
  SourceAbi(SourceAbiRule),
  /// Check that the source ABI matches the class ABI.
  CompareAbis(CompareAbisRule),
}

#[derive(Debug)]
pub struct LibraryRule {
  /// Declared deps after the compiler's own deps were folded in.
  pub declared_deps: BTreeSet<RuleHandle>,
  pub exported_deps: BTreeSet<RuleHandle>,
  pub provided_deps: BTreeSet<RuleHandle>,
  /// The ABI flavor dependents compile against, if this library has output.
  pub abi_target: Option<Target>,
  /// The source-ABI rule this library was constructed together with.
  pub source_abi: Option<RuleHandle>,
  pub steps: Arc<JarBuildSteps>,
  pub proguard_config: Option<PathBuf>,
  pub maven_coords: Option<String>,
  pub tests: BTreeSet<Target>,
  pub required_for_source_abi: bool,
}

#[derive(Debug)]
pub struct PrebuiltJarRule {
  pub binary_jar: PathBuf,
  pub maven_coords: Option<String>,
}

#[derive(Debug)]
pub struct ExportFileRule {
  pub src: PathBuf,
}

impl BuildRule {
  pub fn new(target: Target, kind: RuleKind, build_deps: BTreeSet<RuleHandle>, output: Option<PathBuf>) -> Self {
    Self {
      target,
      kind,
      build_deps,
      output,
    }
  }

  pub fn target(&self) -> &Target {
    &self.target
  }

  pub fn kind(&self) -> &RuleKind {
    &self.kind
  }

  pub fn build_deps(&self) -> &BTreeSet<RuleHandle> {
    &self.build_deps
  }

  pub fn output(&self) -> Option<&Path> {
    self.output.as_deref()
  }

  pub fn kind_name(&self) -> &'static str {
    match self.kind {
      RuleKind::Library(_) => "java_library",
      RuleKind::PrebuiltJar(_) => "prebuilt_jar",
      RuleKind::ExportFile(_) => "export_file",
      RuleKind::ClassAbi(_) => "class_abi",
      RuleKind::SourceAbi(_) => "source_abi",
      RuleKind::CompareAbis(_) => "compare_abis",
    }
  }

  /// Whether this rule provides compiled classes that have an ABI.
  pub fn has_java_abi(&self) -> bool {
    matches!(self.kind, RuleKind::Library(_) | RuleKind::PrebuiltJar(_))
  }

  /// The target dependents should compile against instead of this rule.
  ///
  /// `None` when the rule has no ABI, or is a library without output.
  pub fn abi_target(&self) -> Option<Target> {
    match &self.kind {
      RuleKind::Library(lib) => lib.abi_target.clone(),
      RuleKind::PrebuiltJar(_) => Some(self.target.class_abi()),
      _ => None,
    }
  }

  /// Deps re-exposed to anything that depends on this rule.
  pub fn exported_deps(&self) -> Option<&BTreeSet<RuleHandle>> {
    match &self.kind {
      RuleKind::Library(lib) => Some(&lib.exported_deps),
      _ => None,
    }
  }

  pub fn as_library(&self) -> Option<&LibraryRule> {
    match &self.kind {
      RuleKind::Library(lib) => Some(lib),
      _ => None,
    }
  }

  pub fn as_compare_abis(&self) -> Option<&CompareAbisRule> {
    match &self.kind {
      RuleKind::CompareAbis(compare) => Some(compare),
      _ => None,
    }
  }

  /// The compile steps factory, for rules that compile sources.
  pub fn steps(&self) -> Option<&Arc<JarBuildSteps>> {
    match &self.kind {
      RuleKind::Library(lib) => Some(&lib.steps),
      RuleKind::SourceAbi(abi) => Some(&abi.steps),
      _ => None,
    }
  }
}

/// Shared reference to a constructed rule.
///
/// Equality and ordering follow the rule's target, so sets of handles iterate
/// in target order. Use [`RuleHandle::ptr_eq`] to check instance identity.
#[derive(Debug, Clone)]
pub struct RuleHandle(Arc<BuildRule>);

impl RuleHandle {
  pub fn new(rule: BuildRule) -> Self {
    Self(Arc::new(rule))
  }

  pub fn ptr_eq(a: &RuleHandle, b: &RuleHandle) -> bool {
    Arc::ptr_eq(&a.0, &b.0)
  }
}

impl Deref for RuleHandle {
  type Target = BuildRule;

  fn deref(&self) -> &BuildRule {
    &self.0
  }
}

impl PartialEq for RuleHandle {
  fn eq(&self, other: &Self) -> bool {
    self.0.target == other.0.target
  }
}

impl Eq for RuleHandle {}

impl PartialOrd for RuleHandle {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for RuleHandle {
  fn cmp(&self, other: &Self) -> Ordering {
    self.0.target.cmp(&other.0.target)
  }
}
