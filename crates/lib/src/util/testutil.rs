//! Test utilities for kiln-lib.
//!
//! Rule fixtures and a [`TestFactory`] that constructs them on demand through
//! a [`RuleIndex`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::compiler::{Language, StandardCompilerFactory};
use crate::config::{CompilerConfig, JavaConfig};
use crate::deps::DependencyDeclaration;
use crate::error::GraphError;
use crate::index::{RuleFactory, RuleIndex};
use crate::library::{LibraryContext, LibraryDescriptor, LibraryRules, ResourceError, ResourceValidator};
use crate::paths::output_jar;
use crate::rule::abi::class_abi_rule;
use crate::rule::steps::{JarBuildSteps, RemoveClassesMatcher};
use crate::rule::{BuildRule, ExportFileRule, LibraryRule, PrebuiltJarRule, RuleHandle, RuleKind};
use crate::target::{Flavor, Target};

/// Output root used by every fixture.
pub const OUT: &str = "/out";

fn target(s: &str) -> Target {
  s.parse().unwrap()
}

pub fn export_file(name: &str) -> RuleHandle {
  let target = target(name);
  let src = PathBuf::from(target.short_name());
  RuleHandle::new(BuildRule::new(
    target,
    RuleKind::ExportFile(ExportFileRule { src: src.clone() }),
    BTreeSet::new(),
    Some(src),
  ))
}

pub fn prebuilt_jar(name: &str) -> RuleHandle {
  let target = target(name);
  let jar = PathBuf::from(format!("/repo/{}.jar", target.short_name()));
  RuleHandle::new(BuildRule::new(
    target,
    RuleKind::PrebuiltJar(PrebuiltJarRule {
      binary_jar: jar.clone(),
      maven_coords: None,
    }),
    BTreeSet::new(),
    Some(jar),
  ))
}

pub fn java_steps(srcs: &[&str]) -> JarBuildSteps {
  JarBuildSteps {
    language: Language::Java,
    arguments: Vec::new(),
    srcs: srcs.iter().map(PathBuf::from).collect(),
    resources: Vec::new(),
    resources_root: None,
    manifest_file: None,
    postprocess_commands: Vec::new(),
    abi_classpath: Vec::new(),
    track_class_usage: false,
    compile_classpath: Vec::new(),
    classes_to_remove: RemoveClassesMatcher::default(),
    required_for_source_abi: false,
  }
}

fn to_set(rules: &[&RuleHandle]) -> BTreeSet<RuleHandle> {
  rules.iter().map(|r| (*r).clone()).collect()
}

/// A pre-built library rule with a class ABI.
pub fn library(name: &str, declared: &[&RuleHandle], exported: &[&RuleHandle], provided: &[&RuleHandle]) -> RuleHandle {
  let target = target(name);
  let mut build_deps = to_set(declared);
  build_deps.extend(to_set(exported));
  build_deps.extend(to_set(provided));

  RuleHandle::new(BuildRule::new(
    target.clone(),
    RuleKind::Library(LibraryRule {
      declared_deps: to_set(declared),
      exported_deps: to_set(exported),
      provided_deps: to_set(provided),
      abi_target: Some(target.class_abi()),
      source_abi: None,
      steps: Arc::new(java_steps(&["Lib.java"])),
      proguard_config: None,
      maven_coords: None,
      tests: BTreeSet::new(),
      required_for_source_abi: false,
    }),
    build_deps,
    Some(output_jar(Path::new(OUT), &target)),
  ))
}

/// A pre-built library rule with nothing to compile.
pub fn library_without_output(name: &str) -> RuleHandle {
  RuleHandle::new(BuildRule::new(
    target(name),
    RuleKind::Library(LibraryRule {
      declared_deps: BTreeSet::new(),
      exported_deps: BTreeSet::new(),
      provided_deps: BTreeSet::new(),
      abi_target: None,
      source_abi: None,
      steps: Arc::new(java_steps(&[])),
      proguard_config: None,
      maven_coords: None,
      tests: BTreeSet::new(),
      required_for_source_abi: false,
    }),
    BTreeSet::new(),
    None,
  ))
}

/// A descriptor with the given sources and no deps.
pub fn descriptor(srcs: &[&str]) -> LibraryDescriptor {
  LibraryDescriptor {
    srcs: srcs.iter().map(PathBuf::from).collect(),
    deps: Some(DependencyDeclaration::default()),
    ..LibraryDescriptor::default()
  }
}

pub struct AcceptResources;

impl ResourceValidator for AcceptResources {
  fn validate(&self, _: &Target, _: &BTreeSet<PathBuf>, _: Option<&Path>) -> Result<(), ResourceError> {
    Ok(())
  }
}

/// Constructs fixture rules, class ABIs of fixture rules, and any flavor of
/// registered library descriptors.
pub struct TestFactory {
  rules: BTreeMap<Target, RuleHandle>,
  libraries: BTreeMap<Target, LibraryDescriptor>,
  cycles: BTreeSet<Target>,
  java: JavaConfig,
  compiler: StandardCompilerFactory,
  calls: Arc<AtomicUsize>,
  delay: Option<Duration>,
}

impl TestFactory {
  pub fn new() -> Self {
    Self {
      rules: BTreeMap::new(),
      libraries: BTreeMap::new(),
      cycles: BTreeSet::new(),
      java: JavaConfig::default(),
      compiler: StandardCompilerFactory::default(),
      calls: Arc::new(AtomicUsize::new(0)),
      delay: None,
    }
  }

  pub fn with_rule(mut self, rule: &RuleHandle) -> Self {
    self.rules.insert(rule.target().clone(), rule.clone());
    self
  }

  pub fn with_library(mut self, name: &str, descriptor: LibraryDescriptor) -> Self {
    self.libraries.insert(target(name), descriptor);
    self
  }

  /// Make `target` require itself while being constructed.
  pub fn with_cycle(mut self, target: &Target) -> Self {
    self.cycles.insert(target.clone());
    self
  }

  pub fn with_java(mut self, java: JavaConfig) -> Self {
    self.java = java;
    self
  }

  pub fn with_compiler(mut self, config: CompilerConfig) -> Self {
    self.compiler = StandardCompilerFactory::new(config);
    self
  }

  /// Sleep inside every construction, widening race windows.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Counter of `create_rule` calls.
  pub fn calls(&self) -> Arc<AtomicUsize> {
    self.calls.clone()
  }
}

impl RuleFactory for TestFactory {
  fn create_rule(&self, target: &Target, index: &RuleIndex) -> Result<RuleHandle, GraphError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      std::thread::sleep(delay);
    }

    if self.cycles.contains(target) {
      return index.require(target);
    }

    let library = target.library_target();
    if let Some(descriptor) = self.libraries.get(&library) {
      let ctx = LibraryContext {
        index,
        compiler_factory: &self.compiler,
        java: &self.java,
        out: Path::new(OUT),
      };
      return LibraryRules::new(target.clone(), descriptor.clone(), ctx, &AcceptResources)?.build();
    }

    match target.flavor() {
      Flavor::Library => self
        .rules
        .get(target)
        .cloned()
        .ok_or_else(|| GraphError::UnknownTarget(target.clone())),
      Flavor::ClassAbi if self.rules.contains_key(&library) => {
        let lib = index.require(&library)?;
        class_abi_rule(target.clone(), &lib, Path::new(OUT), false)
      }
      _ => Err(GraphError::UnknownTarget(target.clone())),
    }
  }
}

pub fn index_with(factory: TestFactory) -> RuleIndex {
  RuleIndex::new(Arc::new(factory))
}
