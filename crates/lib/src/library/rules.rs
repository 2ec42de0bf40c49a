//! The library rule builder.
//!
//! One [`LibraryRules`] is created per requested target. Its derived values
//! (compiler, ABI target, closures, build deps, compile steps, rules) are each
//! computed at most once, on first use.
//!
//! Registration is split between the builder and the index: the index
//! registers whatever rule the builder returns, and the builder registers the
//! *other* rule of the library/source-ABI pair:
//!
//! - `build_library` registers the source-ABI companion, if there is one
//! - `build_abi` for a source ABI registers the library

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::compiler::{CompilerFactory, ConfiguredCompiler};
use crate::config::{JavaConfig, VerificationMode};
use crate::deps::{BuildDepsInputs, Closures, DependencyDeclaration, build_time_deps};
use crate::error::GraphError;
use crate::index::RuleIndex;
use crate::paths::output_jar;
use crate::rule::abi::{AbiInputs, abi_target_for, class_abi_rule, compare_abis_rule, source_abi_rule};
use crate::rule::steps::JarBuildSteps;
use crate::rule::{BuildRule, LibraryRule, RuleHandle, RuleKind};
use crate::target::{Flavor, Target};

use super::descriptor::LibraryDescriptor;
use super::resources::ResourceValidator;

/// Shared collaborators of every builder in a construction pass.
#[derive(Clone, Copy)]
pub struct LibraryContext<'a> {
  pub index: &'a RuleIndex,
  pub compiler_factory: &'a dyn CompilerFactory,
  pub java: &'a JavaConfig,
  pub out: &'a Path,
}

/// A library rule and the source-ABI rule constructed with it.
#[derive(Debug, Clone)]
pub struct LibraryPair {
  pub library: RuleHandle,
  pub source_abi: Option<RuleHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registering {
  Companion,
  Library,
}

pub struct LibraryRules<'a> {
  target: Target,
  library_target: Target,
  descriptor: LibraryDescriptor,
  ctx: LibraryContext<'a>,

  compiler: OnceCell<ConfiguredCompiler>,
  abi_target: OnceCell<Option<Target>>,
  declared_deps: OnceCell<BTreeSet<RuleHandle>>,
  closures: OnceCell<Closures>,
  build_deps: OnceCell<BTreeSet<RuleHandle>>,
  steps: OnceCell<Arc<JarBuildSteps>>,
  source_abi: OnceCell<RuleHandle>,
  pair: OnceCell<LibraryPair>,
}

fn memoize<T>(cell: &OnceCell<T>, init: impl FnOnce() -> Result<T, GraphError>) -> Result<&T, GraphError> {
  if let Some(value) = cell.get() {
    return Ok(value);
  }
  let value = init()?;
  Ok(cell.get_or_init(|| value))
}

impl<'a> LibraryRules<'a> {
  /// Create a builder for `target`, which may be the library or any ABI
  /// flavor of it.
  ///
  /// Resources are validated here, so a bad descriptor fails before any rule
  /// is built or registered.
  pub fn new(
    target: Target,
    descriptor: LibraryDescriptor,
    ctx: LibraryContext<'a>,
    validator: &dyn ResourceValidator,
  ) -> Result<Self, GraphError> {
    let library_target = target.library_target();
    validator.validate(
      &library_target,
      &descriptor.resources,
      descriptor.resources_root.as_deref(),
    )?;

    Ok(Self {
      target,
      library_target,
      descriptor,
      ctx,
      compiler: OnceCell::new(),
      abi_target: OnceCell::new(),
      declared_deps: OnceCell::new(),
      closures: OnceCell::new(),
      build_deps: OnceCell::new(),
      steps: OnceCell::new(),
      source_abi: OnceCell::new(),
      pair: OnceCell::new(),
    })
  }

  pub fn target(&self) -> &Target {
    &self.target
  }

  pub fn library_target(&self) -> &Target {
    &self.library_target
  }

  /// Build the rule the initial target names.
  pub fn build(&self) -> Result<RuleHandle, GraphError> {
    match self.target.flavor() {
      Flavor::Library => self.build_library(),
      _ => self.build_abi(),
    }
  }

  /// The library rule. Registers its source-ABI companion on first call.
  pub fn build_library(&self) -> Result<RuleHandle, GraphError> {
    Ok(self.library_pair(Registering::Companion)?.library.clone())
  }

  /// The ABI rule the initial target names.
  pub fn build_abi(&self) -> Result<RuleHandle, GraphError> {
    match self.target.flavor() {
      Flavor::ClassAbi => self.build_abi_from_classes(),
      Flavor::SourceAbi => {
        let abi = self.source_abi_rule()?.clone();
        // A library built without a companion is already registered.
        if !self.ctx.index.contains(&self.library_target) {
          self.library_pair(Registering::Library)?;
        }
        Ok(abi)
      }
      Flavor::VerifiedSourceAbi => self.build_verified_abi(),
      Flavor::Library => Err(GraphError::NotAnAbiTarget(self.target.clone())),
    }
  }

  pub fn compiler(&self) -> Result<&ConfiguredCompiler, GraphError> {
    memoize(&self.compiler, || {
      self
        .ctx
        .compiler_factory
        .configure(&self.descriptor.compiler_options, self.ctx.index)
    })
  }

  pub fn abi_inputs(&self) -> Result<AbiInputs, GraphError> {
    let d = &self.descriptor;
    Ok(AbiInputs {
      will_produce_output: d.will_produce_output(),
      has_sources: !d.srcs.is_empty(),
      compiler_supports_abi_from_source: self.compiler()?.supports_abi_from_source,
      source_abis_enabled: self.ctx.java.generate_abis_from_source,
      source_abis_allowed: d.source_abis_allowed,
      has_postprocess_commands: !d.postprocess_commands.is_empty(),
      verification: self.ctx.java.source_abi_verification,
    })
  }

  /// The ABI target dependents compile against, or `None` without output.
  pub fn abi_target(&self) -> Result<Option<&Target>, GraphError> {
    let abi = memoize(&self.abi_target, || {
      let abi = abi_target_for(&self.library_target, &self.abi_inputs()?);
      match &abi {
        Some(target) => debug!(library = %self.library_target, abi = %target, "chose ABI target"),
        None => debug!(library = %self.library_target, "library produces no output, no ABI"),
      }
      Ok(abi)
    })?;
    Ok(abi.as_ref())
  }

  pub fn will_produce_source_abi(&self) -> Result<bool, GraphError> {
    Ok(self.abi_inputs()?.will_produce_source_abi())
  }

  fn deps(&self) -> Result<&DependencyDeclaration, GraphError> {
    self
      .descriptor
      .deps
      .as_ref()
      .ok_or_else(|| GraphError::MissingDependencies(self.library_target.clone()))
  }

  /// Declared deps plus the compiler's own.
  pub fn declared_deps(&self) -> Result<&BTreeSet<RuleHandle>, GraphError> {
    memoize(&self.declared_deps, || {
      let mut declared = self.deps()?.declared.clone();
      declared.extend(self.compiler()?.declared_deps.iter().cloned());
      Ok(declared)
    })
  }

  pub fn closures(&self) -> Result<&Closures, GraphError> {
    memoize(&self.closures, || {
      let first_order = self.deps()?.first_order(&self.compiler()?.declared_deps);
      Closures::resolve(
        &first_order,
        self.ctx.index,
        self.ctx.compiler_factory.compile_against_abis(),
      )
    })
  }

  pub fn build_deps(&self) -> Result<&BTreeSet<RuleHandle>, GraphError> {
    memoize(&self.build_deps, || {
      let initial = self.deps()?.initial_build_deps(&self.descriptor.extra_deps);
      Ok(build_time_deps(&BuildDepsInputs {
        initial: &initial,
        closures: self.closures()?,
        compiler_build_deps: &self.compiler()?.build_deps,
        compile_against_abis: self.ctx.compiler_factory.compile_against_abis(),
      }))
    })
  }

  pub fn steps(&self) -> Result<&Arc<JarBuildSteps>, GraphError> {
    memoize(&self.steps, || {
      let d = &self.descriptor;
      let compiler = self.compiler()?;
      let closures = self.closures()?;

      let compile_classpath = if self.ctx.compiler_factory.compile_against_abis() {
        outputs(&closures.abi)
      } else {
        outputs(&closures.full)
      };

      Ok(Arc::new(JarBuildSteps {
        language: compiler.language,
        arguments: compiler.arguments.clone(),
        srcs: d.srcs.iter().cloned().collect(),
        resources: d.resources.iter().cloned().collect(),
        resources_root: d.resources_root.clone(),
        manifest_file: d.manifest_file.clone(),
        postprocess_commands: d.postprocess_commands.clone(),
        abi_classpath: outputs(&closures.abi),
        track_class_usage: self.ctx.compiler_factory.track_class_usage(&d.compiler_options),
        compile_classpath,
        classes_to_remove: d.classes_to_remove.clone(),
        required_for_source_abi: d.required_for_source_abi,
      }))
    })
  }

  /// The source-ABI rule, built whether or not the library links to it.
  fn source_abi_rule(&self) -> Result<&RuleHandle, GraphError> {
    memoize(&self.source_abi, || {
      Ok(source_abi_rule(
        self.library_target.source_abi(),
        self.build_deps()?.clone(),
        self.steps()?.clone(),
        self.ctx.out,
      ))
    })
  }

  fn library_pair(&self, registering: Registering) -> Result<&LibraryPair, GraphError> {
    memoize(&self.pair, || {
      let deps = self.deps()?;
      let steps = self.steps()?.clone();
      let mut build_deps = self.build_deps()?.clone();

      let source_abi = if self.will_produce_source_abi()? {
        let abi = self.source_abi_rule()?.clone();
        build_deps.insert(abi.clone());
        Some(abi)
      } else {
        None
      };

      let output = steps
        .produces_output()
        .then(|| output_jar(self.ctx.out, &self.library_target));

      let d = &self.descriptor;
      let library = RuleHandle::new(BuildRule::new(
        self.library_target.clone(),
        RuleKind::Library(LibraryRule {
          declared_deps: self.declared_deps()?.clone(),
          exported_deps: deps.exported.clone(),
          provided_deps: deps.provided.clone(),
          abi_target: self.abi_target()?.cloned(),
          source_abi: source_abi.clone(),
          steps,
          proguard_config: d.proguard_config.clone(),
          maven_coords: d.maven_coords.clone(),
          tests: d.tests.clone(),
          required_for_source_abi: d.required_for_source_abi,
        }),
        build_deps,
        output,
      ));

      match (registering, &source_abi) {
        (Registering::Companion, Some(abi)) => self.ctx.index.add_to_index(abi.clone())?,
        (Registering::Companion, None) => {}
        (Registering::Library, _) => self.ctx.index.add_to_index(library.clone())?,
      }

      info!(
        library = %self.library_target,
        deps = library.build_deps().len(),
        source_abi = source_abi.is_some(),
        "built library rule"
      );

      Ok(LibraryPair { library, source_abi })
    })
  }

  fn build_abi_from_classes(&self) -> Result<RuleHandle, GraphError> {
    let library = self.ctx.index.require(&self.library_target)?;
    class_abi_rule(
      self.library_target.class_abi(),
      &library,
      self.ctx.out,
      self.ctx.java.source_abi_verification != VerificationMode::Off,
    )
  }

  fn build_verified_abi(&self) -> Result<RuleHandle, GraphError> {
    let class_abi = self.ctx.index.require(&self.library_target.class_abi())?;
    let source_abi = self.ctx.index.require(&self.library_target.source_abi())?;

    compare_abis_rule(
      self.target.clone(),
      &class_abi,
      &source_abi,
      self.ctx.java.source_abi_verification,
    )
  }
}

fn outputs(rules: &BTreeSet<RuleHandle>) -> Vec<PathBuf> {
  rules
    .iter()
    .filter_map(|rule| rule.output().map(Path::to_path_buf))
    .collect()
}
