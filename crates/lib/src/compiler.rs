//! Compiler configuration.
//!
//! The graph builder never inspects a compiler's concrete type. Everything it
//! needs is decided once, in [`CompilerFactory::configure`], and carried on
//! [`ConfiguredCompiler`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompilerConfig;
use crate::error::GraphError;
use crate::index::RuleIndex;
use crate::rule::RuleHandle;
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  Java,
  Kotlin,
  Scala,
}

impl Language {
  /// Only javac can emit an ABI jar straight from source.
  pub fn supports_abi_from_source(self) -> bool {
    matches!(self, Language::Java)
  }
}

/// Per-library compiler options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
  pub source_level: Option<String>,
  pub target_level: Option<String>,
  pub extra_arguments: Vec<String>,
  /// Processor libraries; they must be built but never land on the classpath.
  pub annotation_processors: Vec<Target>,
  pub track_class_usage: Option<bool>,
}

/// A compiler configured for one library.
#[derive(Debug, Clone)]
pub struct ConfiguredCompiler {
  pub language: Language,
  pub supports_abi_from_source: bool,
  pub arguments: Vec<String>,
  /// Deps the compiler adds to every library's classpath (e.g. a stdlib).
  pub declared_deps: BTreeSet<RuleHandle>,
  /// Deps the compiler needs built but not on the classpath.
  pub build_deps: BTreeSet<RuleHandle>,
}

/// Produces [`ConfiguredCompiler`]s and answers compile-mode questions.
pub trait CompilerFactory: Send + Sync {
  fn configure(&self, options: &CompilerOptions, index: &RuleIndex) -> Result<ConfiguredCompiler, GraphError>;

  /// Whether dependents compile against ABI jars instead of full jars.
  fn compile_against_abis(&self) -> bool;

  fn track_class_usage(&self, options: &CompilerOptions) -> bool;
}

/// The compiler factory driven by `[compiler]` config.
#[derive(Debug, Clone, Default)]
pub struct StandardCompilerFactory {
  config: CompilerConfig,
}

impl StandardCompilerFactory {
  pub fn new(config: CompilerConfig) -> Self {
    Self { config }
  }

  fn arguments(&self, options: &CompilerOptions) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(source) = &options.source_level {
      args.push("-source".to_string());
      args.push(source.clone());
    }
    if let Some(target) = &options.target_level {
      args.push("-target".to_string());
      args.push(target.clone());
    }
    args.extend(options.extra_arguments.iter().cloned());
    args
  }
}

impl CompilerFactory for StandardCompilerFactory {
  fn configure(&self, options: &CompilerOptions, index: &RuleIndex) -> Result<ConfiguredCompiler, GraphError> {
    let declared_deps = self
      .config
      .runtime_deps
      .iter()
      .map(|target| index.require(target))
      .collect::<Result<BTreeSet<_>, _>>()?;

    let build_deps = options
      .annotation_processors
      .iter()
      .map(|target| index.require(target))
      .collect::<Result<BTreeSet<_>, _>>()?;

    let language = self.config.language;
    debug!(
      language = ?language,
      declared = declared_deps.len(),
      processors = build_deps.len(),
      "configured compiler"
    );

    Ok(ConfiguredCompiler {
      language,
      supports_abi_from_source: language.supports_abi_from_source(),
      arguments: self.arguments(options),
      declared_deps,
      build_deps,
    })
  }

  fn compile_against_abis(&self) -> bool {
    self.config.compile_against_abis
  }

  fn track_class_usage(&self, options: &CompilerOptions) -> bool {
    options.track_class_usage.unwrap_or(self.config.track_class_usage)
  }
}
