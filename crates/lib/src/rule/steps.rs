//! Compile step planning.
//!
//! [`JarBuildSteps`] captures everything needed to compile one library and is
//! shared by the library rule and its source-ABI rule, so both compile from the
//! same inputs. Steps are rendered as data; running them is the executor's job.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::compiler::Language;
use crate::config::VerificationMode;
use crate::paths::{classes_dir, output_jar};
use crate::target::Target;

/// One unit of work in a rule's build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
  MakeCleanDirectory {
    path: PathBuf,
  },
  Compile {
    language: Language,
    sources: Vec<PathBuf>,
    classpath: Vec<PathBuf>,
    arguments: Vec<String>,
    output_dir: PathBuf,
    /// Emit only the ABI (signatures) rather than full class files.
    abi_only: bool,
    track_class_usage: bool,
  },
  CopyResources {
    resources: Vec<PathBuf>,
    resources_root: Option<PathBuf>,
    output_dir: PathBuf,
  },
  Postprocess {
    command: String,
    classes_dir: PathBuf,
  },
  Jar {
    input_dir: PathBuf,
    output: PathBuf,
    manifest: Option<PathBuf>,
    remove_classes: Vec<String>,
  },
  StripToAbi {
    input: PathBuf,
    output: PathBuf,
    source_abi_compatible: bool,
  },
  CompareAbis {
    class_abi: PathBuf,
    source_abi: PathBuf,
    mode: VerificationMode,
  },
}

/// Regex patterns naming classes to drop from the output jar.
#[derive(Debug, Clone, Default)]
pub struct RemoveClassesMatcher {
  patterns: Vec<Regex>,
}

impl RemoveClassesMatcher {
  pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let patterns = patterns
      .into_iter()
      .map(|p| Regex::new(p.as_ref()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { patterns })
  }

  /// Whether the fully-qualified class name matches any pattern.
  pub fn should_remove(&self, class_name: &str) -> bool {
    self.patterns.iter().any(|p| p.is_match(class_name))
  }

  pub fn is_empty(&self) -> bool {
    self.patterns.is_empty()
  }

  pub fn patterns(&self) -> Vec<String> {
    self.patterns.iter().map(|p| p.as_str().to_string()).collect()
  }
}

/// Inputs for compiling one library into a jar.
#[derive(Debug, Clone)]
pub struct JarBuildSteps {
  pub language: Language,
  pub arguments: Vec<String>,
  pub srcs: Vec<PathBuf>,
  pub resources: Vec<PathBuf>,
  pub resources_root: Option<PathBuf>,
  pub manifest_file: Option<PathBuf>,
  pub postprocess_commands: Vec<String>,
  /// Outputs of the ABI closure, used to decide whether a rebuild is needed.
  pub abi_classpath: Vec<PathBuf>,
  pub track_class_usage: bool,
  /// The classpath handed to the compiler (ABI jars or full jars).
  pub compile_classpath: Vec<PathBuf>,
  pub classes_to_remove: RemoveClassesMatcher,
  pub required_for_source_abi: bool,
}

impl JarBuildSteps {
  pub fn produces_output(&self) -> bool {
    !self.srcs.is_empty() || !self.resources.is_empty() || self.manifest_file.is_some()
  }

  /// Steps producing the library jar for `target`.
  pub fn library_steps(&self, out: &Path, target: &Target) -> Vec<Step> {
    if !self.produces_output() {
      return Vec::new();
    }

    let classes = classes_dir(out, target);
    let mut steps = vec![Step::MakeCleanDirectory { path: classes.clone() }];

    if !self.srcs.is_empty() {
      steps.push(self.compile_step(classes.clone(), false));
    }

    if !self.resources.is_empty() {
      steps.push(Step::CopyResources {
        resources: self.resources.clone(),
        resources_root: self.resources_root.clone(),
        output_dir: classes.clone(),
      });
    }

    for command in &self.postprocess_commands {
      steps.push(Step::Postprocess {
        command: command.clone(),
        classes_dir: classes.clone(),
      });
    }

    steps.push(Step::Jar {
      input_dir: classes,
      output: output_jar(out, &target.library_target()),
      manifest: self.manifest_file.clone(),
      remove_classes: self.classes_to_remove.patterns(),
    });

    steps
  }

  /// Steps producing the source ABI jar for `target`.
  pub fn source_abi_steps(&self, out: &Path, target: &Target) -> Vec<Step> {
    let abi_target = target.source_abi();
    let classes = classes_dir(out, &abi_target).with_file_name("abi-classes");

    vec![
      Step::MakeCleanDirectory { path: classes.clone() },
      self.compile_step(classes.clone(), true),
      Step::Jar {
        input_dir: classes,
        output: output_jar(out, &abi_target),
        manifest: None,
        remove_classes: self.classes_to_remove.patterns(),
      },
    ]
  }

  fn compile_step(&self, output_dir: PathBuf, abi_only: bool) -> Step {
    Step::Compile {
      language: self.language,
      sources: self.srcs.clone(),
      classpath: self.compile_classpath.clone(),
      arguments: self.arguments.clone(),
      output_dir,
      abi_only,
      track_class_usage: self.track_class_usage && !abi_only,
    }
  }
}
