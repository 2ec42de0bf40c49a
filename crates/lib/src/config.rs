//! Build configuration.
//!
//! Loaded from a TOML file; every key is optional:
//!
//! ```toml
//! [java]
//! generate_abis_from_source = true
//! source_abi_verification = "log"
//!
//! [compiler]
//! language = "java"
//! compile_against_abis = true
//! runtime_deps = ["//third_party:annotations"]
//! track_class_usage = false
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::compiler::Language;
use crate::paths;
use crate::target::Target;

/// How strictly a source ABI is checked against the class ABI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
  /// Use the source ABI unchecked.
  #[default]
  Off,
  /// Produce both ABIs, compare, and warn on mismatch.
  Log,
  /// Produce both ABIs, compare, and fail the build on mismatch.
  Fail,
}

impl fmt::Display for VerificationMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      VerificationMode::Off => "off",
      VerificationMode::Log => "log",
      VerificationMode::Fail => "fail",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JavaConfig {
  pub generate_abis_from_source: bool,
  pub source_abi_verification: VerificationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
  pub language: Language,
  pub compile_against_abis: bool,
  /// Deps every library compiled by this compiler implicitly declares.
  pub runtime_deps: Vec<Target>,
  pub track_class_usage: bool,
}

impl Default for CompilerConfig {
  fn default() -> Self {
    Self {
      language: Language::Java,
      compile_against_abis: true,
      runtime_deps: Vec::new(),
      track_class_usage: false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KilnConfig {
  pub java: JavaConfig,
  pub compiler: CompilerConfig,
  /// Overrides `KILN_OUT` when set.
  pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {}: {source}", .path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("invalid config: {0}")]
  Parse(#[from] toml::de::Error),
}

impl KilnConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let config = Self::from_toml_str(&content)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(content)?)
  }

  /// The output root: the configured one, else `KILN_OUT`, else the default.
  pub fn out_dir(&self) -> PathBuf {
    self.out_dir.clone().unwrap_or_else(paths::out_dir)
  }
}
