//! Build targets and their flavors.
//!
//! A target names one node of the rule graph. Every library base target has
//! three derived ABI flavors, spelled with a `#` suffix:
//!
//! - `//java/com/example:util` - the library itself
//! - `//java/com/example:util#class-abi` - ABI stripped from the compiled jar
//! - `//java/com/example:util#source-abi` - ABI derived directly from source
//! - `//java/com/example:util#verified-source-abi` - source ABI checked against the class ABI
//!
//! The suffix scheme is the contract with callers that request an ABI without
//! going through the library first, so [`Target`] parses and prints exactly
//! this format and nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{CLASS_ABI_FLAVOR, FLAVOR_SEPARATOR, SOURCE_ABI_FLAVOR, VERIFIED_SOURCE_ABI_FLAVOR};

/// Which node of a library family a target refers to.
///
/// Variant order is part of the target ordering: a library sorts before its
/// ABI flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flavor {
  Library,
  ClassAbi,
  SourceAbi,
  VerifiedSourceAbi,
}

impl Flavor {
  /// The `#suffix` for this flavor, or `None` for the library itself.
  pub fn suffix(self) -> Option<&'static str> {
    match self {
      Flavor::Library => None,
      Flavor::ClassAbi => Some(CLASS_ABI_FLAVOR),
      Flavor::SourceAbi => Some(SOURCE_ABI_FLAVOR),
      Flavor::VerifiedSourceAbi => Some(VERIFIED_SOURCE_ABI_FLAVOR),
    }
  }

  pub fn is_abi(self) -> bool {
    !matches!(self, Flavor::Library)
  }

  fn from_suffix(suffix: &str) -> Option<Self> {
    match suffix {
      CLASS_ABI_FLAVOR => Some(Flavor::ClassAbi),
      SOURCE_ABI_FLAVOR => Some(Flavor::SourceAbi),
      VERIFIED_SOURCE_ABI_FLAVOR => Some(Flavor::VerifiedSourceAbi),
      _ => None,
    }
  }
}

/// Errors produced when parsing a target string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTargetError {
  #[error("target is empty")]
  Empty,

  #[error("target '{0}' must start with '//'")]
  NotAbsolute(String),

  #[error("target '{0}' must have the form //package:name")]
  MissingName(String),

  #[error("target '{input}' has unknown flavor '{flavor}'")]
  UnknownFlavor { input: String, flavor: String },
}

/// A fully-qualified, flavored build target.
///
/// Ordering is total and stable (base, then flavor) so that every set of
/// targets iterates identically on every machine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
  base: String,
  flavor: Flavor,
}

impl Target {
  /// Parse an unflavored library target such as `//java/util:collections`.
  pub fn library(base: &str) -> Result<Self, ParseTargetError> {
    validate_base(base)?;
    Ok(Self {
      base: base.to_string(),
      flavor: Flavor::Library,
    })
  }

  pub fn base(&self) -> &str {
    &self.base
  }

  pub fn flavor(&self) -> Flavor {
    self.flavor
  }

  pub fn is_library(&self) -> bool {
    self.flavor == Flavor::Library
  }

  /// The package path between `//` and `:`.
  pub fn package(&self) -> &str {
    let rest = &self.base[2..];
    rest.split_once(':').map(|(pkg, _)| pkg).unwrap_or(rest)
  }

  /// The rule name after `:`.
  pub fn short_name(&self) -> &str {
    self.base.rsplit_once(':').map(|(_, name)| name).unwrap_or(&self.base)
  }

  pub fn with_flavor(&self, flavor: Flavor) -> Self {
    Self {
      base: self.base.clone(),
      flavor,
    }
  }

  /// The library this target belongs to (itself if unflavored).
  pub fn library_target(&self) -> Self {
    self.with_flavor(Flavor::Library)
  }

  pub fn class_abi(&self) -> Self {
    self.with_flavor(Flavor::ClassAbi)
  }

  pub fn source_abi(&self) -> Self {
    self.with_flavor(Flavor::SourceAbi)
  }

  pub fn verified_source_abi(&self) -> Self {
    self.with_flavor(Flavor::VerifiedSourceAbi)
  }
}

fn validate_base(base: &str) -> Result<(), ParseTargetError> {
  if base.is_empty() {
    return Err(ParseTargetError::Empty);
  }
  if !base.starts_with("//") {
    return Err(ParseTargetError::NotAbsolute(base.to_string()));
  }
  match base[2..].split_once(':') {
    Some((_, name)) if !name.is_empty() && !name.contains(':') => Ok(()),
    _ => Err(ParseTargetError::MissingName(base.to_string())),
  }
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.flavor.suffix() {
      Some(suffix) => write!(f, "{}{}{}", self.base, FLAVOR_SEPARATOR, suffix),
      None => write!(f, "{}", self.base),
    }
  }
}

impl FromStr for Target {
  type Err = ParseTargetError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let Some((base, suffix)) = s.split_once(FLAVOR_SEPARATOR) else {
      return Target::library(s);
    };

    let flavor = Flavor::from_suffix(suffix).ok_or_else(|| ParseTargetError::UnknownFlavor {
      input: s.to_string(),
      flavor: suffix.to_string(),
    })?;

    Ok(Target::library(base)?.with_flavor(flavor))
  }
}

impl TryFrom<String> for Target {
  type Error = ParseTargetError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Target> for String {
  fn from(target: Target) -> Self {
    target.to_string()
  }
}
