//! Output directory layout.
//!
//! Everything kiln plans to produce lives under a single output root:
//!
//! ```text
//! <out>/gen/<package>/<name>/<name>.jar
//! <out>/gen/<package>/<name>/<name>-class-abi.jar
//! <out>/gen/<package>/<name>/<name>-source-abi.jar
//! ```

use std::path::{Path, PathBuf};

use crate::consts::{DEFAULT_OUT_DIR, OUT_DIR_ENV};
use crate::target::{Flavor, Target};

/// Returns the output root, honoring `KILN_OUT`.
pub fn out_dir() -> PathBuf {
  std::env::var(OUT_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUT_DIR))
}

/// Directory holding every generated artifact of a target family.
pub fn gen_dir(out: &Path, target: &Target) -> PathBuf {
  out.join("gen").join(target.package()).join(target.short_name())
}

/// Path of the jar a given flavor produces.
///
/// The verified-source-ABI flavor passes the source ABI through once it has
/// been checked, so it shares the source ABI's path.
pub fn output_jar(out: &Path, target: &Target) -> PathBuf {
  let name = target.short_name();
  let file = match target.flavor() {
    Flavor::Library => format!("{}.jar", name),
    Flavor::ClassAbi => format!("{}-class-abi.jar", name),
    Flavor::SourceAbi | Flavor::VerifiedSourceAbi => format!("{}-source-abi.jar", name),
  };
  gen_dir(out, target).join(file)
}

/// Scratch directory the compiler writes class files into.
pub fn classes_dir(out: &Path, target: &Target) -> PathBuf {
  gen_dir(out, target).join("classes")
}
