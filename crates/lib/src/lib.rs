//! kiln-lib: rule-graph construction for ABI-based compilation avoidance.
//!
//! Given library definitions, this crate derives the rules needed to build
//! them, and the ABI rules their dependents compile against so that an
//! implementation-only change doesn't trigger downstream recompiles:
//! - `Target`: a library or one of its ABI flavors
//! - `BuildRule`: an immutable graph node, shared as a `RuleHandle`
//! - `RuleIndex`: the shared registry constructing each rule exactly once
//! - `LibraryRules`: the per-library builder choosing and wiring ABI rules
//! - `Workspace`: rule definitions loaded from `kiln.toml`

pub mod compiler;
pub mod config;
pub mod consts;
pub mod deps;
pub mod error;
pub mod index;
pub mod library;
pub mod paths;
pub mod rule;
pub mod target;
pub mod util;
pub mod workspace;
