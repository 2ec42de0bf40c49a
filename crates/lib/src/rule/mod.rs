//! Rule graph nodes.
//!
//! Every node is a [`BuildRule`] shared through a [`RuleHandle`]. Libraries
//! produce jars; their ABI variants (see [`abi`]) produce the lighter jars
//! dependents compile against.
//!
//! # Submodules
//!
//! - [`abi`] - ABI target selection and the three ABI rule variants
//! - [`steps`] - compile step planning shared by a library and its source ABI

pub mod abi;
pub mod steps;
mod types;

pub use types::*;
