//! Library rule construction.
//!
//! [`LibraryRules`] turns one [`LibraryDescriptor`] into the library rule and
//! whichever ABI rules are requested from it.

mod descriptor;
mod resources;
mod rules;

pub use descriptor::LibraryDescriptor;
pub use resources::{FsResourceValidator, ResourceError, ResourceValidator};
pub use rules::{LibraryContext, LibraryPair, LibraryRules};
